//! Scenario suites for the minlibc heap.
//!
//! Each suite is usable two ways: `cargo test` runs every test as an ordinary
//! host test, and an embedding runtime calls [`tests_register_all_suites`]
//! followed by [`tests_run_all`] to run them without a test harness.

#![no_std]

#[cfg(test)]
extern crate std;

use minlibc_lib::mlog_info;
use minlibc_lib::register_test_suites;
use minlibc_lib::testing::{run_registered_suites, TestRunSummary};

pub mod fixture;
pub mod integrity_tests;

pub use minlibc_lib::testing::{SUITE_ALL, SUITE_HEAP, SUITE_STDLIB, SUITE_STRESS};

pub fn tests_register_all_suites() {
    register_test_suites!(
        heap_tests::HEAP_ALLOC_SUITE_DESC,
        heap_tests::HEAP_CALLOC_SUITE_DESC,
        heap_tests::HEAP_REALLOC_SUITE_DESC,
        heap_tests::HEAP_ALIGNED_SUITE_DESC,
        heap_tests::HEAP_COALESCE_SUITE_DESC,
        heap_tests::HEAP_GROWTH_SUITE_DESC,
        integrity_tests::HEAP_INTEGRITY_SUITE_DESC,
        integrity_tests::HEAP_SBRK_SUITE_DESC,
        stdlib_tests::STDLIB_SCENARIO_SUITE_DESC,
        stress::HEAP_STRESS_SUITE_DESC,
    );
}

/// Run every registered suite selected by `mask`.
pub fn tests_run_all(mask: u32) -> TestRunSummary {
    mlog_info!("TESTS: Starting test suites");
    let summary = run_registered_suites(mask);
    mlog_info!(
        "TESTS SUMMARY: {} suites, {} tests, {} passed, {} failed, {} skipped",
        summary.suite_count,
        summary.total_tests,
        summary.passed,
        summary.failed,
        summary.skipped
    );
    summary
}

#[cfg(test)]
mod tests {
    use std::boxed::Box;
    use std::thread;
    use std::vec::Vec;

    use core::ptr::NonNull;

    use minlibc_heap::{LockedHeap, Region};

    use super::*;
    use crate::fixture::fixture_config;
    use crate::stress::Rng;

    #[test]
    fn registered_suites_all_pass() {
        tests_register_all_suites();
        let summary = tests_run_all(SUITE_ALL);
        assert_eq!(summary.suite_count, 10);
        assert!(summary.total_tests > 30);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 0);
    }

    #[test]
    fn suite_mask_selects_subset() {
        tests_register_all_suites();
        let summary = tests_run_all(SUITE_STDLIB);
        assert_eq!(summary.suite_count, 1);
        assert_eq!(summary.failed, 0);
    }

    const SHARED_WINDOW: usize = 512 * 1024;

    #[repr(C, align(16))]
    struct SharedWindow([u8; SHARED_WINDOW]);

    #[test]
    fn threads_share_a_locked_heap() {
        let window: &'static mut SharedWindow =
            Box::leak(unsafe { Box::<SharedWindow>::new_zeroed().assume_init() });
        let base = NonNull::new(window.0.as_mut_ptr()).unwrap();
        let region = unsafe { Region::new(base, SHARED_WINDOW) };
        let heap = LockedHeap::new(region, fixture_config());

        thread::scope(|scope| {
            for id in 0..4u64 {
                let heap = &heap;
                scope.spawn(move || {
                    let mut rng = Rng::new(0xC0FFEE + id);
                    let mut mine: Vec<(usize, usize)> = Vec::new();
                    let tag = id as u8 + 1;
                    for _ in 0..3000 {
                        if mine.len() < 32 && rng.below(3) != 0 {
                            let size = 1 + rng.below(512);
                            let p = heap.malloc(size).unwrap();
                            unsafe { p.as_ptr().write_bytes(tag, size) };
                            mine.push((p.as_ptr() as usize, size));
                        } else if !mine.is_empty() {
                            let (addr, size) = mine.swap_remove(rng.below(mine.len()));
                            let bytes =
                                unsafe { core::slice::from_raw_parts(addr as *const u8, size) };
                            assert!(bytes.iter().all(|&b| b == tag), "thread {} block clobbered", id);
                            heap.free(addr as *mut u8).unwrap();
                        }
                    }
                    for (addr, _) in mine {
                        heap.free(addr as *mut u8).unwrap();
                    }
                });
            }
        });

        heap.check().unwrap();
        let stats = heap.stats();
        assert_eq!(stats.allocated_blocks, 0);
        assert_eq!(stats.total_blocks, 1);
    }
}
