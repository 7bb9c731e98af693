//! Misuse detection, debug checking and the sbrk backing.

use core::ptr;

use minlibc_heap::{AllocError, DebugFlags, HEADER_SIZE, POISON_BYTE};
use minlibc_lib::testing::{with_fixture, TestResult, SUITE_HEAP};
use minlibc_lib::{define_test_suite, ensure, fail, pass};

use crate::fixture::{fixture_config, HeapFixture, SbrkFixture, FIXTURE_INITIAL_SIZE};

pub fn test_double_free_is_detected() -> TestResult {
    with_fixture(|f: &mut HeapFixture| {
        let (Ok(p), Ok(_fence)) = (f.heap.malloc(80), f.heap.malloc(16)) else {
            return fail!("setup allocations failed");
        };
        ensure!(f.heap.free(p.as_ptr()).is_ok());
        ensure!(f.heap.free(p.as_ptr()) == Err(AllocError::DoubleFree));
        ensure!(f.heap.check().is_ok(), "double free changed the heap");
        pass!()
    })
}

pub fn test_foreign_pointers_are_rejected() -> TestResult {
    with_fixture(|f: &mut HeapFixture| {
        let Ok(p) = f.heap.malloc(64) else {
            return fail!("malloc(64) failed");
        };
        let mut local = [0u8; 32];
        ensure!(f.heap.free(local.as_mut_ptr()) == Err(AllocError::InvalidPointer));
        ensure!(f.heap.free(p.as_ptr().wrapping_add(1)) == Err(AllocError::InvalidPointer));
        ensure!(f.heap.usable_size(local.as_ptr()) == Err(AllocError::InvalidPointer));
        ensure!(f.heap.realloc(local.as_mut_ptr(), 10) == Err(AllocError::InvalidPointer));
        ensure!(f.heap.usable_size(p.as_ptr()) == Ok(64));
        pass!()
    })
}

pub fn test_interior_pointer_is_rejected() -> TestResult {
    with_fixture(|f: &mut HeapFixture| {
        let Ok(p) = f.heap.calloc(1, 256) else {
            return fail!("calloc(1, 256) failed");
        };
        // A 16-aligned address inside a zeroed payload has no valid header.
        let inner = p.as_ptr().wrapping_add(128);
        ensure!(f.heap.free(inner).is_err_and(|err| err.is_corruption()));
        ensure!(f.heap.free(p.as_ptr()).is_ok());
        pass!()
    })
}

pub fn test_header_damage_is_detected() -> TestResult {
    with_fixture(|f: &mut HeapFixture| {
        let (Ok(a), Ok(b)) = (f.heap.malloc(32), f.heap.malloc(32)) else {
            return fail!("setup allocations failed");
        };
        // Overrun `a` into the header of `b`.
        // SAFETY: both blocks are inside the fixture arena.
        unsafe { a.as_ptr().write_bytes(0x41, 32 + HEADER_SIZE / 2) };
        ensure!(f.heap.check() == Err(AllocError::Corrupted));
        ensure!(f.heap.free(b.as_ptr()) == Err(AllocError::Corrupted));
        pass!()
    })
}

pub fn test_verify_and_poison_on_free() -> TestResult {
    let debug = DebugFlags::VERIFY_ON_FREE | DebugFlags::POISON_FREED;
    let mut f = HeapFixture::with_config(fixture_config().with_debug(debug));
    let (Ok(p), Ok(_fence)) = (f.heap.malloc(96), f.heap.malloc(16)) else {
        return fail!("setup allocations failed");
    };
    // SAFETY: 96 bytes were requested.
    unsafe { p.as_ptr().write_bytes(0x00, 96) };
    ensure!(f.heap.free(p.as_ptr()).is_ok());
    // The first bytes now hold free-list links.
    // SAFETY: the freed block still lies inside the arena.
    let tail = unsafe { core::slice::from_raw_parts(p.as_ptr().add(32), 64) };
    ensure!(tail.iter().all(|&b| b == POISON_BYTE), "freed payload not poisoned");
    pass!()
}

pub fn test_stats_account_for_every_byte() -> TestResult {
    with_fixture(|f: &mut HeapFixture| {
        let mut live = [ptr::null_mut::<u8>(); 10];
        for (i, slot) in live.iter_mut().enumerate() {
            let Ok(p) = f.heap.malloc(50 * (i + 1)) else {
                return fail!("malloc #{} failed", i);
            };
            *slot = p.as_ptr();
        }
        for &p in live.iter().step_by(3) {
            ensure!(f.heap.free(p).is_ok());
        }
        let stats = f.heap.stats();
        ensure!(stats.total_blocks == stats.allocated_blocks + stats.free_blocks);
        ensure!(stats.allocated_blocks == 6);
        ensure!(stats.overhead() == stats.total_blocks as u64 * HEADER_SIZE as u64);
        ensure!(stats.largest_free_block <= stats.free_size);
        ensure!(stats.allocation_count == 10);
        ensure!(stats.free_count == 4);
        pass!()
    })
}

define_test_suite!(heap_integrity, SUITE_HEAP, [
    test_double_free_is_detected,
    test_foreign_pointers_are_rejected,
    test_interior_pointer_is_rejected,
    test_header_damage_is_detected,
    test_verify_and_poison_on_free,
    test_stats_account_for_every_byte,
]);

pub fn test_sbrk_backing_grows_contiguously() -> TestResult {
    with_fixture(|f: &mut SbrkFixture| {
        let Ok(small) = f.heap.malloc(100) else {
            return fail!("malloc(100) failed");
        };
        ensure!(f.break_offset() == FIXTURE_INITIAL_SIZE);
        let Ok(big) = f.heap.malloc(3 * FIXTURE_INITIAL_SIZE) else {
            return fail!("growing malloc failed");
        };
        ensure!(f.break_offset() > FIXTURE_INITIAL_SIZE);
        ensure!(f.heap.stats().grow_count == 1);
        ensure!(f.heap.free(small.as_ptr()).is_ok());
        ensure!(f.heap.free(big.as_ptr()).is_ok());
        ensure!(f.heap.stats().total_blocks == 1);
        ensure!(f.heap.check().is_ok());
        pass!()
    })
}

pub fn test_sbrk_exhaustion_reports_oom() -> TestResult {
    with_fixture(|f: &mut SbrkFixture| {
        ensure!(f.heap.malloc(1 << 20) == Err(AllocError::OutOfMemory));
        ensure!(f.heap.malloc(64).is_ok(), "heap unusable after failed growth");
        pass!()
    })
}

pub fn test_noncontiguous_extent_is_refused() -> TestResult {
    let mut f = SbrkFixture::new(fixture_config(), true);
    let Ok(_first) = f.heap.malloc(64) else {
        return fail!("malloc(64) failed");
    };
    ensure!(f.heap.malloc(2 * FIXTURE_INITIAL_SIZE) == Err(AllocError::OutOfMemory));
    let stats = f.heap.stats();
    ensure!(stats.grow_count == 0);
    ensure!(stats.total_size == FIXTURE_INITIAL_SIZE as u64);
    ensure!(f.heap.check().is_ok());
    pass!()
}

define_test_suite!(heap_sbrk, SUITE_HEAP, [
    test_sbrk_backing_grows_contiguously,
    test_sbrk_exhaustion_reports_oom,
    test_noncontiguous_extent_is_refused,
]);
