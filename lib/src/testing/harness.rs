//! Suite registry and result aggregation.
//!
//! Suites are produced by `define_test_suite!` and registered with
//! [`register_suite`]. An embedding runtime that has no `cargo test` (a bare
//! metal image linking the allocator, say) calls [`run_registered_suites`] to
//! execute everything matching a suite mask.
//!
//! ```ignore
//! define_test_suite!(heap_alloc, SUITE_HEAP, [
//!     test_malloc_reuses_freed_block,
//!     test_zero_size_is_unique,
//! ]);
//! ```

use core::ffi::c_int;

use spin::Mutex;

/// Maximum number of test suites that can be registered.
pub const HARNESS_MAX_SUITES: usize = 16;

/// Result of executing a single test suite.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestSuiteResult {
    pub name: &'static str,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl TestSuiteResult {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            total: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

pub type SuiteRunnerFn = fn(&mut TestSuiteResult) -> c_int;

/// Static descriptor for a test suite.
#[derive(Clone, Copy)]
pub struct TestSuiteDesc {
    pub name: &'static str,
    pub mask_bit: u32,
    pub run: Option<SuiteRunnerFn>,
}

/// Aggregated results from running all selected suites.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestRunSummary {
    pub suite_count: usize,
    pub total_tests: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl TestRunSummary {
    pub fn add_suite_result(&mut self, result: &TestSuiteResult) {
        self.suite_count += 1;
        self.total_tests = self.total_tests.saturating_add(result.total);
        self.passed = self.passed.saturating_add(result.passed);
        self.failed = self.failed.saturating_add(result.failed);
        self.skipped = self.skipped.saturating_add(result.skipped);
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

struct Registry {
    suites: [Option<&'static TestSuiteDesc>; HARNESS_MAX_SUITES],
    count: usize,
}

static REGISTRY: Mutex<Registry> = Mutex::new(Registry {
    suites: [None; HARNESS_MAX_SUITES],
    count: 0,
});

/// Register a suite. Returns 0 on success, -1 when the table is full or the
/// suite is already registered.
pub fn register_suite(desc: &'static TestSuiteDesc) -> c_int {
    let mut registry = REGISTRY.lock();
    let count = registry.count;
    if registry.suites[..count]
        .iter()
        .flatten()
        .any(|existing| core::ptr::eq(*existing, desc))
    {
        return -1;
    }
    if count >= HARNESS_MAX_SUITES {
        crate::mlog_warn!("test harness full, dropping suite {}", desc.name);
        return -1;
    }
    registry.suites[count] = Some(desc);
    registry.count += 1;
    0
}

/// Run every registered suite whose mask bit intersects `mask`.
pub fn run_registered_suites(mask: u32) -> TestRunSummary {
    // Copy the table out so suites may register further suites without deadlocking.
    let (suites, count) = {
        let registry = REGISTRY.lock();
        (registry.suites, registry.count)
    };

    let mut summary = TestRunSummary::default();
    for desc in suites[..count].iter().flatten() {
        if desc.mask_bit & mask == 0 {
            continue;
        }
        let Some(run) = desc.run else {
            continue;
        };
        let mut result = TestSuiteResult::new(desc.name);
        run(&mut result);
        crate::mlog_info!(
            "suite {}: {}/{} passed, {} skipped",
            result.name,
            result.passed,
            result.total,
            result.skipped
        );
        summary.add_suite_result(&result);
    }
    summary
}
