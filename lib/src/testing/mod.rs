mod fixture;
pub mod harness;
mod runner;
pub mod suite_masks;

pub use fixture::{with_fixture, TestFixture};
pub use harness::{
    register_suite, run_registered_suites, SuiteRunnerFn, TestRunSummary, TestSuiteDesc,
    TestSuiteResult, HARNESS_MAX_SUITES,
};
pub use runner::run_single_test;
pub use suite_masks::*;

/// Result of a single test execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestResult {
    Pass,
    Fail,
    /// Fixture setup failed, the body never ran
    Skipped,
}

impl TestResult {
    #[inline]
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail)
    }
}

/// Return a passing test result.
#[macro_export]
macro_rules! pass {
    () => {
        $crate::testing::TestResult::Pass
    };
}

/// Return a failing test result with optional message.
///
/// ```ignore
/// if ptr.is_null() {
///     return fail!("malloc({}) returned null", size);
/// }
/// ```
#[macro_export]
macro_rules! fail {
    () => {
        $crate::testing::TestResult::Fail
    };
    ($msg:expr) => {{
        $crate::mlog_info!("TEST FAIL: {}", $msg);
        $crate::testing::TestResult::Fail
    }};
    ($fmt:expr, $($arg:tt)*) => {{
        $crate::mlog_info!(concat!("TEST FAIL: ", $fmt), $($arg)*);
        $crate::testing::TestResult::Fail
    }};
}

/// Fail the enclosing test unless `cond` holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr) => {
        if !$cond {
            return $crate::fail!(concat!("condition failed: ", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return $crate::fail!($($arg)*);
        }
    };
}

/// Run a single test, optionally accumulating into suite counters.
///
/// ```ignore
/// run_test!(test_calloc_zeroes)
/// run_test!(result, test_calloc_zeroes)
/// ```
#[macro_export]
macro_rules! run_test {
    ($result:expr, $test_fn:expr) => {{
        let outcome = $crate::testing::run_single_test(stringify!($test_fn), $test_fn);
        $result.total += 1;
        match outcome {
            $crate::testing::TestResult::Pass => $result.passed += 1,
            $crate::testing::TestResult::Fail => $result.failed += 1,
            $crate::testing::TestResult::Skipped => $result.skipped += 1,
        }
        outcome
    }};

    ($test_fn:expr) => {{
        $crate::testing::run_single_test(stringify!($test_fn), $test_fn)
    }};
}

/// Define a test suite.
///
/// Generates a runner function, a static `<NAME>_SUITE_DESC` for
/// [`register_suite`], and, when the invoking crate is compiled for
/// `cargo test`, one host `#[test]` per listed function.
///
/// ```ignore
/// define_test_suite!(heap_calloc, SUITE_HEAP, [
///     test_calloc_zeroes,
///     test_calloc_overflow_is_rejected,
/// ]);
/// ```
#[macro_export]
macro_rules! define_test_suite {
    ($suite_name:ident, $mask:expr, [$($test_fn:ident),* $(,)?]) => {
        $crate::paste::paste! {
            fn [<run_ $suite_name _suite>](
                out: &mut $crate::testing::TestSuiteResult,
            ) -> core::ffi::c_int {
                $(
                    $crate::run_test!(out, $test_fn);
                )*
                if out.all_passed() { 0 } else { -1 }
            }

            pub static [<$suite_name:upper _SUITE_DESC>]: $crate::testing::TestSuiteDesc =
                $crate::testing::TestSuiteDesc {
                    name: stringify!($suite_name),
                    mask_bit: $mask,
                    run: Some([<run_ $suite_name _suite>]),
                };

            #[cfg(test)]
            mod [<$suite_name _host>] {
                $(
                    #[test]
                    fn $test_fn() {
                        let result = super::$test_fn();
                        assert!(
                            !result.is_failure(),
                            concat!(stringify!($test_fn), " failed")
                        );
                    }
                )*
            }
        }
    };
}

/// Register multiple test suites with the harness in one call.
#[macro_export]
macro_rules! register_test_suites {
    ($($suite_desc:expr),* $(,)?) => {
        $(
            let _ = $crate::testing::register_suite(&$suite_desc);
        )*
    };
}
