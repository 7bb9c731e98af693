use super::TestResult;

/// Run one test function and log failures under its name.
///
/// There is no unwinding in the freestanding build, so a panicking test takes
/// the whole run down; under `cargo test` the host harness reports it.
pub fn run_single_test(name: &str, test_fn: fn() -> TestResult) -> TestResult {
    let result = test_fn();
    if result.is_failure() {
        crate::mlog_info!("TEST FAIL: {}", name);
    } else {
        crate::mlog_debug!("TEST PASS: {}", name);
    }
    result
}
