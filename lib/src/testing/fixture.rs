//! Test fixtures with RAII teardown.

use super::TestResult;

/// Environment a test needs before it can run.
///
/// Teardown belongs in the implementor's `Drop`, so it runs on every exit
/// path of the test body.
pub trait TestFixture: Sized {
    /// Build the environment. `Err` skips the test with the given reason.
    fn setup() -> Result<Self, &'static str>;
}

/// Set up `F`, hand it to `test`, and drop it afterwards.
pub fn with_fixture<F: TestFixture>(test: impl FnOnce(&mut F) -> TestResult) -> TestResult {
    match F::setup() {
        Ok(mut fixture) => test(&mut fixture),
        Err(reason) => {
            crate::mlog_info!("fixture setup failed: {}", reason);
            TestResult::Skipped
        }
    }
}
