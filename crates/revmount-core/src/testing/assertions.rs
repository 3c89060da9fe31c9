//! Assertions over harness results.
//!
//! Panics carry the case context and the full failure rather than a bare
//! `Err(..)` debug dump.

use crate::error::{HarnessError, Result, VerifyFailure};
use crate::verify::VerifyReport;

/// Assert that a run passed and return its report.
#[track_caller]
pub fn assert_verified(result: Result<VerifyReport>, context: &str) -> VerifyReport {
    match result {
        Ok(report) => report,
        Err(err) => panic!("{context}: expected the view to verify, got: {err}"),
    }
}

/// Assert that a run was rejected by the verifier and return the failure.
///
/// Tool and I/O errors do not count; they mean the check never ran.
#[track_caller]
pub fn assert_verification_failure(result: Result<VerifyReport>, context: &str) -> VerifyFailure {
    match result {
        Err(HarnessError::Verification(failure)) => failure,
        Err(other) => panic!("{context}: expected a verification failure, got error: {other}"),
        Ok(report) => panic!("{context}: expected a verification failure, but the view verified ({report})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_verified_returns_report() {
        let report = VerifyReport {
            repositories: 1,
            ..VerifyReport::default()
        };
        assert_eq!(assert_verified(Ok(report), "ok"), report);
    }

    #[test]
    fn test_assert_verification_failure_extracts_failure() {
        let failure = assert_verification_failure(Err(VerifyFailure::EmptyFixture.into()), "empty");
        assert_eq!(failure, VerifyFailure::EmptyFixture);
    }

    #[test]
    #[should_panic(expected = "expected a verification failure, got error")]
    fn test_tool_error_is_not_a_verification_failure() {
        assert_verification_failure(Err(HarnessError::Config("bad".to_string())), "config");
    }
}
