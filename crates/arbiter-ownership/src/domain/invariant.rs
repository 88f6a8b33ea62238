//! Ownership index invariant failures.
//!
//! An inconsistent index could grant one resource twice, so a detected
//! violation is never repaired: it is logged and the process panics.

use thiserror::Error;

/// The primary owner store and a derived index disagree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ownership index invariant violated on resource '{resource_id}': {detail}")]
pub struct InvariantViolation {
    /// The resource whose records disagree.
    pub resource_id: String,
    /// What was found.
    pub detail: String,
}

impl InvariantViolation {
    /// Creates a violation report.
    #[must_use]
    pub fn new(resource_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            detail: detail.into(),
        }
    }
}

/// Logs the violation and aborts the current thread.
///
/// # Panics
///
/// Always.
pub fn fail_fast(violation: &InvariantViolation) -> ! {
    tracing::error!(
        resource_id = %violation.resource_id,
        detail = %violation.detail,
        "ownership index corrupted; refusing to continue"
    );
    panic!("{violation}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "ownership index invariant violated on resource 'canvas-1'")]
    fn test_fail_fast_panics_with_violation_message() {
        fail_fast(&InvariantViolation::new("canvas-1", "missing owner index entry"));
    }
}
