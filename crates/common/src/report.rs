//! Failure reporting with operator-attention escalation.

use std::backtrace::Backtrace;

/// Marks error kinds that require operator attention.
///
/// Billing and storage failures are critical: they indicate a broken
/// collaborator rather than a rejected request, so they are reported with a
/// captured backtrace. Domain rejections are not critical.
pub trait Critical {
    /// Returns true if this error should page an operator.
    fn is_critical(&self) -> bool;
}

/// Logs a failure, escalating critical errors with a backtrace.
pub fn report_failure<E>(context: &'static str, err: &E)
where
    E: Critical + std::fmt::Display,
{
    if err.is_critical() {
        let backtrace = Backtrace::force_capture();
        tracing::error!(error = %err, %backtrace, "{context}: critical failure");
    } else {
        tracing::warn!(error = %err, "{context}: rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flagged(bool);

    impl std::fmt::Display for Flagged {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flagged")
        }
    }

    impl Critical for Flagged {
        fn is_critical(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn report_does_not_panic() {
        report_failure("test", &Flagged(true));
        report_failure("test", &Flagged(false));
    }
}
