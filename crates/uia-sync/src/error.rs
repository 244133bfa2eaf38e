//! Error types for polling waits.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Terminal failure of a single-condition wait.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WaitError {
    /// The deadline passed without the condition being satisfied.
    #[error(
        "timed out after {:.1}s waiting for {what}; last observed: {last_observed}",
        .elapsed.as_secs_f64()
    )]
    TimedOut {
        what: String,
        elapsed: Duration,
        last_observed: String,
    },

    /// The condition reported a state that no amount of waiting will fix.
    #[error("{what} failed after {:.1}s: {reason}", .elapsed.as_secs_f64())]
    ConditionFailed {
        what: String,
        elapsed: Duration,
        reason: String,
    },

    #[error("Invalid poll policy: {0}")]
    InvalidPolicy(String),
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Time spent waiting before the failure was reported.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            Self::TimedOut { elapsed, .. } | Self::ConditionFailed { elapsed, .. } => {
                Some(*elapsed)
            }
            Self::InvalidPolicy(_) => None,
        }
    }

    /// Last observation (timeout) or failure reason (fail-fast).
    pub fn detail(&self) -> &str {
        match self {
            Self::TimedOut { last_observed, .. } => last_observed,
            Self::ConditionFailed { reason, .. } => reason,
            Self::InvalidPolicy(msg) => msg,
        }
    }
}

/// One key whose observed state differed from the expected state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch<K, S> {
    pub key: K,
    pub expected: S,
    pub observed: S,
}

/// Every mismatch seen on the final evaluation of an aggregate wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchReport<K, S> {
    pub what: String,
    pub elapsed: Duration,
    pub mismatches: Vec<Mismatch<K, S>>,
}

impl<K, S> MismatchReport<K, S> {
    pub fn len(&self) -> usize {
        self.mismatches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl<K: fmt::Debug, S: fmt::Debug> fmt::Display for MismatchReport<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} state(s) still mismatched after {:.1}s",
            self.what,
            self.mismatches.len(),
            self.elapsed.as_secs_f64()
        )?;
        for m in &self.mismatches {
            write!(
                f,
                "\n  {:?}: expected {:?} but got {:?}",
                m.key, m.expected, m.observed
            )?;
        }
        Ok(())
    }
}

impl<K: fmt::Debug, S: fmt::Debug> std::error::Error for MismatchReport<K, S> {}

/// Failure of an aggregate (multi-key) wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError<K, S> {
    /// Deadline passed with at least one key mismatched.
    Mismatch(MismatchReport<K, S>),
    /// The sampler failed, or the policy was invalid.
    Wait(WaitError),
}

impl<K, S> AggregateError<K, S> {
    pub fn mismatch_report(&self) -> Option<&MismatchReport<K, S>> {
        match self {
            Self::Mismatch(report) => Some(report),
            Self::Wait(_) => None,
        }
    }
}

impl<K, S> From<WaitError> for AggregateError<K, S> {
    fn from(err: WaitError) -> Self {
        Self::Wait(err)
    }
}

impl<K: fmt::Debug, S: fmt::Debug> fmt::Display for AggregateError<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch(report) => report.fmt(f),
            Self::Wait(err) => err.fmt(f),
        }
    }
}

impl<K: fmt::Debug, S: fmt::Debug> std::error::Error for AggregateError<K, S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mismatch(_) => None,
            Self::Wait(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_timeout_message_embeds_context() {
        let err = WaitError::TimedOut {
            what: "element 'OKButton' enabled".into(),
            elapsed: Duration::from_millis(5000),
            last_observed: "disabled".into(),
        };
        assert_eq!(
            err.to_string(),
            "timed out after 5.0s waiting for element 'OKButton' enabled; last observed: disabled"
        );
        assert!(err.is_timeout());
        assert_eq!(err.elapsed(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_report_lists_every_mismatch() {
        let report = MismatchReport {
            what: "ribbon".to_string(),
            elapsed: Duration::from_secs(5),
            mismatches: vec![
                Mismatch { key: "Login", expected: 1, observed: 0 },
                Mismatch { key: "Logout", expected: 0, observed: 1 },
            ],
        };
        assert_eq!(
            report.to_string(),
            "ribbon: 2 state(s) still mismatched after 5.0s\n  \
             \"Login\": expected 1 but got 0\n  \
             \"Logout\": expected 0 but got 1"
        );
    }
}
