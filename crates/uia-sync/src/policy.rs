//! Poll configuration and the tri-state result a condition reports each tick.

use std::fmt;
use std::time::Duration;

use crate::error::WaitError;

/// Default delay between two evaluations of a condition.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default time a sampled value must stay unchanged in [`wait_for_stable`].
///
/// [`wait_for_stable`]: crate::Synchronizer::wait_for_stable
pub const DEFAULT_STABILITY_WINDOW: Duration = Duration::from_secs(1);

/// How long to wait and how often to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Hard deadline, measured from the start of the wait. A timeout that
    /// overflows the clock (e.g. `Duration::MAX`) means no deadline.
    pub timeout: Duration,
    /// Delay between evaluations. The last sleep is cut short at the deadline.
    pub poll_interval: Duration,
    /// Only used by stability waits; `None` means [`DEFAULT_STABILITY_WINDOW`].
    pub stability_window: Option<Duration>,
}

impl PollPolicy {
    /// Policy with the given timeout and the default 100 ms interval.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stability_window: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_stability_window(mut self, window: Duration) -> Self {
        self.stability_window = Some(window);
        self
    }

    /// Effective stability window.
    pub fn stability_window(&self) -> Duration {
        self.stability_window.unwrap_or(DEFAULT_STABILITY_WINDOW)
    }

    /// Reject policies that could never produce a bounded, observable wait.
    pub fn validate(&self) -> Result<(), WaitError> {
        if self.timeout.is_zero() {
            return Err(WaitError::InvalidPolicy("timeout must be greater than zero".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(WaitError::InvalidPolicy(
                "poll interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of evaluating a condition once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult<T> {
    /// Keep polling. Carries a description of what was observed, reported if
    /// the wait eventually times out.
    NotYetSatisfied(String),
    /// Stop polling and return the value.
    Satisfied(T),
    /// Stop polling and fail without waiting out the deadline.
    Failed(String),
}

impl<T> QueryResult<T> {
    pub fn pending(observed: impl fmt::Display) -> Self {
        Self::NotYetSatisfied(observed.to_string())
    }

    pub fn failed(reason: impl fmt::Display) -> Self {
        Self::Failed(reason.to_string())
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryResult<U> {
        match self {
            Self::NotYetSatisfied(observed) => QueryResult::NotYetSatisfied(observed),
            Self::Satisfied(value) => QueryResult::Satisfied(f(value)),
            Self::Failed(reason) => QueryResult::Failed(reason),
        }
    }
}

impl<T> From<Option<T>> for QueryResult<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Satisfied(v),
            None => Self::NotYetSatisfied("not found".to_string()),
        }
    }
}
