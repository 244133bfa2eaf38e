//! The polling loop.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::WaitError;
use crate::policy::{PollPolicy, QueryResult};

/// Blocking, stateless poller.
///
/// A `Synchronizer` only owns its clock. Each wait computes a fresh deadline
/// and runs on the calling thread; nothing is shared between calls, so one
/// instance can be cloned and reused freely.
#[derive(Clone)]
pub struct Synchronizer {
    clock: Arc<dyn Clock>,
}

impl Synchronizer {
    /// Synchronizer backed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn shared_clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Evaluate `condition` every `poll_interval` until it is satisfied, it
    /// fails, or `policy.timeout` elapses.
    ///
    /// The condition is always evaluated at least once, and once more at the
    /// deadline itself, so a timeout is reported no earlier than `timeout` and
    /// no later than `timeout + poll_interval`.
    pub fn wait_for<T, F>(
        &self,
        what: &str,
        policy: &PollPolicy,
        mut condition: F,
    ) -> Result<T, WaitError>
    where
        F: FnMut() -> QueryResult<T>,
    {
        policy.validate()?;

        let start = self.clock.now();
        // A timeout too large to represent as an instant never expires.
        let deadline = start.checked_add(policy.timeout);
        let mut polls: u32 = 0;
        let mut last_observed = String::from("<not evaluated>");

        debug!(what, timeout = ?policy.timeout, interval = ?policy.poll_interval, "wait started");

        loop {
            polls = polls.saturating_add(1);
            match condition() {
                QueryResult::Satisfied(value) => {
                    let elapsed = self.clock.now().saturating_duration_since(start);
                    debug!(what, polls, ?elapsed, "wait satisfied");
                    return Ok(value);
                }
                QueryResult::Failed(reason) => {
                    let elapsed = self.clock.now().saturating_duration_since(start);
                    debug!(what, polls, ?elapsed, %reason, "wait failed");
                    return Err(WaitError::ConditionFailed {
                        what: what.to_string(),
                        elapsed,
                        reason,
                    });
                }
                QueryResult::NotYetSatisfied(observed) => last_observed = observed,
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = self.clock.now();
                    if now >= deadline {
                        break;
                    }
                    policy.poll_interval.min(deadline.saturating_duration_since(now))
                }
                None => policy.poll_interval,
            };
            self.clock.sleep(pause);
        }

        let elapsed = self.clock.now().saturating_duration_since(start);
        warn!(what, polls, ?elapsed, last_observed = %last_observed, "wait timed out");
        Err(WaitError::TimedOut {
            what: what.to_string(),
            elapsed,
            last_observed,
        })
    }

    /// Boolean form of [`wait_for`](Self::wait_for). An `Err` from the
    /// predicate is treated as unrecoverable.
    pub fn wait_until<F, E>(
        &self,
        what: &str,
        policy: &PollPolicy,
        mut predicate: F,
    ) -> Result<(), WaitError>
    where
        F: FnMut() -> Result<bool, E>,
        E: fmt::Display,
    {
        self.wait_for(what, policy, || match predicate() {
            Ok(true) => QueryResult::Satisfied(()),
            Ok(false) => QueryResult::pending("condition not met"),
            Err(e) => QueryResult::failed(e),
        })
    }

    /// Retry a fallible operation until it succeeds or the deadline passes.
    ///
    /// Unlike [`wait_until`](Self::wait_until), errors here are transient: the
    /// host rejects calls while busy, so they are retried and the last one is
    /// reported on timeout.
    pub fn retry<T, F, E>(&self, what: &str, policy: &PollPolicy, mut op: F) -> Result<T, WaitError>
    where
        F: FnMut() -> Result<T, E>,
        E: fmt::Display,
    {
        self.wait_for(what, policy, || match op() {
            Ok(value) => QueryResult::Satisfied(value),
            Err(e) => QueryResult::pending(e),
        })
    }
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn manual() -> (Arc<ManualClock>, Synchronizer) {
        let clock = Arc::new(ManualClock::new());
        let sync = Synchronizer::with_clock(clock.clone());
        (clock, sync)
    }

    fn policy(timeout_ms: u64) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(timeout_ms))
    }

    #[test]
    fn test_satisfied_after_twelve_polls() {
        let (clock, sync) = manual();
        let mut calls = 0;
        let value = sync
            .wait_for("answer", &policy(5000), || {
                calls += 1;
                if calls <= 12 {
                    QueryResult::pending(format!("poll {calls}"))
                } else {
                    QueryResult::Satisfied(42)
                }
            })
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls, 13);
        assert_eq!(clock.elapsed(), Duration::from_millis(1200));
    }

    #[test]
    fn test_never_satisfied_times_out_at_deadline() {
        let (clock, sync) = manual();
        let err = sync
            .wait_for("never", &policy(5000), || QueryResult::<()>::pending("still loading"))
            .unwrap_err();

        match err {
            WaitError::TimedOut {
                what,
                elapsed,
                last_observed,
            } => {
                assert_eq!(what, "never");
                assert_eq!(elapsed, Duration::from_secs(5));
                assert_eq!(last_observed, "still loading");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(clock.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn test_failed_returns_without_waiting() {
        let (clock, sync) = manual();
        let mut calls = 0;
        let err = sync
            .wait_for("login", &policy(60_000), || {
                calls += 1;
                if calls < 3 {
                    QueryResult::<()>::pending("no error yet")
                } else {
                    QueryResult::failed("Credentials: 'bad password'")
                }
            })
            .unwrap_err();

        assert!(matches!(err, WaitError::ConditionFailed { .. }));
        assert_eq!(err.detail(), "Credentials: 'bad password'");
        assert_eq!(clock.elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn test_satisfied_immediately_does_not_sleep() {
        let (clock, sync) = manual();
        let v = sync.wait_for("now", &policy(1000), || QueryResult::Satisfied("x")).unwrap();
        assert_eq!(v, "x");
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_last_sleep_is_clamped_to_deadline() {
        let (clock, sync) = manual();
        let mut calls = 0;
        let err = sync
            .wait_for("odd timeout", &policy(250), || {
                calls += 1;
                QueryResult::<()>::pending(calls)
            })
            .unwrap_err();

        // t = 0, 100, 200, 250
        assert_eq!(calls, 4);
        assert_eq!(err.elapsed(), Some(Duration::from_millis(250)));
        assert_eq!(err.detail(), "4");
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn test_unrepresentable_timeout_waits_without_deadline() {
        let (clock, sync) = manual();
        let mut calls = 0;
        let v = sync
            .wait_for("forever", &PollPolicy::new(Duration::MAX), || {
                calls += 1;
                if calls < 3 {
                    QueryResult::pending("not yet")
                } else {
                    QueryResult::Satisfied(calls)
                }
            })
            .unwrap();
        assert_eq!(v, 3);
        assert_eq!(clock.elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn test_unrepresentable_timeout_still_fails_fast() {
        let (clock, sync) = manual();
        let err = sync
            .wait_for("login", &PollPolicy::new(Duration::MAX), || {
                QueryResult::<()>::failed("dialog closed")
            })
            .unwrap_err();
        assert!(matches!(err, WaitError::ConditionFailed { .. }));
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_invalid_policy_never_evaluates() {
        let (_clock, sync) = manual();
        let mut called = false;
        let err = sync
            .wait_for("bad", &PollPolicy::new(Duration::ZERO), || {
                called = true;
                QueryResult::Satisfied(())
            })
            .unwrap_err();
        assert!(matches!(err, WaitError::InvalidPolicy(_)));
        assert!(!called);
    }

    #[test]
    fn test_wait_until_error_is_fatal() {
        let (_clock, sync) = manual();
        let err = sync
            .wait_until("pred", &policy(1000), || Err::<bool, _>("element vanished"))
            .unwrap_err();
        assert!(matches!(err, WaitError::ConditionFailed { .. }));
    }

    #[test]
    fn test_wait_until_true_eventually() {
        let (clock, sync) = manual();
        let mut n = 0;
        sync.wait_until("pred", &policy(1000), || {
            n += 1;
            Ok::<_, String>(n == 4)
        })
        .unwrap();
        assert_eq!(clock.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn test_retry_reports_last_error() {
        let (_clock, sync) = manual();
        let mut attempts = 0;
        let err = sync
            .retry("write A1", &policy(500), || -> Result<(), String> {
                attempts += 1;
                Err(format!("host busy ({attempts})"))
            })
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.detail(), "host busy (6)");
    }

    #[test]
    fn test_retry_succeeds_after_transient_errors() {
        let (_clock, sync) = manual();
        let mut attempts = 0;
        let v = sync
            .retry("read A1", &policy(5000), || {
                attempts += 1;
                if attempts < 3 {
                    Err("busy")
                } else {
                    Ok(7.5)
                }
            })
            .unwrap();
        assert_eq!(v, 7.5);
    }

    #[test]
    fn test_real_clock_timeout_is_not_early() {
        let sync = Synchronizer::new();
        let policy = PollPolicy::new(Duration::from_millis(50))
            .with_poll_interval(Duration::from_millis(5));
        let err = sync
            .wait_for("real", &policy, || QueryResult::<()>::pending("nope"))
            .unwrap_err();
        assert!(err.elapsed().unwrap() >= Duration::from_millis(50));
    }
}
