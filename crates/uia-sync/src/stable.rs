//! Waiting for a changing value to settle.
//!
//! Asynchronous population (a grid filling from a web response, for example)
//! passes through intermediate values that look valid but are incomplete. A
//! value is only accepted after it has been read unchanged across a full
//! stability window.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::WaitError;
use crate::policy::{PollPolicy, QueryResult};
use crate::synchronizer::Synchronizer;

/// Per-wait stability bookkeeping.
///
/// The window starts on the first sample that repeats the previous one and is
/// satisfied by a later sample, still unchanged, taken strictly after the
/// window has elapsed. Default values mean "nothing populated yet" and clear
/// all tracking; any other change restarts the window.
#[derive(Debug)]
struct StabilityTracker<V> {
    window: Duration,
    last: Option<V>,
    confirmed_at: Option<Instant>,
}

impl<V> StabilityTracker<V>
where
    V: PartialEq + Default + Clone + fmt::Debug,
{
    fn new(window: Duration) -> Self {
        Self {
            window,
            last: None,
            confirmed_at: None,
        }
    }

    fn observe(&mut self, sample: V, now: Instant) -> QueryResult<V> {
        if sample == V::default() {
            self.last = None;
            self.confirmed_at = None;
            return QueryResult::pending(format!("{sample:?} (not populated)"));
        }

        match &self.last {
            Some(prev) if *prev == sample => {
                let since = *self.confirmed_at.get_or_insert(now);
                let held = now.saturating_duration_since(since);
                if held > self.window {
                    QueryResult::Satisfied(sample)
                } else {
                    QueryResult::pending(format!("{sample:?} unchanged for {held:?}"))
                }
            }
            prev => {
                if let Some(prev) = prev {
                    debug!(from = ?prev, to = ?sample, "sampled value changed, restarting stability window");
                }
                let observed = format!("{sample:?} (changed)");
                self.last = Some(sample);
                self.confirmed_at = None;
                QueryResult::NotYetSatisfied(observed)
            }
        }
    }
}

impl Synchronizer {
    /// Wait until `sampler` keeps returning the same non-default value for the
    /// policy's stability window, and return that value.
    ///
    /// A sampler error aborts the wait immediately.
    pub fn wait_for_stable<V, F, E>(
        &self,
        what: &str,
        policy: &PollPolicy,
        mut sampler: F,
    ) -> Result<V, WaitError>
    where
        V: PartialEq + Default + Clone + fmt::Debug,
        F: FnMut() -> Result<V, E>,
        E: fmt::Display,
    {
        let clock = self.shared_clock();
        let mut tracker = StabilityTracker::new(policy.stability_window());

        self.wait_for(what, policy, || match sampler() {
            Ok(sample) => tracker.observe(sample, clock.now()),
            Err(e) => QueryResult::failed(e),
        })
    }
}
