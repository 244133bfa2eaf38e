//! Multi-key expectations checked jointly on every tick.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AggregateError, Mismatch, MismatchReport, WaitError};
use crate::policy::{PollPolicy, QueryResult};
use crate::synchronizer::Synchronizer;

/// Expected state per key. Satisfied only when every entry matches at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateExpectation<K: Ord, S> {
    entries: BTreeMap<K, S>,
}

impl<K: Ord, S> StateExpectation<K, S> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn expect(mut self, key: impl Into<K>, state: S) -> Self {
        self.entries.insert(key.into(), state);
        self
    }

    pub fn get(&self, key: &K) -> Option<&S> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &S)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, S> StateExpectation<K, S>
where
    K: Ord + Clone,
    S: PartialEq + Clone,
{
    /// Sample every key once and return the keys that differ, in key order.
    pub fn diff<F, E>(&self, mut sampler: F) -> Result<Vec<Mismatch<K, S>>, E>
    where
        F: FnMut(&K) -> Result<S, E>,
    {
        let mut mismatches = Vec::new();
        for (key, expected) in &self.entries {
            let observed = sampler(key)?;
            if observed != *expected {
                mismatches.push(Mismatch {
                    key: key.clone(),
                    expected: expected.clone(),
                    observed,
                });
            }
        }
        Ok(mismatches)
    }
}

impl<K: Ord, S> Default for StateExpectation<K, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, S> FromIterator<(K, S)> for StateExpectation<K, S> {
    fn from_iter<I: IntoIterator<Item = (K, S)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<K: Ord, S> From<BTreeMap<K, S>> for StateExpectation<K, S> {
    fn from(entries: BTreeMap<K, S>) -> Self {
        Self { entries }
    }
}

impl Synchronizer {
    /// Poll every key of `expectation` each tick until all of them match.
    ///
    /// On timeout the error carries every key still mismatched on the final
    /// tick, not just the first one. A sampler error aborts immediately.
    pub fn wait_for_aggregate_match<K, S, F, E>(
        &self,
        what: &str,
        expectation: &StateExpectation<K, S>,
        policy: &PollPolicy,
        mut sampler: F,
    ) -> Result<(), AggregateError<K, S>>
    where
        K: Ord + Clone + fmt::Debug,
        S: PartialEq + Clone + fmt::Debug,
        F: FnMut(&K) -> Result<S, E>,
        E: fmt::Display,
    {
        let mut last_mismatches = Vec::new();

        let outcome = self.wait_for(what, policy, || match expectation.diff(&mut sampler) {
            Ok(mismatches) if mismatches.is_empty() => QueryResult::Satisfied(()),
            Ok(mismatches) => {
                let observed = format!(
                    "{} of {} mismatched (first: {:?})",
                    mismatches.len(),
                    expectation.len(),
                    mismatches[0].key
                );
                last_mismatches = mismatches;
                QueryResult::NotYetSatisfied(observed)
            }
            Err(e) => QueryResult::failed(e),
        });

        match outcome {
            Ok(()) => Ok(()),
            Err(WaitError::TimedOut { what, elapsed, .. }) => {
                Err(AggregateError::Mismatch(MismatchReport {
                    what,
                    elapsed,
                    mismatches: last_mismatches,
                }))
            }
            Err(other) => Err(AggregateError::Wait(other)),
        }
    }
}
