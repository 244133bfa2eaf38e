//! Bounded-time polling for synchronizing with UI state that changes on its
//! own schedule.
//!
//! UI automation tests observe an application that repaints, opens dialogs and
//! fills grids asynchronously. Every interaction therefore ends in "look again
//! until it is what I expect, or give up after a while". This crate provides
//! that loop once, with three flavours:
//!
//! - [`Synchronizer::wait_for`]: poll a condition that answers
//!   [`QueryResult::Satisfied`], [`QueryResult::NotYetSatisfied`] or
//!   [`QueryResult::Failed`] (fail fast, no need to wait out the deadline).
//! - [`Synchronizer::wait_for_stable`]: wait for a sampled value to stop
//!   changing for a stability window (grid row counts during population).
//! - [`Synchronizer::wait_for_aggregate_match`]: wait for a whole
//!   [`StateExpectation`] table to match at once, reporting every mismatch on
//!   timeout.
//!
//! All waits block the calling thread, sleep between polls through a
//! [`Clock`], and never extend their deadline.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use uia_sync::{PollPolicy, QueryResult, Synchronizer};
//!
//! let sync = Synchronizer::new();
//! let policy = PollPolicy::new(Duration::from_secs(2)).with_poll_interval(Duration::from_millis(10));
//!
//! let mut polls = 0;
//! let value = sync.wait_for("third poll", &policy, || {
//!     polls += 1;
//!     if polls < 3 {
//!         QueryResult::pending(format!("poll {polls}"))
//!     } else {
//!         QueryResult::Satisfied(polls)
//!     }
//! })?;
//! assert_eq!(value, 3);
//! # Ok::<(), uia_sync::WaitError>(())
//! ```

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod policy;
mod stable;
pub mod synchronizer;

pub use aggregate::StateExpectation;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AggregateError, Mismatch, MismatchReport, WaitError};
pub use policy::{PollPolicy, QueryResult, DEFAULT_POLL_INTERVAL, DEFAULT_STABILITY_WINDOW};
pub use synchronizer::Synchronizer;
