//! Caller-supplied time for the resend queue.
//!
//! The queue never reads a clock. The event loop samples "now" once per
//! iteration and hands the same [`Timestamp`] to every call it makes, which
//! also keeps tests deterministic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Monotonic protocol timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Zero timestamp (daemon start).
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from milliseconds.
    #[inline]
    pub const fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    /// Get the timestamp as milliseconds.
    #[inline]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Add a number of milliseconds, saturating.
    #[inline]
    pub const fn plus_millis(self, ms: u64) -> Self {
        Timestamp(self.0.saturating_add(ms))
    }

    /// Milliseconds elapsed from `earlier` to `self`; zero if `earlier` is later.
    #[inline]
    pub const fn millis_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Duration from `self` until `later`; zero if already reached.
    pub fn duration_until(self, later: Timestamp) -> Duration {
        Duration::from_millis(later.0.saturating_sub(self.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Earlier of an optional running minimum and a candidate.
pub(crate) fn earliest(current: Option<Timestamp>, candidate: Timestamp) -> Option<Timestamp> {
    Some(match current {
        Some(t) => t.min(candidate),
        None => candidate,
    })
}
