//! Resend queue statistics

use serde::{Deserialize, Serialize};

/// Counters maintained by [`crate::ResendQueue`]
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendStats {
    pub inserted: u64,
    pub merged: u64,
    /// Merges whose seqno was not fresher than the stored one
    pub stale: u64,
    pub filtered: u64,
    pub satisfied: u64,
    pub expired: u64,
    pub flushed: u64,
    pub requests_sent: u64,
    pub updates_sent: u64,
}

impl ResendStats {
    /// Total retransmissions fired
    pub fn total_sent(&self) -> u64 {
        self.requests_sent + self.updates_sent
    }
}
