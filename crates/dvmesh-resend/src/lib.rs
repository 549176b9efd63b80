//! DvMesh Resend Queue
//!
//! Retransmission and deduplication of route control messages for the
//! distance-vector control plane:
//! - Requests retransmitted with exponential backoff until answered
//! - Urgent Updates re-flooded a bounded number of times
//! - One pending entry per (kind, prefix, plen), merged on repeat
//! - A wake hint telling the event loop when to call back in

pub mod config;
pub mod error;
pub mod filter;
pub mod queue;
pub mod stats;
pub mod time;
pub mod transmit;
pub mod types;

pub use config::ResendConfig;
pub use error::{ResendError, Result};
pub use filter::{AcceptAll, AdmissionFilter, Cost, PrefixDenyList, INFINITY};
pub use queue::{RecordOutcome, ResendEntry, ResendKey, ResendQueue, ResendRecord};
pub use stats::ResendStats;
pub use time::Timestamp;
pub use transmit::Transmitter;
pub use types::{Delay, NetworkId, Prefix, ResendKind, RouterHash, Scope, SeqNo};

/// Age after which an unanswered Request is dropped (milliseconds)
pub const REQUEST_TIMEOUT_MS: u64 = 65_000;

/// Attempt budget for Requests
pub const REQUEST_MAX: u8 = 128;

/// Attempt budget for urgent Updates
pub const UPDATE_MAX: u8 = 3;

/// Hop limit carried by retransmitted Requests
pub const REQUEST_HOP_LIMIT: u8 = 127;

/// Default bound on distinct pending entries (unbounded unless configured)
pub const DEFAULT_MAX_ENTRIES: usize = usize::MAX;
