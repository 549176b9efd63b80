//! Pending retransmissions of Requests and urgent Updates
//!
//! The queue holds at most one entry per (kind, prefix, plen). Repeated
//! decisions for the same prefix are merged into that entry instead of
//! queued twice. Requests back off exponentially until answered or timed out;
//! Updates are re-flooded at a fixed cadence until their attempt budget is
//! spent.
//!
//! All calls run to completion on the event-loop thread and take the
//! caller's `now`, sampled once per loop iteration.

use crate::config::ResendConfig;
use crate::error::{ResendError, Result};
use crate::filter::AdmissionFilter;
use crate::stats::ResendStats;
use crate::time::{earliest, Timestamp};
use crate::transmit::Transmitter;
use crate::types::{Delay, NetworkId, Prefix, ResendKind, RouterHash, Scope, SeqNo, MAX_PLEN};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

/// Identity of a resend entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResendKey {
    pub kind: ResendKind,
    pub prefix: Prefix,
    pub plen: u8,
}

impl ResendKey {
    pub fn new(kind: ResendKind, prefix: Prefix, plen: u8) -> Self {
        ResendKey { kind, prefix, plen }
    }

    pub fn request(prefix: Prefix, plen: u8) -> Self {
        Self::new(ResendKind::Request, prefix, plen)
    }
}

/// A decision to (re)send something for a prefix, as handed to
/// [`ResendQueue::record_resend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendRecord {
    pub kind: ResendKind,
    pub prefix: Prefix,
    pub plen: u8,
    pub seqno: SeqNo,
    pub router_hash: RouterHash,
    pub scope: Scope,
    /// Requested backoff; `None` records the entry without arming it
    pub delay: Option<Duration>,
}

impl ResendRecord {
    /// A Request for `prefix/plen`, unscoped and unarmed
    pub fn request(prefix: Prefix, plen: u8, seqno: SeqNo, router_hash: RouterHash) -> Self {
        ResendRecord {
            kind: ResendKind::Request,
            prefix,
            plen,
            seqno,
            router_hash,
            scope: Scope::Any,
            delay: None,
        }
    }

    /// An urgent Update for `prefix/plen`, unscoped and unarmed
    pub fn update(prefix: Prefix, plen: u8, seqno: SeqNo, router_hash: RouterHash) -> Self {
        ResendRecord {
            kind: ResendKind::Update,
            ..Self::request(prefix, plen, seqno, router_hash)
        }
    }

    /// Scope the record to one interface
    pub fn on(mut self, network: NetworkId) -> Self {
        self.scope = Scope::Network(network);
        self
    }

    /// Arm the record with a backoff interval
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn key(&self) -> ResendKey {
        ResendKey::new(self.kind, self.prefix, self.plen)
    }
}

/// Result of [`ResendQueue::record_resend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new entry was created
    Inserted,
    /// An existing entry took the new origin and seqno
    Merged,
    /// An existing entry already held a newer seqno from the same origin;
    /// only its timer and attempt budget were refreshed
    Stale,
    /// The admission filters exclude this prefix; nothing was recorded
    Filtered,
}

impl RecordOutcome {
    /// Whether the entry now carries the recorded seqno
    pub fn is_recorded(self) -> bool {
        matches!(self, RecordOutcome::Inserted | RecordOutcome::Merged)
    }
}

/// One pending retransmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResendEntry {
    pub kind: ResendKind,
    pub prefix: Prefix,
    pub plen: u8,
    pub seqno: SeqNo,
    pub router_hash: RouterHash,
    pub scope: Scope,
    pub delay: Delay,
    /// Remaining attempts
    pub max: u8,
    /// Creation, last merge or last fire
    pub time: Timestamp,
}

impl ResendEntry {
    /// When this entry is next due
    pub fn deadline(&self) -> Timestamp {
        self.time.plus_millis(u64::from(self.delay.as_millis()))
    }

    /// Has a backoff and attempts left
    pub fn is_armed(&self) -> bool {
        self.delay.is_armed() && self.max > 0
    }

    /// Whether an observation of (seqno, router_hash) answers this Request.
    ///
    /// It does unless it comes from the same origin and this entry already
    /// asks for something strictly newer.
    fn answered_by(&self, seqno: SeqNo, router_hash: RouterHash) -> bool {
        self.router_hash != router_hash || !self.seqno.is_newer_than(seqno)
    }
}

/// The set of pending retransmissions plus its wake hint
#[derive(Debug)]
pub struct ResendQueue {
    entries: HashMap<ResendKey, ResendEntry>,

    /// Earliest deadline over armed entries; `None` when nothing is pending
    resend_time: Option<Timestamp>,

    config: ResendConfig,

    stats: ResendStats,
}

impl ResendQueue {
    /// Create an empty queue with default settings
    pub fn new() -> Self {
        Self::from_config(ResendConfig::default())
    }

    /// Create an empty queue with custom settings
    ///
    /// The configuration is validated first, so a queue never starts with a
    /// zero attempt budget or a zero request timeout.
    pub fn with_config(config: ResendConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: ResendConfig) -> Self {
        ResendQueue {
            entries: HashMap::new(),
            resend_time: None,
            config,
            stats: ResendStats::default(),
        }
    }

    pub fn config(&self) -> &ResendConfig {
        &self.config
    }

    /// Record a decision to resend, merging into any entry for the same key
    ///
    /// Every merge refreshes the entry's timer and attempt budget and keeps
    /// the shorter of the two backoffs. The origin and seqno are replaced
    /// unless the stored seqno from the same origin is already newer; a
    /// merge from a different interface widens the entry to any interface.
    pub fn record_resend<F: AdmissionFilter + ?Sized>(
        &mut self,
        filter: &F,
        record: ResendRecord,
        now: Timestamp,
    ) -> Result<RecordOutcome> {
        if record.plen > MAX_PLEN {
            return Err(ResendError::InvalidPrefixLength(record.plen));
        }

        if filter.excludes(&record.prefix, record.plen, record.scope) {
            self.stats.filtered += 1;
            debug!(
                "Not recording {} for {}/{}: filtered",
                record.kind, record.prefix, record.plen
            );
            return Ok(RecordOutcome::Filtered);
        }

        let delay = Delay::clamped(record.delay);
        let max = self.config.max_for(record.kind);
        let key = record.key();

        let outcome = if let Some(entry) = self.entries.get_mut(&key) {
            merge_entry(entry, &record, delay, max, now)
        } else {
            if self.entries.len() >= self.config.max_entries {
                return Err(ResendError::QueueFull {
                    max: self.config.max_entries,
                });
            }
            self.entries
                .try_reserve(1)
                .map_err(|_| ResendError::AllocationFailure)?;
            self.entries.insert(
                key,
                ResendEntry {
                    kind: record.kind,
                    prefix: record.prefix,
                    plen: record.plen,
                    seqno: record.seqno,
                    router_hash: record.router_hash,
                    scope: record.scope,
                    delay,
                    max,
                    time: now,
                },
            );
            debug!(
                "Recorded {} for {}/{} (seqno {}, delay {}ms)",
                record.kind,
                record.prefix,
                record.plen,
                record.seqno,
                delay.as_millis()
            );
            RecordOutcome::Inserted
        };

        match outcome {
            RecordOutcome::Inserted => self.stats.inserted += 1,
            RecordOutcome::Merged => self.stats.merged += 1,
            RecordOutcome::Stale => self.stats.stale += 1,
            RecordOutcome::Filtered => {}
        }

        self.recompute_resend_time(now);
        Ok(outcome)
    }

    /// The pending Request for `prefix/plen`, if any
    pub fn find_request(&self, prefix: &Prefix, plen: u8) -> Option<&ResendEntry> {
        self.entries.get(&ResendKey::request(*prefix, plen))
    }

    /// Whether an observed (seqno, router_hash) bears on an outstanding Request
    ///
    /// Returns `false` when no Request is pending for the prefix, or when the
    /// observation comes from the Request's origin and the Request already
    /// asks for a newer seqno. Has no side effects.
    pub fn unsatisfied_request(
        &self,
        prefix: &Prefix,
        plen: u8,
        seqno: SeqNo,
        router_hash: RouterHash,
    ) -> bool {
        match self.find_request(prefix, plen) {
            Some(request) => request.answered_by(seqno, router_hash),
            None => false,
        }
    }

    /// Retire the pending Request for `prefix/plen` if the observation answers it
    ///
    /// An observation scoped to one interface only counts for a Request scoped
    /// to that same interface; an unscoped observation counts for any Request.
    /// Returns whether the Request was removed.
    pub fn satisfy_request(
        &mut self,
        prefix: &Prefix,
        plen: u8,
        seqno: SeqNo,
        router_hash: RouterHash,
        scope: Scope,
        now: Timestamp,
    ) -> bool {
        let key = ResendKey::request(*prefix, plen);
        let Some(request) = self.entries.get(&key) else {
            return false;
        };

        if let Scope::Network(_) = scope {
            if request.scope != scope {
                return false;
            }
        }

        if !request.answered_by(seqno, router_hash) {
            return false;
        }

        self.entries.remove(&key);
        self.stats.satisfied += 1;
        debug!("Request for {}/{} satisfied (seqno {})", prefix, plen, seqno);
        self.recompute_resend_time(now);
        true
    }

    /// Drop timed-out Requests and any entry with no attempts left
    ///
    /// Returns the number of entries removed.
    pub fn expire_resend(&mut self, now: Timestamp) -> usize {
        let timeout = self.config.request_timeout_ms;
        let before = self.entries.len();

        self.entries.retain(|_, entry| {
            let expired = is_expired(entry, now, timeout);
            if expired {
                debug!("Expired {} for {}/{}", entry.kind, entry.prefix, entry.plen);
            }
            !expired
        });

        let removed = before - self.entries.len();
        if removed > 0 {
            self.stats.expired += removed as u64;
            self.recompute_resend_time(now);
        }
        removed
    }

    /// Fire every due entry once
    ///
    /// Requests are resent with the configured hop limit and their backoff
    /// doubles; Updates are re-flooded as urgent at a constant cadence. Each
    /// fire consumes one attempt and re-arms the entry from `now`. Returns the
    /// number of messages sent.
    pub fn do_resend<T: Transmitter + ?Sized>(&mut self, tx: &mut T, now: Timestamp) -> usize {
        let timeout = self.config.request_timeout_ms;
        let hop_limit = self.config.request_hop_limit;
        let mut fired = 0;

        for entry in self.entries.values_mut() {
            if is_expired(entry, now, timeout) || !entry.is_armed() || now < entry.deadline() {
                continue;
            }

            match entry.kind {
                ResendKind::Request => {
                    trace!(
                        "Resending request for {}/{} (seqno {}, delay {}ms)",
                        entry.prefix,
                        entry.plen,
                        entry.seqno,
                        entry.delay.as_millis()
                    );
                    tx.send_request(
                        entry.scope,
                        &entry.prefix,
                        entry.plen,
                        hop_limit,
                        entry.seqno,
                        entry.router_hash,
                    );
                    entry.delay = entry.delay.doubled();
                    self.stats.requests_sent += 1;
                }
                ResendKind::Update => {
                    trace!("Resending update for {}/{}", entry.prefix, entry.plen);
                    tx.send_update(entry.scope, true, &entry.prefix, entry.plen);
                    self.stats.updates_sent += 1;
                }
            }

            entry.max -= 1;
            entry.time = now;
            fired += 1;
        }

        self.recompute_resend_time(now);
        fired
    }

    /// Recompute the wake hint from scratch
    pub fn recompute_resend_time(&mut self, now: Timestamp) {
        let timeout = self.config.request_timeout_ms;
        self.resend_time = self
            .entries
            .values()
            .filter(|entry| !is_expired(entry, now, timeout) && entry.is_armed())
            .map(ResendEntry::deadline)
            .fold(None, earliest);
        trace!("Next resend at {:?}", self.resend_time);
    }

    /// Earliest time the queue needs servicing; `None` when nothing is pending
    pub fn resend_time(&self) -> Option<Timestamp> {
        self.resend_time
    }

    /// How long the event loop may sleep before calling back in
    pub fn time_until_wake(&self, now: Timestamp) -> Option<Duration> {
        self.resend_time.map(|wake| now.duration_until(wake))
    }

    /// Drop every entry scoped to a network that went away
    ///
    /// Entries scoped to any interface are kept. Returns the number removed.
    pub fn flush_network(&mut self, network: NetworkId, now: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.scope != Scope::Network(network));

        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(
                "Flushed {} resend entries for interface {}",
                removed,
                network.ifindex()
            );
            self.stats.flushed += removed as u64;
            self.recompute_resend_time(now);
        }
        removed
    }

    /// Look up any entry by key
    pub fn get(&self, kind: ResendKind, prefix: &Prefix, plen: u8) -> Option<&ResendEntry> {
        self.entries.get(&ResendKey::new(kind, *prefix, plen))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResendEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
        self.resend_time = None;
    }

    pub fn stats(&self) -> ResendStats {
        self.stats.clone()
    }

    pub fn clear_stats(&mut self) {
        self.stats = ResendStats::default();
    }
}

impl Default for ResendQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_entry(
    entry: &mut ResendEntry,
    record: &ResendRecord,
    delay: Delay,
    max: u8,
    now: Timestamp,
) -> RecordOutcome {
    if entry.delay.is_armed() && delay.is_armed() {
        entry.delay = entry.delay.min(delay);
    } else if delay.is_armed() {
        entry.delay = delay;
    }
    entry.time = now;
    entry.max = max;

    if entry.router_hash == record.router_hash && entry.seqno.is_newer_than(record.seqno) {
        return RecordOutcome::Stale;
    }

    entry.router_hash = record.router_hash;
    entry.seqno = record.seqno;
    if entry.scope != record.scope {
        entry.scope = Scope::Any;
    }
    RecordOutcome::Merged
}

fn is_expired(entry: &ResendEntry, now: Timestamp, request_timeout_ms: u64) -> bool {
    match entry.kind {
        ResendKind::Request => {
            entry.max == 0 || now.millis_since(entry.time) >= request_timeout_ms
        }
        ResendKind::Update => entry.max == 0,
    }
}
