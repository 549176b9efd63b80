//! Admission filters consulted before a resend is recorded

use crate::types::{Prefix, Scope};
use std::collections::HashSet;

/// Route cost as returned by the filters
pub type Cost = u16;

/// Cost at or above which a prefix is administratively excluded
pub const INFINITY: Cost = 0xFFFF;

/// Input/output filter pair for a prefix on an interface
///
/// Rule evaluation lives with the routing daemon; the resend queue only
/// needs to know whether either direction excludes the prefix.
pub trait AdmissionFilter {
    /// Cost the input filter assigns to routes for this prefix
    fn input_filter(&self, prefix: &Prefix, plen: u8, scope: Scope) -> Cost;

    /// Cost the output filter assigns to announcements of this prefix
    fn output_filter(&self, prefix: &Prefix, plen: u8, scope: Scope) -> Cost;

    /// Whether either direction excludes the prefix
    fn excludes(&self, prefix: &Prefix, plen: u8, scope: Scope) -> bool {
        self.input_filter(prefix, plen, scope) >= INFINITY
            || self.output_filter(prefix, plen, scope) >= INFINITY
    }
}

/// Filter that admits every prefix
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AdmissionFilter for AcceptAll {
    fn input_filter(&self, _prefix: &Prefix, _plen: u8, _scope: Scope) -> Cost {
        0
    }

    fn output_filter(&self, _prefix: &Prefix, _plen: u8, _scope: Scope) -> Cost {
        0
    }
}

/// Filter that excludes an explicit set of (prefix, plen) pairs on input
#[derive(Debug, Clone, Default)]
pub struct PrefixDenyList {
    denied: HashSet<(Prefix, u8)>,
}

impl PrefixDenyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude a prefix from resend tracking
    pub fn deny(&mut self, prefix: Prefix, plen: u8) {
        self.denied.insert((prefix, plen));
    }

    /// Admit a previously denied prefix again
    pub fn allow(&mut self, prefix: &Prefix, plen: u8) -> bool {
        self.denied.remove(&(*prefix, plen))
    }

    pub fn len(&self) -> usize {
        self.denied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.denied.is_empty()
    }
}

impl AdmissionFilter for PrefixDenyList {
    fn input_filter(&self, prefix: &Prefix, plen: u8, _scope: Scope) -> Cost {
        if self.denied.contains(&(*prefix, plen)) {
            INFINITY
        } else {
            0
        }
    }

    fn output_filter(&self, _prefix: &Prefix, _plen: u8, _scope: Scope) -> Cost {
        0
    }
}
