//! Core resend types

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// Size of a prefix in bytes (IPv6 width; IPv4 is carried v4-mapped)
pub const PREFIX_SIZE: usize = 16;

/// Longest valid prefix length
pub const MAX_PLEN: u8 = 128;

/// An address prefix value, always 16 bytes wide
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Prefix([u8; PREFIX_SIZE]);

impl Prefix {
    /// Create a Prefix from a byte array
    pub const fn from_bytes(bytes: [u8; PREFIX_SIZE]) -> Self {
        Prefix(bytes)
    }

    /// Get the bytes of this Prefix
    pub fn as_bytes(&self) -> &[u8; PREFIX_SIZE] {
        &self.0
    }

    /// Whether this is an IPv4-mapped prefix (`::ffff:a.b.c.d`)
    pub fn is_v4_mapped(&self) -> bool {
        Ipv6Addr::from(self.0).to_ipv4_mapped().is_some()
    }
}

impl From<Ipv6Addr> for Prefix {
    fn from(addr: Ipv6Addr) -> Self {
        Prefix(addr.octets())
    }
}

impl From<Ipv4Addr> for Prefix {
    fn from(addr: Ipv4Addr) -> Self {
        Prefix(addr.to_ipv6_mapped().octets())
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prefix({})", self)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = Ipv6Addr::from(self.0);
        match addr.to_ipv4_mapped() {
            Some(v4) => write!(f, "{}", v4),
            None => write!(f, "{}", addr),
        }
    }
}

/// Wrapping 16-bit sequence number
///
/// Ordering is modular: `a` is newer than `b` when `a - b`, taken as a
/// signed 16-bit value, is positive. This is not a total order, so `SeqNo`
/// deliberately does not implement `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeqNo(u16);

impl SeqNo {
    pub const fn new(value: u16) -> Self {
        SeqNo(value)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Wrap-aware comparison of `self` against `other`
    pub fn compare(self, other: SeqNo) -> Ordering {
        (self.0.wrapping_sub(other.0) as i16).cmp(&0)
    }

    /// Strictly newer than `other`, wrap-aware
    pub fn is_newer_than(self, other: SeqNo) -> bool {
        self.compare(other) == Ordering::Greater
    }
}

impl From<u16> for SeqNo {
    fn from(value: u16) -> Self {
        SeqNo(value)
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash identifying the advertising origin of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouterHash(u16);

impl RouterHash {
    pub const fn new(value: u16) -> Self {
        RouterHash(value)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl From<u16> for RouterHash {
    fn from(value: u16) -> Self {
        RouterHash(value)
    }
}

/// Opaque identity of a network interface (its interface index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkId(u32);

impl NetworkId {
    pub const fn new(ifindex: u32) -> Self {
        NetworkId(ifindex)
    }

    pub const fn ifindex(self) -> u32 {
        self.0
    }
}

/// Interface scope of a resend entry or an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scope {
    /// Not bound to a particular interface
    #[default]
    Any,
    /// Bound to one interface
    Network(NetworkId),
}

impl Scope {
    /// Interface index as seen by the filters (0 for any interface)
    pub fn ifindex(self) -> u32 {
        match self {
            Scope::Any => 0,
            Scope::Network(id) => id.ifindex(),
        }
    }
}

impl From<Option<NetworkId>> for Scope {
    fn from(network: Option<NetworkId>) -> Self {
        match network {
            Some(id) => Scope::Network(id),
            None => Scope::Any,
        }
    }
}

impl From<NetworkId> for Scope {
    fn from(network: NetworkId) -> Self {
        Scope::Network(network)
    }
}

/// Retransmission backoff interval in milliseconds, capped at 0xFFFF
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Delay(u16);

impl Delay {
    /// No scheduled retransmission; only the attempt budget is tracked
    pub const NONE: Delay = Delay(0);

    /// Saturation cap
    pub const SATURATED: Delay = Delay(u16::MAX);

    /// Build a delay from a requested interval
    ///
    /// `None` means no delay was requested. Intervals above 65535ms saturate.
    pub fn clamped(requested: Option<Duration>) -> Self {
        match requested {
            None => Delay::NONE,
            Some(d) => Delay(d.as_millis().min(u16::MAX as u128) as u16),
        }
    }

    pub const fn from_millis(ms: u16) -> Self {
        Delay(ms)
    }

    pub const fn as_millis(self) -> u16 {
        self.0
    }

    pub const fn is_armed(self) -> bool {
        self.0 > 0
    }

    pub const fn is_saturated(self) -> bool {
        self.0 == u16::MAX
    }

    /// Next exponential backoff step, saturating at the cap
    pub const fn doubled(self) -> Self {
        Delay(self.0.saturating_mul(2))
    }
}

/// Kind of pending retransmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResendKind {
    /// Route request awaiting an answer
    Request,
    /// Urgent update being re-flooded
    Update,
}

impl fmt::Display for ResendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResendKind::Request => write!(f, "request"),
            ResendKind::Update => write!(f, "update"),
        }
    }
}
