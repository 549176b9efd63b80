//! Outbound actions fired by the resend queue

use crate::types::{Prefix, RouterHash, Scope, SeqNo};

/// Sends Request and Update messages on behalf of the resend queue
///
/// Calls are fire-and-forget; encoding and socket I/O belong to the
/// implementor.
pub trait Transmitter {
    /// Ask peers for the current state of `prefix/plen`
    fn send_request(
        &mut self,
        scope: Scope,
        prefix: &Prefix,
        plen: u8,
        hop_limit: u8,
        seqno: SeqNo,
        router_hash: RouterHash,
    );

    /// Announce the current state of `prefix/plen`
    fn send_update(&mut self, scope: Scope, urgent: bool, prefix: &Prefix, plen: u8);
}
