/**
 * Integration tests for the resend queue
 *
 * These drive the queue the way the daemon does:
 * - packet path records Requests/Updates and retires answered Requests
 * - timer path expires, fires, and re-reads the wake hint
 */
use dvmesh_resend::{
    AcceptAll, NetworkId, Prefix, PrefixDenyList, RecordOutcome, ResendConfig, ResendKind,
    ResendQueue, ResendRecord, RouterHash, Scope, SeqNo, Timestamp, Transmitter, REQUEST_MAX,
    UPDATE_MAX,
};
use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    Request {
        scope: Scope,
        prefix: Prefix,
        plen: u8,
        hop_limit: u8,
        seqno: SeqNo,
        router_hash: RouterHash,
    },
    Update {
        scope: Scope,
        urgent: bool,
        prefix: Prefix,
        plen: u8,
    },
}

#[derive(Default)]
struct RecordingTx {
    sent: Vec<Sent>,
}

impl Transmitter for RecordingTx {
    fn send_request(
        &mut self,
        scope: Scope,
        prefix: &Prefix,
        plen: u8,
        hop_limit: u8,
        seqno: SeqNo,
        router_hash: RouterHash,
    ) {
        self.sent.push(Sent::Request {
            scope,
            prefix: *prefix,
            plen,
            hop_limit,
            seqno,
            router_hash,
        });
    }

    fn send_update(&mut self, scope: Scope, urgent: bool, prefix: &Prefix, plen: u8) {
        self.sent.push(Sent::Update {
            scope,
            urgent,
            prefix: *prefix,
            plen,
        });
    }
}

// Helper function to build a test prefix
fn create_test_prefix() -> Prefix {
    Prefix::from("2001:db8:1::".parse::<Ipv6Addr>().unwrap())
}

fn at(ms: u64) -> Timestamp {
    Timestamp::from_millis(ms)
}

/// One timer-path iteration, as the event loop runs it
fn tick(queue: &mut ResendQueue, tx: &mut RecordingTx, now: Timestamp) -> usize {
    queue.expire_resend(now);
    queue.do_resend(tx, now)
}

// ====================
// Request lifecycle
// ====================

#[test]
fn test_request_fire_then_satisfy() {
    let mut queue = ResendQueue::new();
    let mut tx = RecordingTx::default();
    let p = create_test_prefix();

    let outcome = queue
        .record_resend(
            &AcceptAll,
            ResendRecord::request(p, 64, SeqNo::new(10), RouterHash::new(5))
                .with_delay(Duration::from_millis(100)),
            at(0),
        )
        .unwrap();
    assert_eq!(outcome, RecordOutcome::Inserted);

    assert_eq!(tick(&mut queue, &mut tx, at(99)), 0);
    assert!(tx.sent.is_empty());

    assert_eq!(tick(&mut queue, &mut tx, at(100)), 1);
    assert_eq!(
        tx.sent,
        vec![Sent::Request {
            scope: Scope::Any,
            prefix: p,
            plen: 64,
            hop_limit: 127,
            seqno: SeqNo::new(10),
            router_hash: RouterHash::new(5),
        }]
    );
    assert_eq!(queue.find_request(&p, 64).unwrap().delay.as_millis(), 200);

    assert!(queue.satisfy_request(&p, 64, SeqNo::new(12), RouterHash::new(5), Scope::Any, at(120)));
    assert!(queue.find_request(&p, 64).is_none());
    assert_eq!(queue.resend_time(), None);

    // Second identical observation finds nothing to retire
    assert!(!queue.satisfy_request(
        &p,
        64,
        SeqNo::new(12),
        RouterHash::new(5),
        Scope::Any,
        at(121),
    ));
    assert_eq!(queue.stats().satisfied, 1);
    assert_eq!(queue.stats().requests_sent, 1);
}

#[test]
fn test_request_backoff_sequence() {
    let config = ResendConfig {
        request_timeout_ms: u64::MAX,
        ..ResendConfig::default()
    };
    let mut queue = ResendQueue::with_config(config).unwrap();
    let mut tx = RecordingTx::default();
    let p = create_test_prefix();

    queue
        .record_resend(
            &AcceptAll,
            ResendRecord::request(p, 48, SeqNo::new(1), RouterHash::new(1))
                .with_delay(Duration::from_millis(500)),
            at(0),
        )
        .unwrap();

    let mut fire_times = Vec::new();
    let mut delays = Vec::new();
    while let Some(wake) = queue.resend_time() {
        if fire_times.len() == 12 {
            break;
        }
        assert_eq!(tick(&mut queue, &mut tx, wake), 1);
        fire_times.push(wake.as_millis());
        delays.push(queue.find_request(&p, 48).unwrap().delay.as_millis());
    }

    assert_eq!(fire_times[..4], [500, 1_500, 3_500, 7_500]);
    assert_eq!(delays[..4], [1_000, 2_000, 4_000, 8_000]);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*delays.last().unwrap(), u16::MAX);
}

#[test]
fn test_request_attempt_budget() {
    let config = ResendConfig {
        request_timeout_ms: u64::MAX,
        ..ResendConfig::default()
    };
    let mut queue = ResendQueue::with_config(config).unwrap();
    let mut tx = RecordingTx::default();
    let p = create_test_prefix();

    queue
        .record_resend(
            &AcceptAll,
            ResendRecord::request(p, 64, SeqNo::new(1), RouterHash::new(1))
                .with_delay(Duration::from_millis(1)),
            at(0),
        )
        .unwrap();

    let mut now = at(0);
    let mut fires = 0;
    while let Some(wake) = queue.resend_time() {
        now = wake;
        fires += queue.do_resend(&mut tx, now);
    }
    assert_eq!(fires, usize::from(REQUEST_MAX));
    assert_eq!(queue.find_request(&p, 64).unwrap().max, 0);

    // Nothing left to fire, even much later
    assert_eq!(queue.do_resend(&mut tx, now.plus_millis(1_000_000)), 0);

    // The next sweep purges the exhausted Request
    assert_eq!(queue.expire_resend(now.plus_millis(1)), 1);
    assert!(queue.find_request(&p, 64).is_none());
    assert!(!queue.unsatisfied_request(&p, 64, SeqNo::new(1), RouterHash::new(1)));
}

#[test]
fn test_request_times_out_without_fires() {
    let mut queue = ResendQueue::new();
    let mut tx = RecordingTx::default();
    let p = Prefix::from(Ipv4Addr::new(192, 168, 0, 0));

    queue
        .record_resend(
            &AcceptAll,
            ResendRecord::request(p, 120, SeqNo::new(7), RouterHash::new(2)),
            at(10),
        )
        .unwrap();

    assert_eq!(tick(&mut queue, &mut tx, at(65_009)), 0);
    assert_eq!(queue.len(), 1);

    tick(&mut queue, &mut tx, at(65_010));
    assert!(queue.is_empty());
    assert!(tx.sent.is_empty());
}

#[test]
fn test_merge_restarts_timeout() {
    let mut queue = ResendQueue::new();
    let p = create_test_prefix();
    let record = ResendRecord::request(p, 64, SeqNo::new(3), RouterHash::new(9));

    queue.record_resend(&AcceptAll, record, at(0)).unwrap();
    // Stale merge still refreshes the timer
    let outcome = queue
        .record_resend(&AcceptAll, ResendRecord { seqno: SeqNo::new(2), ..record }, at(60_000))
        .unwrap();
    assert_eq!(outcome, RecordOutcome::Stale);

    assert_eq!(queue.expire_resend(at(70_000)), 0);
    assert_eq!(queue.expire_resend(at(125_000)), 1);
}

// ====================
// Update lifecycle
// ====================

#[test]
fn test_update_reflood_and_exhaust() {
    let mut queue = ResendQueue::new();
    let mut tx = RecordingTx::default();
    let p = create_test_prefix();
    let net = NetworkId::new(2);

    queue
        .record_resend(
            &AcceptAll,
            ResendRecord::update(p, 64, SeqNo::new(1), RouterHash::new(1))
                .on(net)
                .with_delay(Duration::from_millis(200)),
            at(0),
        )
        .unwrap();

    let mut now = 0;
    for _ in 0..UPDATE_MAX {
        now += 200;
        assert_eq!(queue.resend_time(), Some(at(now)));
        assert_eq!(tick(&mut queue, &mut tx, at(now)), 1);
    }

    let expected = Sent::Update {
        scope: Scope::Network(net),
        urgent: true,
        prefix: p,
        plen: 64,
    };
    assert_eq!(tx.sent, vec![expected; usize::from(UPDATE_MAX)]);
    assert_eq!(queue.resend_time(), None);

    tick(&mut queue, &mut tx, at(now + 1));
    assert!(queue.is_empty());
    assert_eq!(queue.stats().updates_sent, u64::from(UPDATE_MAX));
}

#[test]
fn test_update_merge_resets_budget() {
    let mut queue = ResendQueue::new();
    let mut tx = RecordingTx::default();
    let p = create_test_prefix();
    let record = ResendRecord::update(p, 64, SeqNo::new(1), RouterHash::new(1))
        .with_delay(Duration::from_millis(100));

    queue.record_resend(&AcceptAll, record, at(0)).unwrap();
    tick(&mut queue, &mut tx, at(100));
    tick(&mut queue, &mut tx, at(200));
    assert_eq!(queue.get(ResendKind::Update, &p, 64).unwrap().max, UPDATE_MAX - 2);

    queue.record_resend(&AcceptAll, record, at(250)).unwrap();
    assert_eq!(queue.get(ResendKind::Update, &p, 64).unwrap().max, UPDATE_MAX);
    assert_eq!(queue.resend_time(), Some(at(350)));
}

// ====================
// Deduplication and filtering
// ====================

#[test]
fn test_uniqueness_under_mixed_records() {
    let mut queue = ResendQueue::new();
    let prefixes: Vec<Prefix> = (0..4u8)
        .map(|i| Prefix::from(Ipv4Addr::new(10, i, 0, 0)))
        .collect();

    let mut keys = HashSet::new();
    for round in 0..50u16 {
        for (i, p) in prefixes.iter().enumerate() {
            let plen = if round % 2 == 0 { 112 } else { 120 };
            let seqno = SeqNo::new(round.wrapping_mul(7919));
            let hash = RouterHash::new(i as u16 % 2);
            let record = if round % 3 == 0 {
                ResendRecord::update(*p, plen, seqno, hash)
            } else {
                ResendRecord::request(*p, plen, seqno, hash)
            };
            queue
                .record_resend(
                    &AcceptAll,
                    record.with_delay(Duration::from_millis(u64::from(round) + 1)),
                    at(u64::from(round)),
                )
                .unwrap();
            keys.insert((record.kind, *p, plen));
        }
    }

    assert_eq!(queue.len(), keys.len());
    let seen: HashSet<_> = queue.iter().map(|e| (e.kind, e.prefix, e.plen)).collect();
    assert_eq!(seen, keys);
}

#[test]
fn test_wraparound_seqno_not_overwritten() {
    let mut queue = ResendQueue::new();
    let p = create_test_prefix();

    queue
        .record_resend(
            &AcceptAll,
            ResendRecord::request(p, 64, SeqNo::new(5), RouterHash::new(5)),
            at(0),
        )
        .unwrap();
    let outcome = queue
        .record_resend(
            &AcceptAll,
            ResendRecord::request(p, 64, SeqNo::new(65530), RouterHash::new(5)),
            at(1),
        )
        .unwrap();

    assert_eq!(outcome, RecordOutcome::Stale);
    assert_eq!(queue.find_request(&p, 64).unwrap().seqno, SeqNo::new(5));

    // An update at 65530 does not satisfy a request for 5
    assert!(!queue.unsatisfied_request(&p, 64, SeqNo::new(65530), RouterHash::new(5)));
    assert!(!queue.satisfy_request(
        &p,
        64,
        SeqNo::new(65530),
        RouterHash::new(5),
        Scope::Any,
        at(2),
    ));
    assert!(queue.unsatisfied_request(&p, 64, SeqNo::new(6), RouterHash::new(5)));
}

#[test]
fn test_filtered_prefix_not_tracked() {
    let mut queue = ResendQueue::new();
    let mut filter = PrefixDenyList::new();
    let p = create_test_prefix();
    filter.deny(p, 64);

    let outcome = queue
        .record_resend(
            &filter,
            ResendRecord::request(p, 64, SeqNo::new(1), RouterHash::new(1))
                .with_delay(Duration::from_millis(10)),
            at(0),
        )
        .unwrap();
    assert_eq!(outcome, RecordOutcome::Filtered);
    assert!(queue.find_request(&p, 64).is_none());

    // Other lengths of the same prefix are admitted
    let outcome = queue
        .record_resend(
            &filter,
            ResendRecord::request(p, 56, SeqNo::new(1), RouterHash::new(1)),
            at(0),
        )
        .unwrap();
    assert_eq!(outcome, RecordOutcome::Inserted);
}

// ====================
// Interface handling
// ====================

#[test]
fn test_interface_down_flushes_scoped_entries() {
    let mut queue = ResendQueue::new();
    let mut tx = RecordingTx::default();
    let p = create_test_prefix();
    let q = Prefix::from(Ipv4Addr::new(10, 1, 0, 0));
    let eth0 = NetworkId::new(1);

    queue
        .record_resend(
            &AcceptAll,
            ResendRecord::request(p, 64, SeqNo::new(1), RouterHash::new(1))
                .on(eth0)
                .with_delay(Duration::from_millis(50)),
            at(0),
        )
        .unwrap();
    queue
        .record_resend(
            &AcceptAll,
            ResendRecord::request(q, 112, SeqNo::new(1), RouterHash::new(1))
                .with_delay(Duration::from_millis(80)),
            at(0),
        )
        .unwrap();
    assert_eq!(queue.resend_time(), Some(at(50)));

    assert_eq!(queue.flush_network(eth0, at(10)), 1);
    assert_eq!(queue.resend_time(), Some(at(80)));
    assert_eq!(queue.time_until_wake(at(10)), Some(Duration::from_millis(70)));

    assert_eq!(tick(&mut queue, &mut tx, at(80)), 1);
    assert!(matches!(tx.sent[0], Sent::Request { prefix, .. } if prefix == q));
}
