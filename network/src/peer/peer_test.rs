// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

use super::*;

const PING_RETRY: Duration = Duration::from_secs(30);
const REQUEST_RETRY: Duration = Duration::from_secs(5);

fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{}", port).parse().unwrap()
}

fn id(payload: &[u8]) -> Identifier {
    Identifier::from_payload(payload)
}

#[test]
fn test_unverified_peers_get_pinged_once_per_cadence() {
    let mut table = PeerTable::new();
    table.add_unverified(addr(9000));

    let now = Instant::now();
    assert_eq!(table.pings_due(now, PING_RETRY), vec![addr(9000)]);
    // Just pinged, so not due again yet.
    assert!(table.pings_due(now, PING_RETRY).is_empty());
    // ... but due again once the cadence has elapsed.
    assert_eq!(
        table.pings_due(now + PING_RETRY, PING_RETRY),
        vec![addr(9000)]
    );
}

#[test]
fn test_valid_peers_are_not_pinged() {
    let mut table = PeerTable::new();
    table.mark_alive(addr(9000));
    assert!(table.is_valid(&addr(9000)));
    assert!(table.pings_due(Instant::now(), PING_RETRY).is_empty());
}

#[test]
fn test_requests_go_to_valid_peers_only() {
    let mut table = PeerTable::new();
    table.add_unverified(addr(9000));
    table.mark_alive(addr(9001));
    let missing = vec![id(b"one"), id(b"two")];

    let now = Instant::now();
    let mut due = table.requests_due(now, REQUEST_RETRY, &missing);
    due.sort_by_key(|(_, id)| id.clone());
    let mut expected = vec![(addr(9001), id(b"one")), (addr(9001), id(b"two"))];
    expected.sort_by_key(|(_, id)| id.clone());
    assert_eq!(due, expected);

    // Nothing is due again within the retry window.
    assert!(table
        .requests_due(now, REQUEST_RETRY, &missing)
        .is_empty());
    // Everything is due again after it.
    assert_eq!(
        table
            .requests_due(now + REQUEST_RETRY, REQUEST_RETRY, &missing)
            .len(),
        2
    );
}

#[test]
fn test_new_missing_id_is_requested_immediately() {
    let mut table = PeerTable::new();
    table.mark_alive(addr(9001));
    let now = Instant::now();

    let first = vec![id(b"one")];
    assert_eq!(table.requests_due(now, REQUEST_RETRY, &first).len(), 1);

    // A second identifier shows up before the cadence elapses: only the
    // new one is due.
    let both = vec![id(b"one"), id(b"two")];
    assert_eq!(
        table.requests_due(now, REQUEST_RETRY, &both),
        vec![(addr(9001), id(b"two"))]
    );
}

#[test]
fn test_add_unverified_does_not_downgrade() {
    let mut table = PeerTable::new();
    table.mark_alive(addr(9000));
    table.add_unverified(addr(9000));
    assert!(table.is_valid(&addr(9000)));
    assert_eq!(table.len(), 1);
}
