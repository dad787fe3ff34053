// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

use super::*;

fn id(payload: &[u8]) -> Identifier {
    Identifier::from_payload(payload)
}

#[test]
fn test_internal_payload_round_trips_through_parse() {
    let pair = Node::InternalPair(id(b"left"), id(b"right"));
    let payload = pair.internal_payload().unwrap();
    assert_eq!(Node::parse_internal(&payload).unwrap(), pair);

    let single = Node::InternalSingle(id(b"only"));
    let payload = single.internal_payload().unwrap();
    assert_eq!(Node::parse_internal(&payload).unwrap(), single);
}

#[test]
fn test_parse_internal_rejects_garbage() {
    assert!(matches!(
        Node::parse_internal("not an identifier"),
        Err(NodeParseError::Identifier(_))
    ));
    let three = format!("{},{},{}", id(b"a"), id(b"b"), id(b"c"));
    assert_eq!(
        Node::parse_internal(&three),
        Err(NodeParseError::TooManyChildren(3))
    );
}

#[test]
fn test_children() {
    let left = id(b"left");
    let right = id(b"right");
    let pair = Node::InternalPair(left.clone(), right.clone());
    assert_eq!(pair.children(), vec![left, right]);

    assert!(Node::Pending.children().is_empty());
    assert!(Node::LeafMaterialized(vec![1, 2, 3]).children().is_empty());
}

#[test]
fn test_classifiers() {
    assert!(Node::Pending.is_pending());
    assert!(Node::LeafMaterialized(vec![]).is_leaf());
    assert!(Node::InternalSingle(id(b"x")).is_internal());
    assert!(Node::InternalPair(id(b"a"), id(b"b"))
        .internal_payload()
        .unwrap()
        .contains(','));
    assert_eq!(Node::Pending.internal_payload(), None);
}
