// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

use super::*;

fn id(payload: &[u8]) -> Identifier {
    Identifier::from_payload(payload)
}

#[test]
fn test_out_of_order_reassembly() {
    let mut table = ReassemblyTable::new();
    let leaf = id(b"leaf");

    assert_eq!(
        table.insert(leaf.clone(), 2, 3, b"cc".to_vec()).unwrap(),
        None
    );
    assert_eq!(
        table.insert(leaf.clone(), 0, 3, b"aa".to_vec()).unwrap(),
        None
    );
    assert_eq!(
        table.insert(leaf.clone(), 1, 3, b"bb".to_vec()).unwrap(),
        Some(b"aabbcc".to_vec())
    );
    // Completion clears the entry.
    assert!(table.is_empty());
}

#[test]
fn test_single_fragment_completes_immediately() {
    let mut table = ReassemblyTable::new();
    assert_eq!(
        table.insert(id(b"x"), 0, 1, b"only".to_vec()).unwrap(),
        Some(b"only".to_vec())
    );
}

#[test]
fn test_count_mismatch_rejected() {
    let mut table = ReassemblyTable::new();
    let leaf = id(b"leaf");
    table.insert(leaf.clone(), 0, 3, b"aa".to_vec()).unwrap();

    assert_eq!(
        table.insert(leaf.clone(), 1, 4, b"bb".to_vec()),
        Err(ReassemblyError::CountMismatch {
            declared: 4,
            expected: 3
        })
    );
    // The original series is unaffected.
    table.insert(leaf.clone(), 1, 3, b"bb".to_vec()).unwrap();
    assert_eq!(
        table.insert(leaf, 2, 3, b"cc".to_vec()).unwrap(),
        Some(b"aabbcc".to_vec())
    );
}

#[test]
fn test_duplicate_fragment_overwrites_slot() {
    let mut table = ReassemblyTable::new();
    let leaf = id(b"leaf");
    table.insert(leaf.clone(), 0, 2, b"aa".to_vec()).unwrap();
    table.insert(leaf.clone(), 0, 2, b"aa".to_vec()).unwrap();
    assert_eq!(
        table.insert(leaf, 1, 2, b"bb".to_vec()).unwrap(),
        Some(b"aabb".to_vec())
    );
}
