// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

use super::*;

#[test]
fn test_identifier_shape() {
    let id = Identifier::from_payload(b"hello world");
    // Magic, version varint, multibase prefix for base58btc, then the
    // "Qm" pair every base58 sha2-256 multihash begins with.
    assert!(id.as_str().starts_with("RAFDP10zQm"));
    // 5 magic + 2 version + 1 multibase prefix + 46 base58 digest chars.
    assert_eq!(id.len(), 54);
}

#[test]
fn test_identifier_deterministic() {
    let first = Identifier::from_payload(b"payload");
    let second = Identifier::from_payload(b"payload");
    let other = Identifier::from_payload(b"payloae");
    assert_eq!(first, second);
    assert_ne!(first, other);
}

#[test]
fn test_from_wire() {
    let id = Identifier::from_payload(b"x");
    let parsed = Identifier::from_wire(id.as_bytes()).unwrap();
    assert_eq!(parsed, id);

    assert_eq!(
        Identifier::from_wire(b"QmMissingTheMagic"),
        Err(IdentifierError::MissingMagic)
    );
    assert_eq!(
        Identifier::from_wire(b"RAFDP10z\xff"),
        Err(IdentifierError::NotPrintableAscii)
    );
    assert_eq!(
        Identifier::from_wire(b"RAFDP10z with spaces"),
        Err(IdentifierError::NotPrintableAscii)
    );
}
