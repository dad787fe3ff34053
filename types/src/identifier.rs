// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! The printable content identifier.
//!
//! An identifier is formed by concatenating the 5-character magic header,
//! the varint-encoded protocol version, and a multibase(base58btc) encoding
//! of the multihash(SHA2-256) of the payload. Identifiers are opaque keys:
//! their only semantic property is that identical payloads produce identical
//! identifiers, so a peer can reject a payload claimed to bear a given
//! identifier by recomputing it.

#[cfg(test)]
mod identifier_test;

use crate::varint;
use multibase::Base;
use multihash::{Code, MultihashDigest};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Leading magic of every identifier.
pub const MAGIC_HEADER: &str = "RAFDP";

/// Protocol version carried in every identifier, as a varint.
pub const VERSION: u64 = 0;

static VERSION_VARINT: Lazy<String> = Lazy::new(|| {
    let encoded = varint::to_varint(VERSION).expect("version fits in a varint");
    String::from_utf8(encoded).expect("varint output is ASCII")
});

/// Error thrown when identifier bytes received from the wire fail to parse.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum IdentifierError {
    /// The bytes are not printable ASCII.
    #[error("identifier bytes are not printable ASCII")]
    NotPrintableAscii,

    /// The bytes do not begin with the magic header.
    #[error("identifier does not begin with {}", MAGIC_HEADER)]
    MissingMagic,
}

/// The printable content address of a node; the integrity anchor of the
/// whole protocol.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Derives the identifier of a payload. Deterministic; performs no I/O.
    pub fn from_payload(payload: &[u8]) -> Self {
        let digest = Code::Sha2_256.digest(payload);
        let encoded = multibase::encode(Base::Base58Btc, digest.to_bytes());
        let mut inner =
            String::with_capacity(MAGIC_HEADER.len() + VERSION_VARINT.len() + encoded.len());
        inner.push_str(MAGIC_HEADER);
        inner.push_str(&VERSION_VARINT);
        inner.push_str(&encoded);
        Identifier(inner)
    }

    /// Parses identifier bytes received from the wire.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, IdentifierError> {
        let text = std::str::from_utf8(bytes).map_err(|_| IdentifierError::NotPrintableAscii)?;
        text.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::str::FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if !text.bytes().all(|byte| byte.is_ascii_graphic()) {
            return Err(IdentifierError::NotPrintableAscii);
        }
        if !text.starts_with(MAGIC_HEADER) {
            return Err(IdentifierError::MissingMagic);
        }
        Ok(Identifier(text.to_string()))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.0)
    }
}
