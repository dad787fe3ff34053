// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Node types of the content-addressed hash tree.
//!
//! Every entry in the tree is one of the variants below, keyed by its
//! [`Identifier`]. Internal nodes reference children by identifier, never by
//! pointer, so the tree is represented as a flat map and cannot contain
//! cycles by construction. Leaves either point back into a local file the
//! engine authored ([`Node::LeafLocal`]) or carry the materialized payload
//! received from a peer ([`Node::LeafMaterialized`]).

#[cfg(test)]
mod node_test;

use crate::identifier::{Identifier, IdentifierError};
use std::path::PathBuf;
use thiserror::Error;

/// Separator between the two children of an internal pair node, as it
/// appears in the node's hashed payload.
pub const CHILD_SEPARATOR: char = ',';

/// Error thrown when a received payload fails to classify as an internal
/// node.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum NodeParseError {
    /// A child field of the payload is not a well-formed identifier.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// The payload splits into more than two child fields.
    #[error("internal node payload carries {0} children")]
    TooManyChildren(usize),
}

/// A single entry in the hash tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Node {
    /// An internal node with two children. Hashed payload:
    /// `left ++ "," ++ right` as ASCII.
    InternalPair(Identifier, Identifier),

    /// An internal node with a single child, produced by odd-child
    /// promotion at a tree level. Hashed payload: the child identifier
    /// bytes.
    InternalSingle(Identifier),

    /// A leaf the engine authored locally; the payload lives on disk at
    /// `index * chunk_size` for up to `chunk_size` bytes. Never transmitted
    /// in this form.
    LeafLocal {
        path: PathBuf,
        index: u64,
        chunk_size: usize,
    },

    /// A leaf's concrete payload, already carrying its varint chunk-index
    /// prefix.
    LeafMaterialized(Vec<u8>),

    /// The identifier is known (announced or referenced by a resolved
    /// parent) but no payload has been resolved yet.
    Pending,
}

impl Node {
    pub fn is_pending(&self) -> bool {
        matches!(self, Node::Pending)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::LeafLocal { .. } | Node::LeafMaterialized(_))
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Node::InternalPair(..) | Node::InternalSingle(_))
    }

    /// Children referenced by this node, left to right.
    pub fn children(&self) -> Vec<Identifier> {
        match self {
            Node::InternalPair(left, right) => vec![left.clone(), right.clone()],
            Node::InternalSingle(child) => vec![child.clone()],
            _ => vec![],
        }
    }

    /// The ASCII payload of an internal node: exactly the bytes that hash to
    /// its identifier. `None` for leaves and pending entries.
    pub fn internal_payload(&self) -> Option<String> {
        match self {
            Node::InternalPair(left, right) => {
                Some(format!("{}{}{}", left, CHILD_SEPARATOR, right))
            }
            Node::InternalSingle(child) => Some(child.as_str().to_string()),
            _ => None,
        }
    }

    /// Classifies a received non-binary payload into an internal node: a
    /// payload of the form `"a,b"` is a pair, a bare identifier is a single.
    pub fn parse_internal(payload: &str) -> Result<Node, NodeParseError> {
        let fields: Vec<&str> = payload.split(CHILD_SEPARATOR).collect();
        match fields.as_slice() {
            [child] => Ok(Node::InternalSingle(child.parse()?)),
            [left, right] => Ok(Node::InternalPair(left.parse()?, right.parse()?)),
            _ => Err(NodeParseError::TooManyChildren(fields.len())),
        }
    }
}

/// The transmitted form of a resolved node, as produced by the store's
/// classifying accessor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Expanded {
    /// ASCII payload of an internal node.
    Internal(String),
    /// Materialized leaf bytes, varint chunk index included.
    Leaf(Vec<u8>),
}
