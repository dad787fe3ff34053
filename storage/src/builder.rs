// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Builds the hash tree of a local file.
//!
//! The file is streamed in fixed-size chunks; each chunk's identifier is
//! derived from `varint(index) ++ chunk` so that materialized leaves are
//! self-locating. The chunk identifiers are then folded level by level:
//! pairs form [`Node::InternalPair`] with payload `"left,right"`, an odd
//! trailing element is promoted through [`Node::InternalSingle`] with the
//! child identifier itself as payload. The sole surviving identifier is the
//! root, pinned with the file's size.


use crate::store::{HashTreeStore, StoreError};
use rafdp_types::{varint::VarintError, Identifier, Node};
use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};
use thiserror::Error;
use tracing::debug;

/// Size of a raw file chunk in bytes.
pub const CHUNK_SIZE: usize = 16384;

/// Error thrown when building the tree of a file fails.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// An empty file has no chunks and therefore no root.
    #[error("cannot build a tree for empty file {0}")]
    EmptyFile(String),

    /// A computed identifier is already resident as a different node. A
    /// genuine collision indicates a defect, so this is fatal.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The file has too many chunks for the varint index encoding.
    #[error(transparent)]
    Varint(#[from] VarintError),
}

/// Chunks `path`, inserts its leaves and internal nodes into `store`, pins
/// the resulting root with the file's size, and returns the root
/// identifier.
pub fn build_from_file(store: &mut HashTreeStore, path: &Path) -> Result<Identifier, BuildError> {
    let io_error = |source| BuildError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    let declared_size = file.metadata().map_err(io_error)?.len();
    let mut reader = BufReader::new(file);

    // Level zero: one locally-backed leaf per chunk.
    let mut level: Vec<Identifier> = Vec::new();
    loop {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let filled = read_chunk(&mut reader, &mut chunk).map_err(io_error)?;
        if filled == 0 {
            break;
        }
        chunk.truncate(filled);

        let index = level.len() as u64;
        let mut payload = rafdp_types::varint::to_varint(index)?;
        payload.extend_from_slice(&chunk);
        let id = Identifier::from_payload(&payload);
        store.insert(
            id.clone(),
            Node::LeafLocal {
                path: path.to_path_buf(),
                index,
                chunk_size: CHUNK_SIZE,
            },
        )?;
        level.push(id);
    }

    // Fold towards the root.
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for children in level.chunks(2) {
            let (node, payload) = match children {
                [left, right] => (
                    Node::InternalPair(left.clone(), right.clone()),
                    format!("{},{}", left, right),
                ),
                [only] => (
                    Node::InternalSingle(only.clone()),
                    only.as_str().to_string(),
                ),
                _ => unreachable!("chunks(2) yields one or two elements"),
            };
            let id = Identifier::from_payload(payload.as_bytes());
            store.insert(id.clone(), node)?;
            next.push(id);
        }
        level = next;
    }

    let root = level
        .pop()
        .ok_or_else(|| BuildError::EmptyFile(path.display().to_string()))?;
    store.pin_root(root.clone(), declared_size);
    debug!(path = %path.display(), root = %root, size = declared_size, "built hash tree");
    Ok(root)
}

/// Reads until `buf` is full or the stream ends; returns the bytes filled.
fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let count = reader.read(&mut buf[filled..])?;
        if count == 0 {
            break;
        }
        filled += count;
    }
    Ok(filled)
}
