// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Random-access reads over a (possibly still resolving) hash tree.
//!
//! The reader never materializes a whole file: it walks from a root to the
//! leaves it needs, sleeping briefly whenever it reaches an entry whose
//! payload has not arrived yet. An identifier that has been evicted
//! entirely is re-registered as pending so the sync loop picks it up again.

#[cfg(test)]
mod reader_test;

use crate::store::{HashTreeStore, StoreError};
use rafdp_infallible::{Mutex, RwLock};
use rafdp_types::{
    node::Expanded,
    varint::{parse_varint, VarintError},
    Identifier, Node,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;

/// How long to sleep between polls of an unresolved entry.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Which end of the tree to descend towards.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Side {
    First,
    Last,
}

/// Error thrown by reader operations.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Varint(#[from] VarintError),

    /// An internal node appeared where a leaf was required, or vice versa.
    #[error("unexpected node shape at {0}")]
    UnexpectedShape(Identifier),

    /// A leaf reached by index walk carries a different chunk index.
    #[error("expected chunk {expected}, found chunk {actual}")]
    ChunkIndexMismatch { expected: u64, actual: u64 },
}

/// Derived per-root statistics, cached after first computation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HashStats {
    pub chunk_size: usize,
    pub last_chunk_size: usize,
    pub num_chunks: u64,
    pub est_file_size: u64,
}

/// Serves random byte ranges out of the store.
pub struct Reader {
    store: Arc<RwLock<HashTreeStore>>,
    stats_cache: Mutex<HashMap<Identifier, HashStats>>,
}

/// A node with its payload resolved, ready to descend through.
enum Resolved {
    Pair(Identifier, Identifier),
    Single(Identifier),
    Leaf(Vec<u8>),
}

impl Reader {
    pub fn new(store: Arc<RwLock<HashTreeStore>>) -> Self {
        Self {
            store,
            stats_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until `id` resolves to a concrete node and returns its
    /// descend-ready form.
    async fn resolve(&self, id: &Identifier) -> Result<Resolved, ReadError> {
        loop {
            let pending = {
                let store = self.store.read();
                match store.get(id) {
                    Ok(Node::InternalPair(left, right)) => {
                        return Ok(Resolved::Pair(left.clone(), right.clone()));
                    }
                    Ok(Node::InternalSingle(child)) => {
                        return Ok(Resolved::Single(child.clone()));
                    }
                    Ok(Node::LeafMaterialized(bytes)) => {
                        return Ok(Resolved::Leaf(bytes.clone()));
                    }
                    Ok(Node::LeafLocal { .. }) => match store.get_expanded(id)? {
                        Expanded::Leaf(bytes) => return Ok(Resolved::Leaf(bytes)),
                        Expanded::Internal(_) => {
                            return Err(ReadError::UnexpectedShape(id.clone()));
                        }
                    },
                    Ok(Node::Pending) => true,
                    Err(StoreError::NotFound(_)) => false,
                    Err(err) => return Err(err.into()),
                }
            };
            if !pending {
                // Evicted or never referenced here: re-register so the sync
                // loop requests it.
                self.store.write().insert_pending(id.clone());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Descends from `id` to the outermost leaf on the given side,
    /// returning the leaf's chunk index and raw bytes.
    pub async fn outermost(&self, id: &Identifier, side: Side) -> Result<(u64, Vec<u8>), ReadError> {
        let mut current = id.clone();
        loop {
            current = match self.resolve(&current).await? {
                Resolved::Pair(left, right) => match side {
                    Side::First => left,
                    Side::Last => right,
                },
                Resolved::Single(child) => child,
                Resolved::Leaf(payload) => {
                    let (index, chunk) = parse_varint(&payload)?;
                    return Ok((index, chunk.to_vec()));
                }
            };
        }
    }

    /// Walks to the leaf holding chunk `index`, guided by the bits of the
    /// index (MSB first, zero-padded to the depth implied by `top_index`).
    pub async fn chunk_at(
        &self,
        root: &Identifier,
        index: u64,
        top_index: u64,
    ) -> Result<Vec<u8>, ReadError> {
        let depth = if top_index == 0 {
            0
        } else {
            64 - top_index.leading_zeros() as usize
        };

        let mut current = root.clone();
        for level in (0..depth).rev() {
            let bit = (index >> level) & 1;
            current = match self.resolve(&current).await? {
                Resolved::Pair(left, right) => {
                    if bit == 0 {
                        left
                    } else {
                        right
                    }
                }
                // Odd-child promotion: follow the sole child regardless of
                // the bit.
                Resolved::Single(child) => child,
                Resolved::Leaf(_) => return Err(ReadError::UnexpectedShape(current)),
            };
        }

        match self.resolve(&current).await? {
            Resolved::Leaf(payload) => {
                let (actual, chunk) = parse_varint(&payload)?;
                if actual != index {
                    return Err(ReadError::ChunkIndexMismatch {
                        expected: index,
                        actual,
                    });
                }
                Ok(chunk.to_vec())
            }
            _ => Err(ReadError::UnexpectedShape(current)),
        }
    }

    /// Computes (or returns the cached) statistics for a root.
    pub async fn stats(&self, root: &Identifier) -> Result<HashStats, ReadError> {
        if let Some(stats) = self.stats_cache.lock().get(root) {
            return Ok(*stats);
        }

        let (_, first_chunk) = self.outermost(root, Side::First).await?;
        let (last_index, last_chunk) = self.outermost(root, Side::Last).await?;

        let chunk_size = first_chunk.len();
        let last_chunk_size = last_chunk.len();
        let num_chunks = last_index + 1;
        let stats = HashStats {
            chunk_size,
            last_chunk_size,
            num_chunks,
            est_file_size: chunk_size as u64 * (num_chunks - 1) + last_chunk_size as u64,
        };
        self.stats_cache.lock().insert(root.clone(), stats);
        Ok(stats)
    }

    /// Estimated size of the file behind `root`.
    pub async fn est_file_size(&self, root: &Identifier) -> Result<u64, ReadError> {
        Ok(self.stats(root).await?.est_file_size)
    }

    /// Reads `size` bytes starting at `offset`, clamped to the file.
    pub async fn range_read(
        &self,
        root: &Identifier,
        size: u64,
        offset: u64,
    ) -> Result<Vec<u8>, ReadError> {
        let stats = self.stats(root).await?;
        let offset = offset.min(stats.est_file_size);
        let size = size.min(stats.est_file_size - offset);
        if size == 0 {
            return Ok(vec![]);
        }

        let chunk_size = stats.chunk_size as u64;
        let start_index = offset / chunk_size;
        let end_index = stats.num_chunks.min((offset + size) / chunk_size + 1);

        let mut gathered = Vec::with_capacity(((end_index - start_index) * chunk_size) as usize);
        for index in start_index..end_index {
            let chunk = self.chunk_at(root, index, stats.num_chunks - 1).await?;
            gathered.extend_from_slice(&chunk);
        }

        let head = (offset - start_index * chunk_size) as usize;
        Ok(gathered
            .into_iter()
            .skip(head)
            .take(size as usize)
            .collect())
    }
}
