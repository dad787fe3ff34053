// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory storage for all nodes of the hash tree.
//!
//! The store maintains three views: the primary map from identifier to
//! node, the pinned roots with their declared file sizes (announced to
//! trackers, never evicted), and the derived "missing" view of identifiers
//! whose payload has not been resolved yet. The sync loop drives requests
//! off the missing view; the protocol handler transitions entries from
//! pending to concrete exactly once.


use rafdp_types::{
    node::Expanded,
    varint::{self, VarintError},
    Identifier, Node,
};
use rand::seq::IteratorRandom;
use std::{
    collections::HashMap,
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::PathBuf,
};
use thiserror::Error;
use tracing::debug;

/// Default cap on resident non-pinned nodes before eviction kicks in.
///
/// Substitutes the host-memory-percentage probe: with 16 KiB leaves this
/// bounds leaf payloads at roughly 4 GiB.
pub const DEFAULT_MAX_RESIDENT_NODES: usize = 262_144;

/// Error thrown by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The identifier has no entry at all.
    #[error("identifier not present in the tree: {0}")]
    NotFound(Identifier),

    /// The identifier is known but its payload has not been resolved.
    #[error("identifier is still pending: {0}")]
    Unresolved(Identifier),

    /// A different concrete node is already stored under this identifier.
    #[error("conflicting node already stored under {0}")]
    Conflict(Identifier),

    /// Reading a locally-authored leaf back from its file failed.
    #[error("failed to read chunk {index} of {path:?}: {source}")]
    LeafIo {
        path: PathBuf,
        index: u64,
        source: std::io::Error,
    },

    /// A chunk index too large for the varint encoding.
    #[error(transparent)]
    Varint(#[from] VarintError),
}

/// In-memory mapping from identifier to node, plus the pinned-roots and
/// missing views.
pub struct HashTreeStore {
    tree: HashMap<Identifier, Node>,
    root_hashes: HashMap<Identifier, u64>,
    max_resident: usize,
}

impl Default for HashTreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HashTreeStore {
    pub fn new() -> Self {
        Self::with_max_resident(DEFAULT_MAX_RESIDENT_NODES)
    }

    /// Creates a store that starts evicting once more than `max_resident`
    /// non-pinned nodes are resident.
    pub fn with_max_resident(max_resident: usize) -> Self {
        Self {
            tree: HashMap::new(),
            root_hashes: HashMap::new(),
            max_resident,
        }
    }

    pub fn has(&self, id: &Identifier) -> bool {
        self.tree.contains_key(id)
    }

    pub fn is_missing(&self, id: &Identifier) -> bool {
        matches!(self.tree.get(id), Some(Node::Pending))
    }

    /// Registers an identifier as known-but-unresolved. No-op if any entry
    /// already exists: a concrete node is never downgraded back to pending.
    pub fn insert_pending(&mut self, id: Identifier) {
        self.tree.entry(id).or_insert(Node::Pending);
    }

    /// Inserts a concrete node. The caller is responsible for having
    /// verified that the node's payload hashes to `id`.
    ///
    /// A pending entry transitions; an absent entry is added. If a concrete
    /// node already exists under `id` it must describe the same payload:
    /// an equal node is an idempotent no-op, two leaves are interchangeable
    /// (their payloads hash to the same identifier), and anything else is a
    /// conflict.
    pub fn insert(&mut self, id: Identifier, node: Node) -> Result<(), StoreError> {
        debug_assert!(!node.is_pending(), "use insert_pending for pending entries");
        match self.tree.get(&id) {
            None | Some(Node::Pending) => {
                self.tree.insert(id, node);
                Ok(())
            }
            Some(existing) if *existing == node => Ok(()),
            Some(existing) if existing.is_leaf() && node.is_leaf() => Ok(()),
            Some(_) => Err(StoreError::Conflict(id)),
        }
    }

    pub fn get(&self, id: &Identifier) -> Result<&Node, StoreError> {
        self.tree
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// The classifying accessor: returns the transmitted form of a resolved
    /// node. Locally-authored leaves are materialized from their backing
    /// file on demand, without mutating the store.
    pub fn get_expanded(&self, id: &Identifier) -> Result<Expanded, StoreError> {
        match self.get(id)? {
            Node::Pending => Err(StoreError::Unresolved(id.clone())),
            Node::LeafMaterialized(bytes) => Ok(Expanded::Leaf(bytes.clone())),
            Node::LeafLocal {
                path,
                index,
                chunk_size,
            } => Ok(Expanded::Leaf(materialize_chunk(path, *index, *chunk_size)?)),
            node => {
                let payload = node
                    .internal_payload()
                    .expect("non-leaf, non-pending node is internal");
                Ok(Expanded::Internal(payload))
            }
        }
    }

    /// Pins a root identifier with its declared file size. Pinned roots are
    /// announced to trackers and never evicted. Callers that do not know
    /// the size pass 0; the value is only a tracker hint.
    pub fn pin_root(&mut self, id: Identifier, declared_size: u64) {
        self.root_hashes.insert(id, declared_size);
    }

    pub fn pinned_roots(&self) -> Vec<(Identifier, u64)> {
        self.root_hashes
            .iter()
            .map(|(id, size)| (id.clone(), *size))
            .collect()
    }

    /// A consistent snapshot of the identifiers still waiting for payloads.
    pub fn missing(&self) -> Vec<Identifier> {
        self.tree
            .iter()
            .filter(|(_, node)| node.is_pending())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        !self.tree.values().any(Node::is_pending)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Drops one non-pinned entry, chosen uniformly at random, once the
    /// resident set exceeds the configured cap. Evicted content is
    /// recoverable: the reader re-registers identifiers it finds absent and
    /// the sync loop re-requests them.
    pub fn evict_one_under_pressure(&mut self) {
        if self.resident_non_pinned() <= self.max_resident {
            return;
        }
        let victim = self
            .tree
            .keys()
            .filter(|id| !self.root_hashes.contains_key(id))
            .choose(&mut rand::thread_rng())
            .cloned();
        if let Some(id) = victim {
            debug!(id = %id, "evicting node under memory pressure");
            self.tree.remove(&id);
        }
    }

    fn resident_non_pinned(&self) -> usize {
        self.tree
            .keys()
            .filter(|id| !self.root_hashes.contains_key(id))
            .count()
    }
}

/// Reads chunk `index` back from `path` and prepends its varint index,
/// reconstructing exactly the payload that was hashed when the leaf was
/// authored.
fn materialize_chunk(path: &PathBuf, index: u64, chunk_size: usize) -> Result<Vec<u8>, StoreError> {
    let leaf_io = |source| StoreError::LeafIo {
        path: path.clone(),
        index,
        source,
    };
    let mut file = File::open(path).map_err(leaf_io)?;
    file.seek(SeekFrom::Start(index * chunk_size as u64))
        .map_err(leaf_io)?;
    let mut data = Vec::with_capacity(chunk_size);
    file.take(chunk_size as u64)
        .read_to_end(&mut data)
        .map_err(leaf_io)?;

    let mut payload = varint::to_varint(index)?;
    payload.extend_from_slice(&data);
    Ok(payload)
}
