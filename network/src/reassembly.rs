// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Reassembly of fragmented binary responses.
//!
//! Fragments for one identifier all carry the same fragment count and are
//! addressed by index, so arrival order is irrelevant; a duplicate fragment
//! simply overwrites its slot with identical bytes.

#[cfg(test)]
mod reassembly_test;

use rafdp_types::Identifier;
use std::collections::HashMap;
use thiserror::Error;

/// Error thrown when a fragment cannot be slotted.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ReassemblyError {
    /// An earlier fragment for this identifier declared a different count.
    #[error("fragment declares count {declared}, expected {expected}")]
    CountMismatch { declared: u64, expected: u64 },
}

/// Partially received leaf payloads, keyed by identifier.
#[derive(Debug, Default)]
pub struct ReassemblyTable {
    partial: HashMap<Identifier, Vec<Option<Vec<u8>>>>,
}

impl ReassemblyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores one fragment. Returns the reassembled payload once every slot
    /// is filled; the entry is removed from the table at that point.
    ///
    /// The caller guarantees `index < count` (enforced at frame decode).
    pub fn insert(
        &mut self,
        id: Identifier,
        index: u64,
        count: u64,
        bytes: Vec<u8>,
    ) -> Result<Option<Vec<u8>>, ReassemblyError> {
        let slots = self
            .partial
            .entry(id.clone())
            .or_insert_with(|| vec![None; count as usize]);
        if slots.len() as u64 != count {
            return Err(ReassemblyError::CountMismatch {
                declared: count,
                expected: slots.len() as u64,
            });
        }
        debug_assert!(index < count, "fragment index is validated at decode");
        slots[index as usize] = Some(bytes);

        if slots.iter().any(Option::is_none) {
            return Ok(None);
        }
        let slots = self
            .partial
            .remove(&id)
            .expect("entry was just inserted into");
        let mut payload = Vec::new();
        for slot in slots {
            payload.extend(slot.expect("all slots are filled"));
        }
        Ok(Some(payload))
    }

    /// Drops any partial state for `id`.
    pub fn remove(&mut self, id: &Identifier) {
        self.partial.remove(id);
    }

    pub fn len(&self) -> usize {
        self.partial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partial.is_empty()
    }
}
