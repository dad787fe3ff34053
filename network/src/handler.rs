// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! The protocol handler.
//!
//! Processes one inbound datagram at a time and returns the reply datagrams
//! to send back to the sender. Transient protocol errors (malformed frames,
//! integrity failures, requests for unknown identifiers) are absorbed here:
//! they are logged and the frame is dropped, the peer is never marked.
//! A byte payload is trusted iff its hash equals its claimed identifier, so
//! a malicious peer can at worst waste bandwidth.


use crate::{
    peer::PeerTable,
    reassembly::ReassemblyTable,
    wire::{fragment_series, Frame},
};
use rafdp_infallible::{Mutex, RwLock};
use rafdp_storage::{HashTreeStore, StoreError};
use rafdp_types::{node::Expanded, Identifier, Node};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, trace, warn};

/// Parses wire frames, enforces integrity, and updates the shared store and
/// peer table.
pub struct ProtocolHandler {
    store: Arc<RwLock<HashTreeStore>>,
    peers: Arc<RwLock<PeerTable>>,
    reassembly: Mutex<ReassemblyTable>,
}

impl ProtocolHandler {
    pub fn new(store: Arc<RwLock<HashTreeStore>>, peers: Arc<RwLock<PeerTable>>) -> Self {
        Self {
            store,
            peers,
            reassembly: Mutex::new(ReassemblyTable::new()),
        }
    }

    /// Processes one datagram from `peer`, returning the datagrams to send
    /// back to it.
    pub fn handle_datagram(&self, peer: SocketAddr, data: &[u8]) -> Vec<Vec<u8>> {
        let frame = match Frame::decode(data) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(peer = %peer, error = %error, "dropping malformed datagram");
                return vec![];
            }
        };

        match frame {
            Frame::Ping => {
                self.peers.write().mark_alive(peer);
                match Frame::Pong.encode() {
                    Ok(pong) => vec![pong],
                    Err(_) => vec![],
                }
            }
            Frame::Pong => {
                self.peers.write().mark_alive(peer);
                vec![]
            }
            Frame::Request(id) => self.serve_request(peer, &id),
            Frame::NonBinaryResponse(payload) => {
                self.accept_internal(peer, payload);
                vec![]
            }
            Frame::BinaryFragment {
                index,
                count,
                id,
                bytes,
            } => {
                self.accept_fragment(peer, index, count, id, bytes);
                vec![]
            }
        }
    }

    /// REQUEST: look the identifier up and answer with its expanded form.
    /// An internal node fits one non-binary response; a leaf is split into
    /// a fragment series. Unknown identifiers are dropped silently; the
    /// peer will retry.
    fn serve_request(&self, peer: SocketAddr, id: &Identifier) -> Vec<Vec<u8>> {
        let expanded = self.store.read().get_expanded(id);
        let frames = match expanded {
            Ok(Expanded::Internal(payload)) => vec![Frame::NonBinaryResponse(payload.into_bytes())],
            Ok(Expanded::Leaf(payload)) => fragment_series(id, &payload),
            Err(StoreError::NotFound(_)) | Err(StoreError::Unresolved(_)) => {
                trace!(peer = %peer, id = %id, "request for unknown identifier");
                return vec![];
            }
            Err(error) => {
                // Local I/O failure; abort this response series.
                warn!(peer = %peer, id = %id, error = %error, "failed to expand node");
                return vec![];
            }
        };

        let mut out = Vec::with_capacity(frames.len());
        for frame in frames {
            match frame.encode() {
                Ok(datagram) => out.push(datagram),
                Err(error) => {
                    warn!(id = %id, error = %error, "failed to encode response frame");
                    return vec![];
                }
            }
        }
        out
    }

    /// RESPONSE-NONBINARY: an internal node's ASCII payload. Accepted only
    /// if its hash is an identifier we are missing; its children enter the
    /// store as pending so the sync loop starts asking for them.
    fn accept_internal(&self, peer: SocketAddr, payload: Vec<u8>) {
        let id = Identifier::from_payload(&payload);

        let text = match std::str::from_utf8(&payload) {
            Ok(text) => text,
            Err(_) => {
                warn!(peer = %peer, "non-binary response payload is not ASCII");
                return;
            }
        };
        let node = match Node::parse_internal(text) {
            Ok(node) => node,
            Err(error) => {
                warn!(peer = %peer, error = %error, "unparseable internal node payload");
                return;
            }
        };

        let mut store = self.store.write();
        match store.get(&id) {
            Ok(existing) if existing.is_pending() => {}
            Ok(existing) => {
                // Already resolved: a payload hashing to the same id must
                // match what we hold, anything else is dropped.
                if existing.internal_payload().as_deref() != Some(text) {
                    warn!(peer = %peer, id = %id, "conflicting payload for resolved node");
                }
                return;
            }
            Err(_) => {
                trace!(peer = %peer, id = %id, "unsolicited non-binary response");
                return;
            }
        }

        for child in node.children() {
            store.insert_pending(child);
        }
        if let Err(error) = store.insert(id.clone(), node) {
            warn!(peer = %peer, id = %id, error = %error, "failed to insert internal node");
            return;
        }
        debug!(peer = %peer, id = %id, "resolved internal node");
        store.evict_one_under_pressure();
    }

    /// RESPONSE-BINARY-FRAGMENT: slot the fragment; once the series is
    /// complete, verify the reassembled payload hashes to the claimed
    /// identifier before inserting it as a materialized leaf.
    fn accept_fragment(
        &self,
        peer: SocketAddr,
        index: u64,
        count: u64,
        id: Identifier,
        bytes: Vec<u8>,
    ) {
        let payload = match self
            .reassembly
            .lock()
            .insert(id.clone(), index, count, bytes)
        {
            Ok(Some(payload)) => payload,
            Ok(None) => return,
            Err(error) => {
                warn!(peer = %peer, id = %id, error = %error, "dropping fragment");
                return;
            }
        };

        let computed = Identifier::from_payload(&payload);
        let mut store = self.store.write();
        if computed != id {
            warn!(peer = %peer, id = %id, "reassembled payload fails integrity check");
        } else if !store.is_missing(&id) {
            trace!(peer = %peer, id = %id, "discarding leaf we did not ask for");
        } else if let Err(error) = store.insert(id.clone(), Node::LeafMaterialized(payload)) {
            warn!(peer = %peer, id = %id, error = %error, "failed to insert leaf");
        } else {
            debug!(peer = %peer, id = %id, "resolved leaf");
        }
        store.evict_one_under_pressure();
    }
}
