// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! The peer table.
//!
//! A peer is an `(ip, port)` pair with a `valid` flag toggled by the
//! PING/PONG exchange. Peers enter unvalidated (added by the operator or
//! discovered through a tracker) and are pinged until they answer; only
//! validated peers are asked for missing nodes. The table also remembers
//! when each peer was last asked for each identifier so the sync loop can
//! re-request on a fixed cadence without flooding.

#[cfg(test)]
mod peer_test;

use rafdp_types::Identifier;
use std::{
    collections::HashMap,
    net::SocketAddr,
    time::{Duration, Instant},
};

/// Per-peer sync state.
#[derive(Debug, Default)]
pub struct PeerState {
    valid: bool,
    last_contact: Option<Instant>,
    asked: HashMap<Identifier, Instant>,
}

impl PeerState {
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// All peers known to the engine.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<SocketAddr, PeerState>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a peer in the unvalidated state. No-op for known peers.
    pub fn add_unverified(&mut self, addr: SocketAddr) {
        self.peers.entry(addr).or_default();
    }

    /// Records a PING or PONG from `addr`: the peer is alive.
    pub fn mark_alive(&mut self, addr: SocketAddr) {
        let state = self.peers.entry(addr).or_default();
        state.valid = true;
        state.last_contact = Some(Instant::now());
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.peers.contains_key(addr)
    }

    pub fn is_valid(&self, addr: &SocketAddr) -> bool {
        self.peers.get(addr).map_or(false, PeerState::is_valid)
    }

    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.peers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Unvalidated peers whose last ping (or initial registration) is at
    /// least `retry` old. Their contact time is bumped so the next call
    /// does not return them again before the cadence elapses.
    pub fn pings_due(&mut self, now: Instant, retry: Duration) -> Vec<SocketAddr> {
        let mut due = Vec::new();
        for (addr, state) in self.peers.iter_mut() {
            if state.valid {
                continue;
            }
            let elapsed = state
                .last_contact
                .map_or(true, |last| now.duration_since(last) >= retry);
            if elapsed {
                state.last_contact = Some(now);
                due.push(*addr);
            }
        }
        due
    }

    /// `(peer, id)` pairs to request now: every validated peer crossed with
    /// every missing identifier the peer has not been asked for in the last
    /// `retry`. Ask times are bumped as pairs are returned.
    pub fn requests_due(
        &mut self,
        now: Instant,
        retry: Duration,
        missing: &[Identifier],
    ) -> Vec<(SocketAddr, Identifier)> {
        let mut due = Vec::new();
        for (addr, state) in self.peers.iter_mut() {
            if !state.valid {
                continue;
            }
            for id in missing {
                let elapsed = state
                    .asked
                    .get(id)
                    .map_or(true, |last| now.duration_since(*last) >= retry);
                if elapsed {
                    state.asked.insert(id.clone(), now);
                    due.push((*addr, id.clone()));
                }
            }
        }
        due
    }
}
