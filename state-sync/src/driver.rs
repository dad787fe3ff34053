// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

use rafdp_infallible::RwLock;
use rafdp_network::{wire::Frame, PeerTable};
use rafdp_storage::HashTreeStore;
use rafdp_tracker_client::TrackerClient;
use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{net::UdpSocket, sync::watch, task::JoinHandle};
use tracing::{debug, warn};

/// How long an unvalidated peer rests between pings.
pub const PING_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// How long a (peer, identifier) pair rests between requests.
pub const REQUEST_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// How often every pinned root is announced to the trackers.
pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(10);

/// Pause between loop iterations.
const LOOP_TICK: Duration = Duration::from_millis(50);

/// Drives requests for missing nodes until the store is complete, forever.
pub struct SyncDriver {
    store: Arc<RwLock<HashTreeStore>>,
    peers: Arc<RwLock<PeerTable>>,
    socket: Arc<UdpSocket>,
    tracker: Arc<TrackerClient>,
    stop: watch::Receiver<bool>,
}

impl SyncDriver {
    pub fn new(
        store: Arc<RwLock<HashTreeStore>>,
        peers: Arc<RwLock<PeerTable>>,
        socket: Arc<UdpSocket>,
        tracker: Arc<TrackerClient>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            peers,
            socket,
            tracker,
            stop,
        }
    }

    /// Spawns the loop. The task exits when the stop signal flips.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut last_announce: Option<Instant> = None;
        loop {
            if *self.stop.borrow() {
                break;
            }
            self.tick().await;

            let announce_due = last_announce
                .map_or(true, |last| last.elapsed() >= ANNOUNCE_INTERVAL);
            if announce_due && self.spawn_announces() > 0 {
                last_announce = Some(Instant::now());
            }

            tokio::select! {
                changed = self.stop.changed() => {
                    // A dropped sender also means shutdown.
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(LOOP_TICK) => {}
            }
        }
        debug!("sync driver stopped");
    }

    /// One pass over the peer table: ping whoever has not proven alive,
    /// request every missing identifier from every validated peer that is
    /// due for it.
    async fn tick(&self) {
        let now = Instant::now();
        let missing = self.store.read().missing();
        let (pings, requests) = {
            let mut peers = self.peers.write();
            (
                peers.pings_due(now, PING_RETRY_INTERVAL),
                peers.requests_due(now, REQUEST_RETRY_INTERVAL, &missing),
            )
        };

        for addr in pings {
            self.send(addr, Frame::Ping).await;
        }
        for (addr, id) in requests {
            self.send(addr, Frame::Request(id)).await;
        }
    }

    async fn send(&self, addr: SocketAddr, frame: Frame) {
        let datagram = match frame.encode() {
            Ok(datagram) => datagram,
            Err(error) => {
                warn!(error = %error, "failed to encode frame");
                return;
            }
        };
        if let Err(error) = self.socket.send_to(&datagram, addr).await {
            warn!(peer = %addr, error = %error, "failed to send");
        }
    }

    /// Announces every pinned root in its own detached task so a slow
    /// tracker never blocks request issuance. Discovered peers enter the
    /// table unvalidated and get pinged on the next pass. Returns how many
    /// announces were spawned.
    fn spawn_announces(&self) -> usize {
        let roots = self.store.read().pinned_roots();
        let spawned = roots.len();
        for (root, declared_size) in roots {
            let tracker = self.tracker.clone();
            let peers = self.peers.clone();
            let stop = self.stop.clone();
            tokio::spawn(async move {
                let found = tracker.announce(root.as_str(), 0, 0, declared_size).await;
                if *stop.borrow() {
                    return;
                }
                if !found.is_empty() {
                    debug!(root = %root, peers = found.len(), "tracker returned peers");
                }
                let mut table = peers.write();
                for addr in found {
                    table.add_unverified(addr);
                }
            });
        }
        spawned
    }
}
