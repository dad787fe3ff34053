// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine wiring.
//!
//! The engine owns the shared state (store, peer table, tracker client) and
//! the long-running tasks: the transport receive dispatch, the sync driver
//! and the loopback RPC server. Everything is constructed once at startup
//! and shut down cooperatively through a shared stop flag.

use crate::rpc;
use anyhow::Result;
use rafdp_infallible::{Mutex, RwLock};
use rafdp_network::{PeerTable, ProtocolHandler, Transport};
use rafdp_state_sync::SyncDriver;
use rafdp_storage::{build_from_file, reader::Reader, store::StoreError, HashTreeStore};
use rafdp_tracker_client::TrackerClient;
use rafdp_types::{node::Expanded, Identifier};
use std::{
    collections::HashMap,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{net::UdpSocket, sync::watch};
use tracing::info;

/// Startup parameters. Port 0 requests an ephemeral port.
#[derive(Clone, Copy, Debug)]
pub struct NodeConfig {
    pub rpc_port: u16,
    pub rafdp_port: u16,
}

pub struct Engine {
    store: Arc<RwLock<HashTreeStore>>,
    peers: Arc<RwLock<PeerTable>>,
    tracker: Arc<TrackerClient>,
    /// Roots already built, so re-adding a file is idempotent.
    files: Mutex<HashMap<PathBuf, Identifier>>,
    rafdp_port: u16,
    rpc_port: u16,
    stop: watch::Sender<bool>,
}

impl Engine {
    /// Binds the sockets, spawns the receive dispatch, sync driver and RPC
    /// server, and returns the running engine.
    pub async fn start(config: NodeConfig) -> Result<Arc<Engine>> {
        let transport = Transport::bind(config.rafdp_port).await?;
        let rafdp_port = transport.local_port()?;

        let store = Arc::new(RwLock::new(HashTreeStore::new()));
        let peers = Arc::new(RwLock::new(PeerTable::new()));
        let tracker = Arc::new(TrackerClient::new(rafdp_port));
        let handler = Arc::new(ProtocolHandler::new(store.clone(), peers.clone()));

        let (stop, stop_rx) = watch::channel(false);
        transport.spawn_receive_loop(handler, stop_rx.clone());

        SyncDriver::new(
            store.clone(),
            peers.clone(),
            transport.socket(),
            tracker.clone(),
            stop_rx.clone(),
        )
        .spawn();

        // The control plane must only ever listen on loopback.
        let rpc_socket = UdpSocket::bind(("127.0.0.1", config.rpc_port)).await?;
        let rpc_port = rpc_socket.local_addr()?.port();

        let engine = Arc::new(Engine {
            store,
            peers,
            tracker,
            files: Mutex::new(HashMap::new()),
            rafdp_port,
            rpc_port,
            stop,
        });
        tokio::spawn(rpc::serve(engine.clone(), rpc_socket, stop_rx));

        info!(
            rafdp_port = rafdp_port,
            rpc_port = rpc_port,
            "rafdp node started"
        );
        Ok(engine)
    }

    /// Registers a local file for distribution, building its hash tree and
    /// pinning the root. Idempotent per path.
    pub fn add_file(&self, path: &Path) -> Result<Identifier> {
        let mut files = self.files.lock();
        if let Some(root) = files.get(path) {
            return Ok(root.clone());
        }
        let root = build_from_file(&mut self.store.write(), path)?;
        files.insert(path.to_path_buf(), root.clone());
        Ok(root)
    }

    /// Pins a foreign root so the sync loop starts resolving it. The
    /// declared size is unknown, so 0 is announced.
    pub fn add_hash(&self, id: Identifier) {
        let mut store = self.store.write();
        store.insert_pending(id.clone());
        store.pin_root(id, 0);
    }

    /// Resolves an identifier to its expanded payload. An unknown
    /// identifier registers interest as a side effect, so the sync loop
    /// starts looking for it.
    pub fn get_hash(&self, id: &Identifier) -> Option<Expanded> {
        let mut store = self.store.write();
        match store.get_expanded(id) {
            Ok(expanded) => Some(expanded),
            Err(StoreError::NotFound(_)) => {
                store.insert_pending(id.clone());
                None
            }
            Err(_) => None,
        }
    }

    pub fn add_peer(&self, addr: SocketAddr) {
        self.peers.write().add_unverified(addr);
    }

    pub fn add_url(&self, url: &str) {
        self.tracker.add_url(url);
    }

    pub fn peer_addrs(&self) -> Vec<SocketAddr> {
        self.peers.read().addrs()
    }

    /// Port of the datagram protocol socket.
    pub fn port(&self) -> u16 {
        self.rafdp_port
    }

    /// Port of the loopback control plane.
    pub fn rpc_port(&self) -> u16 {
        self.rpc_port
    }

    pub fn store(&self) -> Arc<RwLock<HashTreeStore>> {
        self.store.clone()
    }

    /// A random-access reader over this engine's store.
    pub fn reader(&self) -> Reader {
        Reader::new(self.store.clone())
    }

    /// Signals every task to wind down.
    pub fn shutdown(&self) {
        let _ = self.stop.send(true);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}
