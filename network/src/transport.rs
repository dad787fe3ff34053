// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! The datagram transport.
//!
//! Owns a single UDP socket. The receive loop hands every inbound datagram
//! to the protocol handler and sends back whatever reply datagrams it
//! produced; nothing is retried, deduplicated or reordered here.

use crate::{handler::ProtocolHandler, wire::MAX_DATAGRAM_SIZE};
use std::{io, net::SocketAddr, sync::Arc};
use tokio::{net::UdpSocket, sync::watch, task::JoinHandle};
use tracing::{info, warn};

pub struct Transport {
    socket: Arc<UdpSocket>,
}

impl Transport {
    /// Binds the protocol socket on all interfaces. Port 0 requests an
    /// ephemeral port from the OS.
    pub async fn bind(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        info!(port = socket.local_addr()?.port(), "transport bound");
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    pub fn local_port(&self) -> io::Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    pub fn socket(&self) -> Arc<UdpSocket> {
        self.socket.clone()
    }

    pub async fn send_to(&self, peer: SocketAddr, bytes: &[u8]) -> io::Result<()> {
        self.socket.send_to(bytes, peer).await?;
        Ok(())
    }

    /// Spawns the receive dispatch loop. The task runs until the stop
    /// signal flips or the socket fails.
    pub fn spawn_receive_loop(
        &self,
        handler: Arc<ProtocolHandler>,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let socket = self.socket.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            loop {
                tokio::select! {
                    changed = stop.changed() => {
                        // A dropped sender also means shutdown.
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                    received = socket.recv_from(&mut buf) => {
                        let (len, peer) = match received {
                            Ok(received) => received,
                            Err(error) => {
                                warn!(error = %error, "receive failed, stopping dispatch");
                                break;
                            }
                        };
                        for reply in handler.handle_datagram(peer, &buf[..len]) {
                            if let Err(error) = socket.send_to(&reply, peer).await {
                                warn!(peer = %peer, error = %error, "failed to send reply");
                            }
                        }
                    }
                }
            }
        })
    }
}
