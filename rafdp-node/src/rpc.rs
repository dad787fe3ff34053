// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! The loopback control plane.
//!
//! A UDP JSON-RPC surface for the CLI and local collaborators. Every
//! request carries a `"method"` field; every response carries `"success"`
//! plus method-specific fields. Failures never kill the daemon: they come
//! back as `success: false` with a message. Datagrams from non-loopback
//! sources are ignored with a warning and get no response at all.

use crate::engine::Engine;
use rafdp_types::{node::Expanded, Identifier};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{net::SocketAddr, path::Path, sync::Arc};
use tokio::{net::UdpSocket, sync::watch};
use tracing::{debug, warn};

const MAX_REQUEST_SIZE: usize = 65535;

#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
enum RpcRequest {
    Addfile { filename: String },
    Getport,
    Getpid,
    Addpeer { ip: String, port: u16 },
    Addhash { hash: String },
    Gethash { hash: String },
    Addurl { url: String },
    Getpeers,
}

/// Serves RPC requests until the stop signal flips.
pub(crate) async fn serve(engine: Arc<Engine>, socket: UdpSocket, mut stop: watch::Receiver<bool>) {
    let mut buf = vec![0u8; MAX_REQUEST_SIZE];
    loop {
        let (len, from) = tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
            received = socket.recv_from(&mut buf) => match received {
                Ok(received) => received,
                Err(error) => {
                    warn!(error = %error, "rpc receive failed");
                    break;
                }
            },
        };

        if !from.ip().is_loopback() {
            warn!(
                from = %from,
                "ignored rpc request from non-loopback source, \
                 are you running the rpc server publicly?"
            );
            continue;
        }

        let response = match serde_json::from_slice::<RpcRequest>(&buf[..len]) {
            Ok(request) => dispatch(&engine, request),
            Err(error) => {
                debug!(from = %from, error = %error, "unparseable rpc request");
                json!({ "success": false, "message": error.to_string() })
            }
        };

        match serde_json::to_vec(&response) {
            Ok(encoded) => {
                if let Err(error) = socket.send_to(&encoded, from).await {
                    warn!(from = %from, error = %error, "failed to send rpc response");
                }
            }
            Err(error) => warn!(error = %error, "failed to encode rpc response"),
        }
    }
}

fn dispatch(engine: &Engine, request: RpcRequest) -> Value {
    match request {
        RpcRequest::Addfile { filename } => match engine.add_file(Path::new(&filename)) {
            Ok(root) => json!({ "success": true, "hash": root }),
            Err(error) => json!({ "success": false, "message": error.to_string() }),
        },
        RpcRequest::Getport => json!({ "success": true, "port": engine.port() }),
        RpcRequest::Getpid => json!({ "success": true, "pid": std::process::id() }),
        RpcRequest::Addpeer { ip, port } => {
            match format!("{}:{}", ip, port).parse::<SocketAddr>() {
                Ok(addr) => {
                    engine.add_peer(addr);
                    json!({ "success": true })
                }
                Err(error) => json!({ "success": false, "message": error.to_string() }),
            }
        }
        RpcRequest::Addhash { hash } => match hash.parse::<Identifier>() {
            Ok(id) => {
                engine.add_hash(id);
                json!({ "success": true })
            }
            Err(error) => json!({ "success": false, "message": error.to_string() }),
        },
        RpcRequest::Gethash { hash } => match hash.parse::<Identifier>() {
            Ok(id) => match engine.get_hash(&id) {
                Some(Expanded::Internal(payload)) => {
                    json!({ "success": true, "hashed": payload, "encoded": false })
                }
                Some(Expanded::Leaf(payload)) => {
                    json!({ "success": true, "hashed": base64::encode(&payload), "encoded": true })
                }
                None => json!({ "success": false }),
            },
            Err(error) => json!({ "success": false, "message": error.to_string() }),
        },
        RpcRequest::Addurl { url } => {
            engine.add_url(&url);
            json!({ "success": true })
        }
        RpcRequest::Getpeers => {
            let peers: Vec<(String, u16)> = engine
                .peer_addrs()
                .into_iter()
                .map(|addr| (addr.ip().to_string(), addr.port()))
                .collect();
            json!({ "success": true, "peers": peers })
        }
    }
}
