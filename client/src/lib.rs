// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Blocking JSON-RPC client for a RAFDP node's loopback control plane.
//!
//! Each call opens a fresh UDP socket, sends one JSON request to
//! `127.0.0.1:<rpc_port>` and waits for the single JSON response. The CLI
//! and the integration tests drive a node through this crate.

use serde_json::{json, Value};
use std::{net::UdpSocket, time::Duration};
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RESPONSE_SIZE: usize = 65535;

/// Error thrown when an RPC round trip fails.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("rpc transport failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed rpc response: {0}")]
    Json(#[from] serde_json::Error),

    /// The node answered `success: false`.
    #[error("rpc request failed: {0}")]
    Rejected(String),

    /// The response is missing an expected field.
    #[error("rpc response is missing field {0}")]
    MissingField(&'static str),

    /// A binary payload failed to decode.
    #[error("rpc response carries an undecodable payload")]
    BadPayload,
}

/// The payload a `gethash` call resolves to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HashPayload {
    /// An internal node: a child identifier or a `"left,right"` pair.
    Text(String),
    /// A materialized leaf, varint chunk-index prefix included.
    Bytes(Vec<u8>),
}

/// Client for one node's RPC port.
pub struct RpcClient {
    rpc_port: u16,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(rpc_port: u16) -> Self {
        Self {
            rpc_port,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(rpc_port: u16, timeout: Duration) -> Self {
        Self { rpc_port, timeout }
    }

    fn round_trip(&self, request: Value) -> Result<Value, ClientError> {
        let socket = UdpSocket::bind(("127.0.0.1", 0))?;
        socket.set_read_timeout(Some(self.timeout))?;
        socket.send_to(&serde_json::to_vec(&request)?, ("127.0.0.1", self.rpc_port))?;

        let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
        let (len, _) = socket.recv_from(&mut buf)?;
        Ok(serde_json::from_slice(&buf[..len])?)
    }

    /// Round trip that also insists on `success: true`.
    fn call(&self, request: Value) -> Result<Value, ClientError> {
        let response = self.round_trip(request)?;
        if response["success"].as_bool() != Some(true) {
            let message = response["message"]
                .as_str()
                .unwrap_or("no message")
                .to_string();
            return Err(ClientError::Rejected(message));
        }
        Ok(response)
    }

    /// Registers a local file for distribution and returns its root
    /// identifier.
    pub fn add_file(&self, filename: &str) -> Result<String, ClientError> {
        let response = self.call(json!({ "method": "addfile", "filename": filename }))?;
        response["hash"]
            .as_str()
            .map(str::to_string)
            .ok_or(ClientError::MissingField("hash"))
    }

    pub fn get_port(&self) -> Result<u16, ClientError> {
        let response = self.call(json!({ "method": "getport" }))?;
        response["port"]
            .as_u64()
            .map(|port| port as u16)
            .ok_or(ClientError::MissingField("port"))
    }

    pub fn get_pid(&self) -> Result<u32, ClientError> {
        let response = self.call(json!({ "method": "getpid" }))?;
        response["pid"]
            .as_u64()
            .map(|pid| pid as u32)
            .ok_or(ClientError::MissingField("pid"))
    }

    pub fn add_peer(&self, ip: &str, port: u16) -> Result<(), ClientError> {
        self.call(json!({ "method": "addpeer", "ip": ip, "port": port }))?;
        Ok(())
    }

    /// Pins a foreign root so the node starts resolving it.
    pub fn add_hash(&self, hash: &str) -> Result<(), ClientError> {
        self.call(json!({ "method": "addhash", "hash": hash }))?;
        Ok(())
    }

    /// Resolves an identifier to its payload. `None` means the node does
    /// not hold it yet (asking registers interest, so asking again later
    /// usually succeeds).
    pub fn get_hash(&self, hash: &str) -> Result<Option<HashPayload>, ClientError> {
        let response = self.round_trip(json!({ "method": "gethash", "hash": hash }))?;
        if response["success"].as_bool() != Some(true) {
            return Ok(None);
        }
        let hashed = response["hashed"]
            .as_str()
            .ok_or(ClientError::MissingField("hashed"))?;
        if response["encoded"].as_bool() == Some(true) {
            let bytes = base64::decode(hashed).map_err(|_| ClientError::BadPayload)?;
            Ok(Some(HashPayload::Bytes(bytes)))
        } else {
            Ok(Some(HashPayload::Text(hashed.to_string())))
        }
    }

    pub fn add_url(&self, url: &str) -> Result<(), ClientError> {
        self.call(json!({ "method": "addurl", "url": url }))?;
        Ok(())
    }

    pub fn get_peers(&self) -> Result<Vec<(String, u16)>, ClientError> {
        let response = self.call(json!({ "method": "getpeers" }))?;
        let peers = response["peers"]
            .as_array()
            .ok_or(ClientError::MissingField("peers"))?;
        let mut out = Vec::with_capacity(peers.len());
        for peer in peers {
            let ip = peer[0].as_str().ok_or(ClientError::MissingField("peers"))?;
            let port = peer[1].as_u64().ok_or(ClientError::MissingField("peers"))?;
            out.push((ip.to_string(), port as u16));
        }
        Ok(out)
    }
}
