// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! HTTP announce client for peer discovery.
//!
//! Speaks the standard compact announce protocol: a GET per tracker URL
//! with the info-hash, peer id and transfer statistics, answered by a
//! bencoded dictionary whose `peers` value packs one 6-byte entry per peer
//! (IPv4 address and big-endian port). The info-hash of a root is the first
//! 20 bytes of its printable identifier; correctness of discovery only
//! requires that all participants agree on that convention.
//!
//! Per-URL `interval` (or `min interval`) responses are honored: a URL is
//! not contacted again until its interval has elapsed. All due URLs are
//! announced in parallel, and any HTTP or decode failure just skips that
//! URL until the next round.


use byteorder::{BigEndian, ReadBytesExt};
use futures::future::join_all;
use rafdp_infallible::Mutex;
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    io::{Cursor, Read},
    net::{Ipv4Addr, SocketAddr},
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::debug;

/// Number of printable-identifier bytes used as the announce info-hash,
/// chosen to keep announce URLs short.
pub const INFO_HASH_LEN: usize = 20;

const ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Error thrown when a single announce fails; swallowed by the caller
/// until the next announce tick.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("announce request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode announce response: {0}")]
    Bencode(#[from] serde_bencode::Error),

    #[error("compact peer list length {0} is not a multiple of 6")]
    MalformedPeers(usize),

    #[error("failed to read compact peer entry: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct AnnounceResponse {
    interval: Option<u64>,
    #[serde(rename = "min interval")]
    min_interval: Option<u64>,
    #[serde(with = "serde_bytes", default)]
    peers: Vec<u8>,
}

#[derive(Debug, Default)]
struct UrlState {
    interval: Option<u64>,
    last_contacted: Option<Instant>,
}

impl UrlState {
    fn is_due(&self, now: Instant) -> bool {
        match (self.last_contacted, self.interval) {
            (None, _) | (_, None) => true,
            (Some(last), Some(interval)) => {
                now.duration_since(last) >= Duration::from_secs(interval)
            }
        }
    }
}

/// Announce client shared by all pinned roots.
pub struct TrackerClient {
    port: u16,
    peer_id: String,
    http: reqwest::Client,
    urls: Mutex<HashMap<String, UrlState>>,
    discovered: Mutex<HashMap<String, HashSet<SocketAddr>>>,
}

impl TrackerClient {
    /// Creates a client announcing `port` under a fresh random peer id.
    pub fn new(port: u16) -> Self {
        let peer_id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(20)
            .map(char::from)
            .collect();
        Self {
            port,
            peer_id,
            http: reqwest::Client::new(),
            urls: Mutex::new(HashMap::new()),
            discovered: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a tracker URL. No-op for known URLs.
    pub fn add_url(&self, url: &str) {
        self.urls.lock().entry(url.to_string()).or_default();
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().keys().cloned().collect()
    }

    /// Announces a pinned root to every due tracker and returns all peers
    /// ever discovered for it. Per-URL failures are swallowed; the URL is
    /// retried on the next announce.
    pub async fn announce(
        &self,
        root_id: &str,
        uploaded: u64,
        downloaded: u64,
        left: u64,
    ) -> HashSet<SocketAddr> {
        let info_hash: String = root_id.chars().take(INFO_HASH_LEN).collect();

        let now = Instant::now();
        let due: Vec<String> = {
            let urls = self.urls.lock();
            urls.iter()
                .filter(|(_, state)| state.is_due(now))
                .map(|(url, _)| url.clone())
                .collect()
        };

        let announces = due
            .iter()
            .map(|url| self.announce_url(url, &info_hash, uploaded, downloaded, left));
        let results = join_all(announces).await;

        let mut found = Vec::new();
        {
            let mut urls = self.urls.lock();
            for (url, result) in due.iter().zip(results) {
                match result {
                    Ok(response) => {
                        if let Some(state) = urls.get_mut(url) {
                            // `min interval` wins over `interval` when both
                            // are present.
                            state.interval =
                                response.min_interval.or(response.interval).or(Some(0));
                            state.last_contacted = Some(Instant::now());
                        }
                        match decode_compact_peers(&response.peers) {
                            Ok(peers) => found.extend(peers),
                            Err(error) => {
                                debug!(url = %url, error = %error, "bad peer list from tracker")
                            }
                        }
                    }
                    Err(error) => debug!(url = %url, error = %error, "announce failed"),
                }
            }
        }

        let mut discovered = self.discovered.lock();
        let known = discovered.entry(info_hash).or_default();
        known.extend(found);
        known.clone()
    }

    async fn announce_url(
        &self,
        url: &str,
        info_hash: &str,
        uploaded: u64,
        downloaded: u64,
        left: u64,
    ) -> Result<AnnounceResponse, TrackerError> {
        let response = self
            .http
            .get(url)
            .timeout(ANNOUNCE_TIMEOUT)
            .query(&[("info_hash", info_hash), ("peer_id", &self.peer_id)])
            .query(&[
                ("port", u64::from(self.port)),
                ("uploaded", uploaded),
                ("downloaded", downloaded),
                ("left", left),
                ("compact", 1),
                ("no_peer_id", 1),
            ])
            .send()
            .await?;
        let body = response.bytes().await?;
        Ok(serde_bencode::from_bytes(&body)?)
    }
}

/// Decodes a compact peer list: 6 bytes per peer, 4 of IPv4 and 2 of
/// big-endian port.
pub fn decode_compact_peers(peers: &[u8]) -> Result<Vec<SocketAddr>, TrackerError> {
    if peers.len() % 6 != 0 {
        return Err(TrackerError::MalformedPeers(peers.len()));
    }
    let mut reader = Cursor::new(peers);
    let mut out = Vec::with_capacity(peers.len() / 6);
    for _ in 0..peers.len() / 6 {
        let mut octets = [0u8; 4];
        reader.read_exact(&mut octets)?;
        let port = reader.read_u16::<BigEndian>()?;
        out.push(SocketAddr::from((Ipv4Addr::from(octets), port)));
    }
    Ok(out)
}

/// Encodes a peer list into the compact wire form. Used by tracker stubs
/// in tests; the inverse of [`decode_compact_peers`].
pub fn encode_compact_peers(peers: &[SocketAddr]) -> Vec<u8> {
    let mut out = Vec::with_capacity(peers.len() * 6);
    for peer in peers {
        match peer {
            SocketAddr::V4(addr) => {
                out.extend_from_slice(&addr.ip().octets());
                out.extend_from_slice(&addr.port().to_be_bytes());
            }
            SocketAddr::V6(_) => {}
        }
    }
    out
}
