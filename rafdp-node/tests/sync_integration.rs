// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios: two full nodes on loopback, driven through the
//! RPC control plane exactly the way the CLI and the filesystem
//! collaborator drive a production node.

use rafdp_client::{HashPayload, RpcClient};
use rafdp_infallible::Mutex;
use rafdp_node::{Engine, NodeConfig};
use rafdp_types::{varint::parse_varint, Identifier};
use rand::RngCore;
use serde::Serialize;
use std::{
    collections::HashMap,
    io::Write,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tempfile::NamedTempFile;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

const SYNC_TIMEOUT: Duration = Duration::from_secs(60);
const POLL: Duration = Duration::from_millis(200);

fn random_file(len: usize) -> (NamedTempFile, Vec<u8>) {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();
    (file, bytes)
}

async fn start_node() -> (Arc<Engine>, RpcClient) {
    let engine = Engine::start(NodeConfig {
        rpc_port: 0,
        rafdp_port: 0,
    })
    .await
    .unwrap();
    // Everything is on loopback, so a short RPC timeout keeps a wedged
    // node from eating the whole test deadline.
    let client = RpcClient::with_timeout(engine.rpc_port(), Duration::from_secs(2));
    (engine, client)
}

async fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = Instant::now() + SYNC_TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(POLL).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_peer_reconstruction_over_loopback() {
    let (file, bytes) = random_file(50000);
    let (first, first_client) = start_node().await;
    let (second, second_client) = start_node().await;

    let root = first_client
        .add_file(file.path().to_str().unwrap())
        .unwrap();
    assert!(root.starts_with("RAFDP10z"));

    second_client.add_peer("127.0.0.1", first.port()).unwrap();
    second_client.add_hash(&root).unwrap();

    // The root of a 4-chunk file resolves to an internal pair.
    let root_payload = {
        let deadline = Instant::now() + SYNC_TIMEOUT;
        loop {
            if let Some(HashPayload::Text(text)) = second_client.get_hash(&root).unwrap() {
                break text;
            }
            assert!(
                Instant::now() < deadline,
                "root never resolved on the second node"
            );
            tokio::time::sleep(POLL).await;
        }
    };
    assert!(root_payload.starts_with("RAFDP"));
    assert!(root_payload.contains(",RAFDP"));

    // The sync loop pulls the whole tree in without any further help.
    let store = second.store();
    wait_for("the second node to complete", || {
        let store = store.read();
        !store.is_empty() && store.is_complete()
    })
    .await;

    // Walking down the first children ends at chunk 0, served base64 over
    // the RPC surface.
    let mut current = root_payload
        .split(',')
        .next()
        .unwrap()
        .to_string();
    let leaf = loop {
        match second_client.get_hash(&current).unwrap() {
            Some(HashPayload::Text(text)) => {
                current = text.split(',').next().unwrap().to_string();
            }
            Some(HashPayload::Bytes(payload)) => break payload,
            None => tokio::time::sleep(POLL).await,
        }
    };
    let (chunk_index, chunk) = parse_varint(&leaf).unwrap();
    assert_eq!(chunk_index, 0);
    assert_eq!(chunk, &bytes[..16384]);

    // Random-access reads over the synced tree reproduce the file.
    let reader = second.reader();
    let root_id: Identifier = root.parse().unwrap();
    let read = reader.range_read(&root_id, 50000, 0).await.unwrap();
    assert_eq!(read, bytes);
    let read = reader.range_read(&root_id, 1000, 20000).await.unwrap();
    assert_eq!(read, bytes[20000..21000].to_vec());

    first.shutdown();
    second.shutdown();
}

#[derive(Serialize)]
struct StubAnnounceResponse {
    complete: u64,
    downloaded: u64,
    incomplete: u64,
    interval: u64,
    #[serde(with = "serde_bytes")]
    peers: Vec<u8>,
}

/// A one-endpoint announce stub: replies with the peers already registered
/// for the info-hash, then registers the caller.
async fn spawn_stub_tracker() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!(
        "http://127.0.0.1:{}/announce",
        listener.local_addr().unwrap().port()
    );
    let peer_lists: Arc<Mutex<HashMap<String, Vec<SocketAddr>>>> =
        Arc::new(Mutex::new(HashMap::new()));

    tokio::spawn(async move {
        loop {
            let (mut conn, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };

            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            while !raw.windows(4).any(|window| window == b"\r\n\r\n") {
                match conn.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(len) => raw.extend_from_slice(&buf[..len]),
                }
            }

            let request = String::from_utf8_lossy(&raw);
            let mut info_hash = String::new();
            let mut port = 0u16;
            let query = request
                .split_whitespace()
                .nth(1)
                .and_then(|path| path.split('?').nth(1))
                .unwrap_or("");
            for pair in query.split('&') {
                let mut parts = pair.splitn(2, '=');
                match (parts.next(), parts.next()) {
                    (Some("info_hash"), Some(value)) => info_hash = value.to_string(),
                    (Some("port"), Some(value)) => port = value.parse().unwrap_or(0),
                    _ => {}
                }
            }

            let body = {
                let mut lists = peer_lists.lock();
                let known = lists.entry(info_hash).or_default();
                let mut packed = Vec::with_capacity(known.len() * 6);
                for peer in known.iter() {
                    if let SocketAddr::V4(addr) = peer {
                        packed.extend_from_slice(&addr.ip().octets());
                        packed.extend_from_slice(&addr.port().to_be_bytes());
                    }
                }
                let caller: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
                if !known.contains(&caller) {
                    known.push(caller);
                }
                serde_bencode::to_bytes(&StubAnnounceResponse {
                    complete: 0,
                    downloaded: 0,
                    incomplete: 0,
                    interval: 0,
                    peers: packed,
                })
                .unwrap()
            };

            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = conn.write_all(header.as_bytes()).await;
            let _ = conn.write_all(&body).await;
            let _ = conn.shutdown().await;
        }
    });

    url
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tracker_peer_discovery() {
    let url = spawn_stub_tracker().await;
    let (file, _bytes) = random_file(50000);

    let (first, first_client) = start_node().await;
    let (second, second_client) = start_node().await;

    first_client.add_url(&url).unwrap();
    second_client.add_url(&url).unwrap();

    let root = first_client
        .add_file(file.path().to_str().unwrap())
        .unwrap();
    second_client.add_hash(&root).unwrap();

    // Both nodes find each other through the tracker alone.
    wait_for("both peer tables to fill", || {
        !first_client.get_peers().unwrap().is_empty()
            && !second_client.get_peers().unwrap().is_empty()
    })
    .await;

    // And discovery is enough for the transfer itself to finish.
    let store = second.store();
    wait_for("the second node to complete", || {
        let store = store.read();
        !store.is_empty() && store.is_complete()
    })
    .await;

    first.shutdown();
    second.shutdown();
}
