// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::builder::{build_from_file, CHUNK_SIZE};
use rand::{Rng, RngCore};
use std::io::Write;
use tempfile::NamedTempFile;

fn build_tree(len: usize) -> (Arc<RwLock<HashTreeStore>>, Identifier, Vec<u8>, NamedTempFile) {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let mut store = HashTreeStore::new();
    let root = build_from_file(&mut store, file.path()).unwrap();
    (Arc::new(RwLock::new(store)), root, bytes, file)
}

#[tokio::test]
async fn test_stats() {
    let (store, root, _, _file) = build_tree(50000);
    let reader = Reader::new(store);

    let stats = reader.stats(&root).await.unwrap();
    assert_eq!(stats.chunk_size, CHUNK_SIZE);
    assert_eq!(stats.num_chunks, 4);
    assert_eq!(stats.last_chunk_size, 50000 - 3 * CHUNK_SIZE);
    assert_eq!(stats.est_file_size, 50000);

    // Second call is served from the cache.
    assert_eq!(reader.stats(&root).await.unwrap(), stats);
}

#[tokio::test]
async fn test_single_chunk_stats_and_read() {
    let (store, root, bytes, _file) = build_tree(CHUNK_SIZE);
    let reader = Reader::new(store);

    let stats = reader.stats(&root).await.unwrap();
    assert_eq!(stats.num_chunks, 1);
    assert_eq!(stats.est_file_size, CHUNK_SIZE as u64);

    let read = reader
        .range_read(&root, CHUNK_SIZE as u64, 0)
        .await
        .unwrap();
    assert_eq!(read, bytes);
}

#[tokio::test]
async fn test_outermost() {
    let (store, root, bytes, _file) = build_tree(50000);
    let reader = Reader::new(store);

    let (first_index, first) = reader.outermost(&root, Side::First).await.unwrap();
    assert_eq!(first_index, 0);
    assert_eq!(first, bytes[..CHUNK_SIZE].to_vec());

    let (last_index, last) = reader.outermost(&root, Side::Last).await.unwrap();
    assert_eq!(last_index, 3);
    assert_eq!(last, bytes[3 * CHUNK_SIZE..].to_vec());
}

#[tokio::test]
async fn test_chunk_at() {
    let (store, root, bytes, _file) = build_tree(100_000);
    let reader = Reader::new(store);
    let stats = reader.stats(&root).await.unwrap();

    for index in 0..stats.num_chunks {
        let chunk = reader
            .chunk_at(&root, index, stats.num_chunks - 1)
            .await
            .unwrap();
        let start = (index as usize) * CHUNK_SIZE;
        let end = (start + CHUNK_SIZE).min(bytes.len());
        assert_eq!(chunk, bytes[start..end].to_vec());
    }
}

#[tokio::test]
async fn test_random_range_reads() {
    let (store, root, bytes, _file) = build_tree(50000);
    let reader = Reader::new(store);
    let file_size = bytes.len() as u64;

    let mut rng = rand::thread_rng();
    for _ in 0..40 {
        // Offsets may run past the end of the file; reads are clamped.
        let offset = rng.gen_range(0..file_size + file_size / 2);
        let size = rng.gen_range(0..file_size);
        let read = reader.range_read(&root, size, offset).await.unwrap();

        let start = offset.min(file_size) as usize;
        let end = (offset + size).min(file_size) as usize;
        assert_eq!(read, bytes[start..end.max(start)].to_vec());
    }
}

#[tokio::test]
async fn test_range_read_clamps() {
    let (store, root, bytes, _file) = build_tree(50000);
    let reader = Reader::new(store);

    // Whole file.
    assert_eq!(
        reader.range_read(&root, 50000, 0).await.unwrap(),
        bytes
    );
    // Past the end.
    assert!(reader.range_read(&root, 10, 60000).await.unwrap().is_empty());
    // Zero-sized.
    assert!(reader.range_read(&root, 0, 100).await.unwrap().is_empty());
    // Crossing a chunk boundary.
    assert_eq!(
        reader
            .range_read(&root, 100, CHUNK_SIZE as u64 - 50)
            .await
            .unwrap(),
        bytes[CHUNK_SIZE - 50..CHUNK_SIZE + 50].to_vec()
    );
}

#[tokio::test]
async fn test_read_blocks_until_resolved() {
    // Build the full tree, then copy only its root into a second store and
    // feed the rest in from a background task while a read is in flight.
    let (source, root, bytes, _file) = build_tree(50000);
    let target = Arc::new(RwLock::new(HashTreeStore::new()));
    target.write().insert_pending(root.clone());

    let feeder_source = source.clone();
    let feeder_target = target.clone();
    tokio::spawn(async move {
        loop {
            let missing = feeder_target.read().missing();
            if missing.is_empty() && feeder_target.read().is_complete() {
                break;
            }
            for id in missing {
                let node = feeder_source.read().get(&id).unwrap().clone();
                let mut store = feeder_target.write();
                for child in node.children() {
                    store.insert_pending(child);
                }
                store.insert(id, node).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let reader = Reader::new(target);
    let read = tokio::time::timeout(
        Duration::from_secs(10),
        reader.range_read(&root, 50000, 0),
    )
    .await
    .expect("read timed out")
    .unwrap();
    assert_eq!(read, bytes);
}
