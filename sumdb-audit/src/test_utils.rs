//! In-memory store and remote-log fixtures for pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use tlog_merkle::{empty_root, node_hash, record_hash, Hash};
use tlog_tiles::tile_key;

use crate::remote::{FetchError, RemoteLog};
use crate::service::Checkpoint;
use crate::store::{LeafMetadata, LocalStore, StoreError};

/// In-memory [`LocalStore`] that counts mutating writes and offers
/// corruption hooks for detectability tests.
#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
    writes: AtomicU64,
}

#[derive(Default)]
struct Inner {
    leaves: Vec<Vec<u8>>,
    tiles: HashMap<String, Vec<Hash>>,
    metadata: HashMap<i64, LeafMetadata>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of mutating leaf/tile writes performed so far.
    pub(crate) fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn has_tile(&self, height: u8, level: u64, offset: u64) -> bool {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.tiles.contains_key(&store_key(height, level, offset))
    }

    pub(crate) fn metadata_row(&self, id: i64) -> Option<LeafMetadata> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.metadata.get(&id).cloned()
    }

    pub(crate) fn metadata_count(&self) -> usize {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.metadata.len()
    }

    /// Flip one bit of a stored leaf body.
    pub(crate) fn corrupt_leaf(&self, index: usize, byte: usize) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.leaves[index][byte] ^= 1;
    }

    /// Flip one bit of a stored tile hash.
    pub(crate) fn corrupt_tile(&self, height: u8, level: u64, offset: u64, slot: usize) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let tile = inner
            .tiles
            .get_mut(&store_key(height, level, offset))
            .expect("tile must exist to be corrupted");
        tile[slot][0] ^= 1;
    }
}

fn store_key(height: u8, level: u64, offset: u64) -> String {
    format!("{height}/{}", tile_key(level, offset))
}

impl LocalStore for MemoryStore {
    fn head(&self) -> Result<i64, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.leaves.len() as i64 - 1)
    }

    fn write_leaves(&self, start: i64, leaves: &[Vec<u8>]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let expected = inner.leaves.len() as i64;
        if start != expected {
            return Err(StoreError::NonContiguousWrite {
                expected,
                got: start,
            });
        }
        inner.leaves.extend_from_slice(leaves);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn leaves(&self, start: i64, count: u64) -> Result<Vec<Vec<u8>>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let begin = usize::try_from(start)
            .map_err(|_| StoreError::Corrupted(format!("negative leaf index {start}")))?;
        let end = begin + count as usize;
        if end > inner.leaves.len() {
            return Err(StoreError::Corrupted(format!(
                "only {} leaves present, asked for [{begin}, {end})",
                inner.leaves.len()
            )));
        }
        Ok(inner.leaves[begin..end].to_vec())
    }

    fn tile(&self, height: u8, level: u64, offset: u64) -> Result<Option<Vec<Hash>>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.tiles.get(&store_key(height, level, offset)).cloned())
    }

    fn set_tile(
        &self,
        height: u8,
        level: u64,
        offset: u64,
        hashes: &[Hash],
    ) -> Result<(), StoreError> {
        if hashes.len() != 1 << height {
            return Err(StoreError::Corrupted(format!(
                "tile write at level {level}, offset {offset} carries {} hashes, want {}",
                hashes.len(),
                1u64 << height
            )));
        }
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        match inner.tiles.get(&store_key(height, level, offset)) {
            Some(existing) if existing == hashes => Ok(()),
            Some(_) => Err(StoreError::TileOverwrite { level, offset }),
            None => {
                inner
                    .tiles
                    .insert(store_key(height, level, offset), hashes.to_vec());
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn set_leaf_metadata(&self, start: i64, rows: &[LeafMetadata]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        for (i, row) in rows.iter().enumerate() {
            inner.metadata.insert(start + i as i64, row.clone());
        }
        Ok(())
    }
}

/// In-memory [`RemoteLog`] serving a fixed leaf set, with counters and
/// failure injection for retry tests.
pub(crate) struct MemoryRemote {
    tile_height: u8,
    leaves: Vec<Vec<u8>>,
    fetches: AtomicU64,
    fail_next: AtomicU32,
    permanent_failure: AtomicBool,
}

impl MemoryRemote {
    pub(crate) fn new(tile_height: u8, leaves: Vec<Vec<u8>>) -> Self {
        Self {
            tile_height,
            leaves,
            fetches: AtomicU64::new(0),
            fail_next: AtomicU32::new(0),
            permanent_failure: AtomicBool::new(false),
        }
    }

    /// Total fetch calls observed, including failed ones.
    pub(crate) fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Make the next `n` fetch calls fail transiently.
    pub(crate) fn fail_next_fetches(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Make every subsequent fetch call fail permanently.
    pub(crate) fn fail_permanently(&self) {
        self.permanent_failure.store(true, Ordering::SeqCst);
    }

    fn gate(&self) -> Result<(), FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.permanent_failure.load(Ordering::SeqCst) {
            return Err(FetchError::Permanent("simulated 404".into()));
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(FetchError::Transient("simulated connection reset".into()));
        }
        Ok(())
    }

    fn slice(&self, begin: u64, count: u64) -> Result<Vec<Vec<u8>>, FetchError> {
        let end = begin + count;
        if end > self.leaves.len() as u64 {
            return Err(FetchError::Permanent(format!(
                "leaves [{begin}, {end}) beyond log size {}",
                self.leaves.len()
            )));
        }
        Ok(self.leaves[begin as usize..end as usize].to_vec())
    }
}

impl RemoteLog for MemoryRemote {
    fn full_leaves_at_offset(&self, offset: u64) -> Result<Vec<Vec<u8>>, FetchError> {
        self.gate()?;
        let width = 1u64 << self.tile_height;
        self.slice(offset * width, width)
    }

    fn partial_leaves_at_offset(
        &self,
        offset: u64,
        count: u64,
    ) -> Result<Vec<Vec<u8>>, FetchError> {
        self.gate()?;
        let width = 1u64 << self.tile_height;
        self.slice(offset * width, count)
    }

    fn tile_hashes(&self, level: u64, offset: u64) -> Result<Vec<Hash>, FetchError> {
        self.gate()?;
        let width = 1u64 << self.tile_height;
        let child_span = 1u64 << (level * u64::from(self.tile_height));
        let mut hashes = Vec::with_capacity(width as usize);
        for child in 0..width {
            let begin = (offset * width + child) * child_span;
            let leaves = self.slice(begin, child_span)?;
            hashes.push(naive_root(&record_hashes(&leaves)));
        }
        Ok(hashes)
    }
}

/// Naive recursive RFC 6962 root over leaf hashes.
pub(crate) fn naive_root(hashes: &[Hash]) -> Hash {
    match hashes {
        [] => empty_root(),
        [hash] => *hash,
        _ => {
            let mut split = 1usize;
            while split * 2 < hashes.len() {
                split *= 2;
            }
            node_hash(&naive_root(&hashes[..split]), &naive_root(&hashes[split..]))
        }
    }
}

pub(crate) fn record_hashes(leaves: &[Vec<u8>]) -> Vec<Hash> {
    leaves.iter().map(|leaf| record_hash(leaf)).collect()
}

/// Plain `"Leaf i"` bodies for tree-shape tests.
pub(crate) fn labeled_leaves(n: u64) -> Vec<Vec<u8>> {
    (0..n).map(|i| format!("Leaf {i}").into_bytes()).collect()
}

/// Well-formed two-line module bodies for metadata tests.
pub(crate) fn sumdb_leaves(n: u64) -> Vec<Vec<u8>> {
    (0..n)
        .map(|i| {
            format!(
                "example.com/mod{i} v1.0.{i} h1:repo{i}=\n\
                 example.com/mod{i} v1.0.{i}/go.mod h1:mod{i}=\n"
            )
            .into_bytes()
        })
        .collect()
}

/// Checkpoint committing to exactly the given leaves.
pub(crate) fn checkpoint_for(leaves: &[Vec<u8>]) -> Checkpoint {
    Checkpoint {
        tree_size: leaves.len() as u64,
        root_hash: naive_root(&record_hashes(leaves)),
    }
}
