//! The local store capability consumed by the auditor.

use thiserror::Error;
use tlog_merkle::Hash;

/// Errors from the local store. All are fatal for the run; store failures
/// are never retried.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the underlying SQLite connection.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A leaf write did not start at the current head.
    #[error("non-contiguous leaf write: next leaf is {expected}, write starts at {got}")]
    NonContiguousWrite {
        /// The only permissible start index, `head + 1`.
        expected: i64,
        /// The start index that was supplied.
        got: i64,
    },
    /// A tile write would replace previously stored, different content.
    #[error("tile at level {level}, offset {offset} already stored with different content")]
    TileOverwrite {
        /// Tile stratum.
        level: u64,
        /// Tile offset within the stratum.
        offset: u64,
    },
    /// Stored data is missing or malformed.
    #[error("corrupted store: {0}")]
    Corrupted(String),
}

/// A parsed leaf body: one module version with its tree and `go.mod`
/// checksums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafMetadata {
    /// Module path.
    pub module: String,
    /// Module version.
    pub version: String,
    /// Checksum of the module tree (the value after `h1:`).
    pub repo_hash: String,
    /// Checksum of the module's `go.mod` file (the value after `h1:`).
    pub mod_hash: String,
}

/// Append-only leaf storage plus tile cache and head pointer.
///
/// Leaves are dense: the head is the largest index written and there are no
/// gaps. Leaves and tiles are immutable once written; a write is idempotent
/// only when it carries identical content. Implementations are internally
/// synchronized — `write_leaves` is exclusive, tile reads are
/// concurrent-safe.
pub trait LocalStore: Send + Sync {
    /// Largest leaf index written, or `-1` when the store is empty.
    fn head(&self) -> Result<i64, StoreError>;

    /// Write a contiguous block of leaves starting at `start`.
    ///
    /// Fails with [`StoreError::NonContiguousWrite`] unless
    /// `start == head() + 1`. After success the head is
    /// `start + leaves.len() - 1`.
    fn write_leaves(&self, start: i64, leaves: &[Vec<u8>]) -> Result<(), StoreError>;

    /// Read `count` consecutive leaves starting at `start`. The whole slice
    /// must be present.
    fn leaves(&self, start: i64, count: u64) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Read the `2^height` child hashes of tile `(level, offset)`, or `None`
    /// if the tile was never written.
    fn tile(&self, height: u8, level: u64, offset: u64) -> Result<Option<Vec<Hash>>, StoreError>;

    /// Write the `2^height` child hashes of tile `(level, offset)`.
    ///
    /// Idempotent if the content is identical to what is already stored;
    /// fails with [`StoreError::TileOverwrite`] otherwise.
    fn set_tile(
        &self,
        height: u8,
        level: u64,
        offset: u64,
        hashes: &[Hash],
    ) -> Result<(), StoreError>;

    /// Persist parsed metadata rows for the leaves starting at `start`.
    fn set_leaf_metadata(&self, start: i64, rows: &[LeafMetadata]) -> Result<(), StoreError>;
}
