use thiserror::Error;
use tlog_merkle::{Hash, RangeError};
use tlog_tiles::TileError;

use crate::remote::FetchError;
use crate::store::StoreError;

/// Errors surfaced by an audit run.
///
/// Only transient fetch failures are recovered internally (with backoff);
/// everything here is terminal for the run. Variants carry the
/// `(level, offset, slot)` coordinates needed to localize a fault.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The checkpoint covers fewer leaves than are already stored locally.
    #[error("remote log regressed: {local} leaves stored locally, checkpoint covers {remote}")]
    RemoteRegressed {
        /// Leaves present in the local store.
        local: u64,
        /// Tree size claimed by the checkpoint.
        remote: u64,
    },
    /// A remote fetch failed permanently, or exhausted its retry budget.
    #[error("fetch failed after {attempts} attempt(s): {source}")]
    FetchFailed {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// The final fetch error.
        #[source]
        source: FetchError,
    },
    /// A tile could not be decoded or addressed.
    #[error(transparent)]
    Tile(#[from] TileError),
    /// A recomputed hash differs from a stored or remote one.
    #[error("hash mismatch at level {level}, offset {offset}, slot {slot}")]
    HashMismatch {
        /// Tile stratum of the divergent tile.
        level: u64,
        /// Tile offset within the stratum.
        offset: u64,
        /// Index of the first differing hash within the tile.
        slot: usize,
    },
    /// The reassembled root does not match the checkpoint. Audit failure.
    #[error(
        "root mismatch at tree size {tree_size}: calculated {calculated}, checkpoint says {claimed}",
        calculated = hex::encode(.computed),
        claimed = hex::encode(.expected)
    )]
    RootMismatch {
        /// Tree size the root was computed for.
        tree_size: u64,
        /// Root reassembled from local tiles and stragglers.
        computed: Hash,
        /// Root claimed by the checkpoint.
        expected: Hash,
    },
    /// The reassembled range does not cover the checkpoint's leaf count.
    #[error("covered {got} leaves but the checkpoint has {want}")]
    LeafCountMismatch {
        /// Leaves covered by the reassembled range.
        got: u64,
        /// Leaves claimed by the checkpoint.
        want: u64,
    },
    /// A leaf body failed the two-line metadata cross-check.
    #[error("leaf {index}: {reason}")]
    Metadata {
        /// Index of the offending leaf.
        index: u64,
        /// What was wrong with its body.
        reason: String,
    },
    /// The local store failed; a fatal local fault.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A compact range operation failed; indicates an internal
    /// inconsistency in the stored tiles.
    #[error(transparent)]
    Range(#[from] RangeError),
    /// The run's cancellation token fired.
    #[error("audit run cancelled")]
    Cancelled,
}
