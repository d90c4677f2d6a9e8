//! The remote log capability consumed by the auditor.

use thiserror::Error;
use tlog_merkle::Hash;

/// A fetch failure from the remote log.
///
/// Transient failures (network faults, 5xx responses) are retried with
/// exponential backoff by the pipeline; permanent failures (parse errors,
/// 4xx responses) surface unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// A failure that may succeed on retry.
    #[error("transient fetch failure: {0}")]
    Transient(String),
    /// A failure that will not succeed on retry.
    #[error("permanent fetch failure: {0}")]
    Permanent(String),
}

/// Read access to the remote log, tile by tile.
///
/// The reference implementation fetches tiles over HTTP and parses the
/// text-format leaves; any transport with the same semantics works. All
/// methods may be called concurrently.
pub trait RemoteLog: Send + Sync {
    /// Fetch the full leaf tile at `offset`: exactly `2^H` leaves starting
    /// at leaf index `offset * 2^H`.
    fn full_leaves_at_offset(&self, offset: u64) -> Result<Vec<Vec<u8>>, FetchError>;

    /// Fetch the `count <= 2^H` straggler leaves of the partial leaf tile at
    /// `offset`.
    fn partial_leaves_at_offset(&self, offset: u64, count: u64)
        -> Result<Vec<Vec<u8>>, FetchError>;

    /// Fetch the remote's `2^H` hashes for the inner tile at
    /// `(level, offset)`.
    fn tile_hashes(&self, level: u64, offset: u64) -> Result<Vec<Hash>, FetchError>;
}
