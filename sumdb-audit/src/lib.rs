//! Auditor for an append-only module-checksum transparency log.
//!
//! The auditor verifiably clones a remote log into a local store and proves
//! that the stored data is consistent with a signed checkpoint published by
//! the log operator:
//!
//! 1. [`Service::clone_leaves`] fetches whole leaf tiles concurrently and
//!    persists them densely, in order
//! 2. [`Service::hash_tiles`] recomputes every tile stratum bottom-up from
//!    the stored leaves, detecting divergence from previously stored tiles
//! 3. [`Service::check_root_hash`] reassembles the global root from stored
//!    tiles plus the remote's straggler leaves and compares it with the
//!    checkpoint
//! 4. [`Service::verify_tiles`] (optional) compares every local tile with the
//!    remote's copy to localize corruption
//! 5. [`Service::process_metadata`] parses the leaf bodies into structured
//!    module/version/checksum rows
//!
//! Collaborators are injected as capabilities: any [`LocalStore`] (the
//! bundled [`SqliteStore`] is the reference) and any [`RemoteLog`]. All
//! persistent writes are idempotent, so a failed run re-enters cleanly from
//! the top. A [`CancelToken`] bounds the run; every pipeline stage checks it
//! before I/O and on channel operations.

mod backoff;
mod cancel;
mod config;
mod error;
mod remote;
mod service;
mod sqlite_store;
mod store;
#[cfg(test)]
pub(crate) mod test_utils;

pub use tlog_merkle::{Hash, HASH_SIZE};
pub use tlog_tiles::TileError;

pub use backoff::BackoffConfig;
pub use cancel::CancelToken;
pub use config::AuditConfig;
pub use error::AuditError;
pub use remote::{FetchError, RemoteLog};
pub use service::{Checkpoint, Service};
pub use sqlite_store::SqliteStore;
pub use store::{LeafMetadata, LocalStore, StoreError};
