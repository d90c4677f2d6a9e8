//! The audit service and its phases.
//!
//! One `Service` value carries the configuration and collaborators for a
//! run; phases are invoked in order, each taking the current checkpoint:
//!
//! ```text
//! clone_leaves -> hash_tiles -> check_root_hash -> (verify_tiles) -> process_metadata
//! ```
//!
//! Any phase error is terminal for the run. Because every persistent write
//! is idempotent, the next run re-enters from the top and resumes where the
//! failed one stopped.

mod clone;
mod hash;
mod metadata;
mod root;
mod verify;


use tlog_merkle::{CompactRange, Hash};
use tracing::info;

use crate::cancel::CancelToken;
use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::remote::RemoteLog;
use crate::store::LocalStore;

/// The trust anchor for a single audit run: an already-verified signed tree
/// head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Number of leaves in the log.
    pub tree_size: u64,
    /// RFC 6962 root hash over those leaves.
    pub root_hash: Hash,
}

/// All the operations required to verifiably clone the remote log.
pub struct Service<S, R> {
    store: S,
    remote: R,
    config: AuditConfig,
}

impl<S: LocalStore, R: RemoteLog> Service<S, R> {
    /// Construct a service from its collaborators, validating the
    /// configuration.
    pub fn new(store: S, remote: R, config: AuditConfig) -> Result<Self, AuditError> {
        config.validate()?;
        Ok(Self {
            store,
            remote,
            config,
        })
    }

    /// The run's configuration.
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Drive all phases in order against the given checkpoint.
    ///
    /// The tile verification pass only runs when
    /// [`AuditConfig::verify_tiles`] is set; it localizes corruption but is
    /// redundant while the root check passes.
    pub fn run(&self, checkpoint: &Checkpoint, cancel: &CancelToken) -> Result<(), AuditError> {
        info!(tree_size = checkpoint.tree_size, "starting audit run");
        self.clone_leaves(checkpoint, cancel)?;
        self.hash_tiles(checkpoint, cancel)?;
        self.check_root_hash(checkpoint, cancel)?;
        if self.config.verify_tiles {
            self.verify_tiles(checkpoint, cancel)?;
        }
        self.process_metadata(checkpoint, cancel)?;
        info!(tree_size = checkpoint.tree_size, "audit run complete");
        Ok(())
    }

    /// Number of leaves covered by one tile: `2^height`.
    pub(crate) fn tile_width(&self) -> u64 {
        1u64 << self.config.tile_height
    }

    /// Number of tile strata holding at least one full tile for the given
    /// leaf count. The top stratum is `inner_strata - 1`; strata above it
    /// have no full tile yet and are covered by the compact-range merge of
    /// the root check instead.
    pub(crate) fn inner_strata(&self, leaves: u64) -> u64 {
        let mut covered = leaves >> self.config.tile_height;
        let mut strata = 0;
        while covered > 0 {
            covered >>= self.config.tile_height;
            strata += 1;
        }
        strata
    }

    /// Compare a freshly computed tile against the stored one, or store it
    /// if absent.
    ///
    /// A divergence is reported as [`AuditError::HashMismatch`] with the
    /// first differing slot, which localizes corruption of the underlying
    /// leaves or of the stored tile itself.
    pub(crate) fn check_or_store_tile(
        &self,
        level: u64,
        offset: u64,
        computed: &[Hash],
    ) -> Result<(), AuditError> {
        match self.store.tile(self.config.tile_height, level, offset)? {
            Some(stored) => {
                for (slot, (stored, computed)) in stored.iter().zip(computed).enumerate() {
                    if stored != computed {
                        return Err(AuditError::HashMismatch {
                            level,
                            offset,
                            slot,
                        });
                    }
                }
                Ok(())
            }
            None => {
                self.store
                    .set_tile(self.config.tile_height, level, offset, computed)?;
                Ok(())
            }
        }
    }

    /// Root of the perfect subtree over one tile's child hashes.
    pub(crate) fn tile_root(&self, hashes: &[Hash]) -> Result<Hash, AuditError> {
        let mut range = CompactRange::new(0);
        for hash in hashes {
            range.append(*hash);
        }
        Ok(range.root_hash()?)
    }
}
