//! Phase 3: reassemble the global root and compare it with the checkpoint.

use tlog_merkle::{record_hash, CompactRange};
use tracing::debug;

use crate::backoff::retry_fetch;
use crate::cancel::CancelToken;
use crate::error::AuditError;
use crate::remote::RemoteLog;
use crate::service::{Checkpoint, Service};
use crate::store::{LocalStore, StoreError};

impl<S: LocalStore, R: RemoteLog> Service<S, R> {
    /// Compute the root hash from the locally stored tiles plus the
    /// remote's stragglers, and require it to equal the checkpoint's.
    ///
    /// Strata are consumed top-down: a tile at level `k` commits to
    /// `2^((k+1)*H)` leaves, so walking coarse to fine keeps the running
    /// compact range a perfect-prefix cover at every step. Leaves past the
    /// last full leaf tile never formed a tile; they are fetched from the
    /// remote and appended individually.
    pub fn check_root_hash(
        &self,
        checkpoint: &Checkpoint,
        cancel: &CancelToken,
    ) -> Result<(), AuditError> {
        cancel.check()?;
        let tile_width = self.tile_width();
        let height = u64::from(self.config.tile_height);
        let mut range = CompactRange::new(0);

        let strata = self.inner_strata(checkpoint.tree_size);
        for level in (0..strata).rev() {
            // How many real leaves a tile at this level covers.
            let tile_leaf_count = 1u64 << ((level + 1) * height);
            let level_tile_count = checkpoint.tree_size / tile_leaf_count;
            let first_offset = range.end() / tile_leaf_count;
            for offset in first_offset..level_tile_count {
                cancel.check()?;
                let hashes = self
                    .store
                    .tile(self.config.tile_height, level, offset)?
                    .ok_or_else(|| {
                        StoreError::Corrupted(format!(
                            "missing tile at level {level}, offset {offset}"
                        ))
                    })?;
                // The tile as a standalone subtree collapses to one root...
                let mut tile_range = CompactRange::new(0);
                for hash in &hashes {
                    tile_range.append(*hash);
                }
                // ...which is then used for what it really is: a commitment
                // to tile_leaf_count leaves of the log.
                let tree_range = CompactRange::new_range(
                    offset * tile_leaf_count,
                    (offset + 1) * tile_leaf_count,
                    &tile_range.hashes(),
                )?;
                range.append_range(&tree_range)?;
            }
        }

        let stragglers = checkpoint.tree_size - range.end();
        if stragglers > 0 {
            debug!(stragglers, "appending straggler leaves");
            let offset = checkpoint.tree_size / tile_width;
            let leaves = retry_fetch(&self.config.backoff, cancel, || {
                self.remote.partial_leaves_at_offset(offset, stragglers)
            })?;
            for leaf in &leaves {
                range.append(record_hash(leaf));
            }
        }

        if range.end() != checkpoint.tree_size {
            return Err(AuditError::LeafCountMismatch {
                got: range.end(),
                want: checkpoint.tree_size,
            });
        }
        let computed = range.root_hash()?;
        if computed != checkpoint.root_hash {
            return Err(AuditError::RootMismatch {
                tree_size: checkpoint.tree_size,
                computed,
                expected: checkpoint.root_hash,
            });
        }
        Ok(())
    }
}
