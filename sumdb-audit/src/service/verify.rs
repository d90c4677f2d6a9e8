//! Phase 4 (optional): compare every local tile with the remote's copy.

use crate::backoff::retry_fetch;
use crate::cancel::CancelToken;
use crate::error::AuditError;
use crate::remote::{FetchError, RemoteLog};
use crate::service::{Checkpoint, Service};
use crate::store::LocalStore;

impl<S: LocalStore, R: RemoteLog> Service<S, R> {
    /// Check that every locally calculated tile matches the remote log.
    ///
    /// Redundant while [`check_root_hash`](Self::check_root_hash) passes,
    /// but localizes where corruption happened when it does not: the first
    /// differing `(level, offset, slot)` is reported and the walk stops.
    pub fn verify_tiles(
        &self,
        checkpoint: &Checkpoint,
        cancel: &CancelToken,
    ) -> Result<(), AuditError> {
        let strata = self.inner_strata(checkpoint.tree_size);
        for level in 0..strata {
            let mut offset = 0u64;
            loop {
                cancel.check()?;
                let local = match self.store.tile(self.config.tile_height, level, offset)? {
                    Some(hashes) => hashes,
                    None => break,
                };
                let remote = retry_fetch(&self.config.backoff, cancel, || {
                    self.remote.tile_hashes(level, offset)
                })?;
                if remote.len() != local.len() {
                    return Err(AuditError::FetchFailed {
                        attempts: 1,
                        source: FetchError::Permanent(format!(
                            "remote tile at level {level}, offset {offset} has {} hashes, want {}",
                            remote.len(),
                            local.len()
                        )),
                    });
                }
                for (slot, (local, remote)) in local.iter().zip(remote.iter()).enumerate() {
                    if local != remote {
                        return Err(AuditError::HashMismatch {
                            level,
                            offset,
                            slot,
                        });
                    }
                }
                offset += 1;
            }
        }
        Ok(())
    }
}
