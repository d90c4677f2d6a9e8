//! Phase 2: recompute every tile stratum from the stored leaves.

use std::thread;

use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::debug;

use tlog_merkle::{record_hash, Hash};

use crate::cancel::CancelToken;
use crate::error::AuditError;
use crate::remote::RemoteLog;
use crate::service::{Checkpoint, Service};
use crate::store::LocalStore;

impl<S: LocalStore, R: RemoteLog> Service<S, R> {
    /// Recalculate all tiles bottom-up from the leaves table.
    ///
    /// One thread per stratum, connected by bounded channels of subtree
    /// roots: the leaf stratum hashes stored leaves, each upper stratum
    /// packs `2^H` roots from the stratum below into its own tiles. Any
    /// hash that no longer matches a previously stored tile fails the run
    /// with the divergent slot; missing tiles are filled in.
    pub fn hash_tiles(
        &self,
        checkpoint: &Checkpoint,
        cancel: &CancelToken,
    ) -> Result<(), AuditError> {
        cancel.check()?;
        let tile_width = self.tile_width();
        let strata = self.inner_strata(checkpoint.tree_size);
        if strata == 0 {
            return Ok(());
        }
        debug!(strata, "hashing tiles");

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(strata as usize);
            let mut tile_count = checkpoint.tree_size / tile_width;

            let (tx, mut rx) = bounded::<Hash>(tile_width as usize);
            let leaf_tile_count = tile_count;
            handles.push(scope.spawn(move || self.hash_leaf_stratum(leaf_tile_count, tx, cancel)));

            for level in 1..strata {
                tile_count /= tile_width;
                let (next_tx, next_rx) = bounded::<Hash>(tile_width as usize);
                let input = std::mem::replace(&mut rx, next_rx);
                let count = tile_count;
                handles.push(
                    scope.spawn(move || self.hash_upper_stratum(level, count, input, next_tx, cancel)),
                );
            }

            // `rx` stays alive until every stratum has joined: the top
            // stratum emits fewer than a tile's worth of roots, which the
            // channel buffer absorbs with no consumer.
            let mut first_err = None;
            for handle in handles {
                match handle.join() {
                    Ok(Err(err)) => {
                        first_err.get_or_insert(err);
                    }
                    Ok(Ok(())) => {}
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            drop(rx);
            match first_err {
                None => Ok(()),
                Some(err) => Err(err),
            }
        })
    }

    /// Hash the leaf stratum: recompute record hashes for every full tile
    /// of leaves, check them against any stored tile, and emit each tile's
    /// subtree root upward.
    fn hash_leaf_stratum(
        &self,
        tile_count: u64,
        out: Sender<Hash>,
        cancel: &CancelToken,
    ) -> Result<(), AuditError> {
        let tile_width = self.tile_width();
        for offset in 0..tile_count {
            cancel.check()?;
            let leaves = self.store.leaves((offset * tile_width) as i64, tile_width)?;
            let hashes: Vec<Hash> = leaves.iter().map(|leaf| record_hash(leaf)).collect();
            self.check_or_store_tile(0, offset, &hashes)?;
            let root = self.tile_root(&hashes)?;
            if out.send(root).is_err() {
                // The stratum above failed and hung up; it reports the error.
                return Ok(());
            }
        }
        Ok(())
    }

    /// Hash one upper stratum: group `2^H` roots from the stratum below
    /// into each tile, check-or-store it, and emit its root upward.
    fn hash_upper_stratum(
        &self,
        level: u64,
        tile_count: u64,
        input: Receiver<Hash>,
        out: Sender<Hash>,
        cancel: &CancelToken,
    ) -> Result<(), AuditError> {
        let tile_width = self.tile_width() as usize;
        for offset in 0..tile_count {
            cancel.check()?;
            let mut children = Vec::with_capacity(tile_width);
            for _ in 0..tile_width {
                match input.recv() {
                    Ok(hash) => children.push(hash),
                    // The stratum below failed and hung up; it reports the
                    // error.
                    Err(_) => return Ok(()),
                }
            }
            self.check_or_store_tile(level, offset, &children)?;
            let root = self.tile_root(&children)?;
            if out.send(root).is_err() {
                return Ok(());
            }
        }
        Ok(())
    }
}
