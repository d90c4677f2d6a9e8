//! Phase 1: clone whole leaf tiles from the remote log.

use std::collections::BTreeMap;
use std::thread;

use crossbeam::channel::bounded;
use tracing::debug;

use crate::backoff::retry_fetch;
use crate::cancel::CancelToken;
use crate::error::AuditError;
use crate::remote::RemoteLog;
use crate::service::{Checkpoint, Service};
use crate::store::LocalStore;

impl<S: LocalStore, R: RemoteLog> Service<S, R> {
    /// Copy the leaf data of every full tile the checkpoint covers into the
    /// local store.
    ///
    /// Only whole tiles are copied; stragglers that do not fill a tile yet
    /// are handled by the root check. Up to `fetch_concurrency` fetches run
    /// in flight, each with its own backoff clock; a single consumer
    /// reorders the results by offset so leaves are written strictly in
    /// order.
    pub fn clone_leaves(
        &self,
        checkpoint: &Checkpoint,
        cancel: &CancelToken,
    ) -> Result<(), AuditError> {
        cancel.check()?;
        let head = self.store.head()?;
        let local_leaves = (head + 1) as u64;
        if checkpoint.tree_size < local_leaves {
            return Err(AuditError::RemoteRegressed {
                local: local_leaves,
                remote: checkpoint.tree_size,
            });
        }

        let tile_width = self.tile_width();
        let remaining_chunks = (checkpoint.tree_size - local_leaves) / tile_width;
        if remaining_chunks == 0 {
            return Ok(());
        }
        let start_offset = local_leaves / tile_width;
        debug!(remaining_chunks, start_offset, "cloning leaf tiles");

        let workers = self
            .config
            .fetch_concurrency
            .max(1)
            .min(usize::try_from(remaining_chunks).unwrap_or(usize::MAX));

        thread::scope(|scope| {
            // The channels live inside the scope closure: when the consumer
            // below returns early, dropping its receiver unblocks any worker
            // still sending, so the scope join cannot deadlock.
            let (offset_tx, offset_rx) = bounded::<u64>(workers);
            let (chunk_tx, chunk_rx) = bounded::<Result<(u64, Vec<Vec<u8>>), AuditError>>(workers);

            scope.spawn(move || {
                for offset in start_offset..start_offset + remaining_chunks {
                    if cancel.is_cancelled() || offset_tx.send(offset).is_err() {
                        return;
                    }
                }
            });
            for _ in 0..workers {
                let offset_rx = offset_rx.clone();
                let chunk_tx = chunk_tx.clone();
                scope.spawn(move || {
                    for offset in offset_rx.iter() {
                        let fetched = retry_fetch(&self.config.backoff, cancel, || {
                            self.remote.full_leaves_at_offset(offset)
                        });
                        let failed = fetched.is_err();
                        let sent = chunk_tx.send(fetched.map(|leaves| (offset, leaves)));
                        if failed || sent.is_err() {
                            return;
                        }
                    }
                });
            }
            // The consumer keeps the only receiver, so worker exits are
            // observable as disconnects.
            drop(offset_rx);
            drop(chunk_tx);

            let mut pending: BTreeMap<u64, Vec<Vec<u8>>> = BTreeMap::new();
            let mut next_offset = start_offset;
            let end_offset = start_offset + remaining_chunks;
            while next_offset < end_offset {
                cancel.check()?;
                let (offset, leaves) = match chunk_rx.recv() {
                    Ok(result) => result?,
                    // Workers are gone without delivering an error: the
                    // feeder stopped early, which only happens on cancel.
                    Err(_) => return Err(AuditError::Cancelled),
                };
                pending.insert(offset, leaves);
                while let Some(leaves) = pending.remove(&next_offset) {
                    self.store
                        .write_leaves((next_offset * tile_width) as i64, &leaves)?;
                    next_offset += 1;
                }
            }
            Ok(())
        })
    }
}
