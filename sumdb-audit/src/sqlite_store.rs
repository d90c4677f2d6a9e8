//! SQLite-backed [`LocalStore`].
//!
//! Three tables, matching the relational surface the auditor needs:
//!
//! - `leaves(id PRIMARY KEY, data BLOB)` — the cloned leaf bodies
//! - `tiles(height, level, offset, hashes BLOB)` — packed `32 * 2^height`
//!   child-hash blobs keyed by tile coordinates
//! - `leafMetadata(id PRIMARY KEY, module, version, repoHash, modHash)` —
//!   parsed leaf rows
//!
//! The connection lives behind a `Mutex` so `&self` methods can be called
//! from the pipeline threads; multi-statement writes run inside a
//! transaction, keeping every trait call atomic.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tlog_merkle::{Hash, HASH_SIZE};

use crate::store::{LeafMetadata, LocalStore, StoreError};

/// SQLite implementation of the auditor's local store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given database path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a transient in-memory store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a closure against the connection, holding the mutex for the
    /// duration.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned: another thread panicked while
    /// touching the database, so its state can no longer be trusted.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.conn.lock().expect("connection mutex poisoned");
        f(&mut guard)
    }
}

fn create_tables(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS leaves (
            id   INTEGER PRIMARY KEY,
            data BLOB NOT NULL
        );
        CREATE TABLE IF NOT EXISTS tiles (
            height   INTEGER NOT NULL,
            level    INTEGER NOT NULL,
            \"offset\" INTEGER NOT NULL,
            hashes   BLOB NOT NULL,
            PRIMARY KEY (height, level, \"offset\")
        );
        CREATE TABLE IF NOT EXISTS leafMetadata (
            id       INTEGER PRIMARY KEY,
            module   TEXT NOT NULL,
            version  TEXT NOT NULL,
            repoHash TEXT NOT NULL,
            modHash  TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn sql_head(conn: &Connection) -> Result<i64, StoreError> {
    let max: Option<i64> = conn.query_row("SELECT MAX(id) FROM leaves", [], |row| row.get(0))?;
    Ok(max.unwrap_or(-1))
}

fn sql_tile_blob(
    conn: &Connection,
    height: u8,
    level: u64,
    offset: u64,
) -> Result<Option<Vec<u8>>, StoreError> {
    let blob = conn
        .query_row(
            "SELECT hashes FROM tiles WHERE height = ?1 AND level = ?2 AND \"offset\" = ?3",
            params![height, level as i64, offset as i64],
            |row| row.get(0),
        )
        .optional()?;
    Ok(blob)
}

/// Pack tile hashes into the stored blob form.
fn pack_hashes(hashes: &[Hash]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(hashes.len() * HASH_SIZE);
    for hash in hashes {
        blob.extend_from_slice(hash);
    }
    blob
}

/// Split a stored blob back into hashes, validating its length against the
/// tile width.
fn unpack_hashes(blob: &[u8], height: u8, level: u64, offset: u64) -> Result<Vec<Hash>, StoreError> {
    let want = (1usize << height) * HASH_SIZE;
    if blob.len() != want {
        return Err(StoreError::Corrupted(format!(
            "tile blob at level {level}, offset {offset} is {} bytes, want {want}",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(HASH_SIZE)
        .map(|chunk| {
            let mut hash = [0u8; HASH_SIZE];
            hash.copy_from_slice(chunk);
            hash
        })
        .collect())
}

impl LocalStore for SqliteStore {
    fn head(&self) -> Result<i64, StoreError> {
        self.with_conn(|conn| sql_head(conn))
    }

    fn write_leaves(&self, start: i64, leaves: &[Vec<u8>]) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let expected = sql_head(&tx)? + 1;
            if start != expected {
                return Err(StoreError::NonContiguousWrite {
                    expected,
                    got: start,
                });
            }
            for (i, leaf) in leaves.iter().enumerate() {
                tx.execute(
                    "INSERT INTO leaves (id, data) VALUES (?1, ?2)",
                    params![start + i as i64, leaf],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn leaves(&self, start: i64, count: u64) -> Result<Vec<Vec<u8>>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, data FROM leaves WHERE id >= ?1 ORDER BY id LIMIT ?2")?;
            let rows = stmt.query_map(params![start, count as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?;
            let mut leaves = Vec::with_capacity(count as usize);
            for (i, row) in rows.enumerate() {
                let (id, data) = row?;
                let want = start + i as i64;
                if id != want {
                    return Err(StoreError::Corrupted(format!(
                        "leaf {want} is missing, found {id} instead"
                    )));
                }
                leaves.push(data);
            }
            if leaves.len() as u64 != count {
                return Err(StoreError::Corrupted(format!(
                    "only {} of {count} leaves present from {start}",
                    leaves.len()
                )));
            }
            Ok(leaves)
        })
    }

    fn tile(&self, height: u8, level: u64, offset: u64) -> Result<Option<Vec<Hash>>, StoreError> {
        self.with_conn(|conn| match sql_tile_blob(conn, height, level, offset)? {
            None => Ok(None),
            Some(blob) => Ok(Some(unpack_hashes(&blob, height, level, offset)?)),
        })
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
        let blob = pack_hashes(hashes);
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            match sql_tile_blob(&tx, height, level, offset)? {
                Some(existing) if existing == blob => return Ok(()),
                Some(_) => return Err(StoreError::TileOverwrite { level, offset }),
                None => {}
            }
            tx.execute(
                "INSERT INTO tiles (height, level, \"offset\", hashes) VALUES (?1, ?2, ?3, ?4)",
                params![height, level as i64, offset as i64, blob],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn set_leaf_metadata(&self, start: i64, rows: &[LeafMetadata]) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for (i, row) in rows.iter().enumerate() {
                tx.execute(
                    "INSERT OR REPLACE INTO leafMetadata (id, module, version, repoHash, modHash) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        start + i as i64,
                        row.module,
                        row.version,
                        row.repo_hash,
                        row.mod_hash
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlog_merkle::record_hash;

    fn sample_leaves(n: u64) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("Leaf {i}").into_bytes()).collect()
    }

    #[test]
    fn empty_store_has_head_minus_one() {
        let store = SqliteStore::open_in_memory().expect("open store");
        assert_eq!(store.head().expect("head"), -1);
    }

    #[test]
    fn dense_append_round_trips() {
        let store = SqliteStore::open_in_memory().expect("open store");
        let leaves = sample_leaves(8);
        store.write_leaves(0, &leaves[..5]).expect("first block");
        store.write_leaves(5, &leaves[5..]).expect("second block");
        assert_eq!(store.head().expect("head"), 7);
        assert_eq!(store.leaves(0, 8).expect("read back"), leaves);
        assert_eq!(store.leaves(3, 2).expect("inner slice"), leaves[3..5]);
    }

    #[test]
    fn non_contiguous_write_is_rejected() {
        let store = SqliteStore::open_in_memory().expect("open store");
        store.write_leaves(0, &sample_leaves(3)).expect("seed");
        let err = store
            .write_leaves(5, &sample_leaves(1))
            .expect_err("gap must be rejected");
        assert!(matches!(
            err,
            StoreError::NonContiguousWrite {
                expected: 3,
                got: 5
            }
        ));
    }

    #[test]
    fn reading_past_the_head_fails() {
        let store = SqliteStore::open_in_memory().expect("open store");
        store.write_leaves(0, &sample_leaves(3)).expect("seed");
        assert!(matches!(
            store.leaves(0, 5),
            Err(StoreError::Corrupted(_))
        ));
    }

    #[test]
    fn absent_tile_reads_as_none() {
        let store = SqliteStore::open_in_memory().expect("open store");
        assert!(store.tile(8, 0, 0).expect("read").is_none());
    }

    #[test]
    fn tile_round_trips_and_is_idempotent() {
        let store = SqliteStore::open_in_memory().expect("open store");
        let hashes: Vec<Hash> = (0u64..4).map(|i| record_hash(&i.to_be_bytes())).collect();
        store.set_tile(2, 0, 7, &hashes).expect("first write");
        store.set_tile(2, 0, 7, &hashes).expect("identical rewrite");
        assert_eq!(store.tile(2, 0, 7).expect("read"), Some(hashes));
    }

    #[test]
    fn divergent_tile_overwrite_is_rejected() {
        let store = SqliteStore::open_in_memory().expect("open store");
        let hashes: Vec<Hash> = (0u64..4).map(|i| record_hash(&i.to_be_bytes())).collect();
        store.set_tile(2, 1, 3, &hashes).expect("first write");
        let mut tampered = hashes.clone();
        tampered[2][0] ^= 0xff;
        let err = store
            .set_tile(2, 1, 3, &tampered)
            .expect_err("different content must be rejected");
        assert!(matches!(
            err,
            StoreError::TileOverwrite { level: 1, offset: 3 }
        ));
    }

    #[test]
    fn tile_write_validates_width() {
        let store = SqliteStore::open_in_memory().expect("open store");
        let hashes: Vec<Hash> = vec![record_hash(b"x"); 3];
        assert!(matches!(
            store.set_tile(2, 0, 0, &hashes),
            Err(StoreError::Corrupted(_))
        ));
    }

    #[test]
    fn metadata_rows_round_trip() {
        let store = SqliteStore::open_in_memory().expect("open store");
        let rows = vec![LeafMetadata {
            module: "example.com/mod".into(),
            version: "v1.2.3".into(),
            repo_hash: "abc123=".into(),
            mod_hash: "def456=".into(),
        }];
        store.set_leaf_metadata(0, &rows).expect("first write");
        store.set_leaf_metadata(0, &rows).expect("idempotent rewrite");
        let module: String = store
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT module FROM leafMetadata WHERE id = 0",
                    [],
                    |row| row.get(0),
                )?)
            })
            .expect("read row");
        assert_eq!(module, "example.com/mod");
    }

    #[test]
    fn store_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("audit.db");
        {
            let store = SqliteStore::open(&path).expect("open store");
            store.write_leaves(0, &sample_leaves(4)).expect("seed");
        }
        let store = SqliteStore::open(&path).expect("reopen store");
        assert_eq!(store.head().expect("head"), 3);
        assert_eq!(store.leaves(0, 4).expect("read back"), sample_leaves(4));
    }
}
