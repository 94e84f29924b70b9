//! Thin wrapper over `lmdb::Environment`/`Transaction`/`Database`/`Cursor` —
//! the concrete realization of spec.md §6's abstract "transactional
//! ordered KV store" interface.
//!
//! Grounded directly on the teacher's own working `lmdb` usage in
//! `bin/rdms/perf_lmdb.rs` (`set_map_size`, `open_db`/`create_db`,
//! `begin_rw_txn`/`begin_ro_txn`, `put`/`get`/`del`,
//! `open_ro_cursor().iter()`, `env.stat()`, `sync(true)`); this module
//! gives that same call pattern a crate-error-typed, multi-database-aware
//! face rather than the teacher's own `.unwrap()`-heavy benchmark code.
//!
//! No custom LMDB comparator is registered: DESIGN.md's Open Question #1
//! resolution (descending direction folded into `keycodec`'s byte
//! encoding) means every named database compares keys with LMDB's default
//! byte-wise comparator.

use std::path::Path;

use lmdb::{Cursor, Transaction};

use crate::{err_at, Error, Result};

/// One open LMDB environment — the "environment directory" of spec.md §6.
pub struct Env {
    inner: lmdb::Environment,
}

impl Env {
    /// Open (creating if absent) the environment directory at `path` with
    /// room for up to `max_dbs` named databases.
    pub fn open(path: &Path, map_size: usize, max_dbs: u32) -> Result<Env> {
        if !path.exists() {
            err_at!(IoError, std::fs::create_dir_all(path))?;
        }
        let mut flags = lmdb::EnvironmentFlags::empty();
        flags.insert(lmdb::EnvironmentFlags::NO_TLS);
        let inner = lmdb::Environment::new()
            .set_flags(flags)
            .set_map_size(map_size)
            .set_max_dbs(max_dbs)
            .open(path)
            .map_err(Error::from)?;
        Ok(Env { inner })
    }

    pub fn sync(&self, force: bool) -> Result<()> {
        self.inner.sync(force).map_err(Error::from)
    }

    /// Grow the environment's map size (spec.md §6 `Database::resize`,
    /// recovery path for a `MAP_FULL` error per spec.md §7).
    pub fn resize(&mut self, new_map_size: usize) -> Result<()> {
        // Safe: resizing requires no open transactions, which callers
        // guarantee by holding the writer door (crate::lock) exclusively
        // before calling this.
        unsafe { self.inner.set_map_size(new_map_size) }.map_err(Error::from)
    }

    /// Open an existing named database (fails `NOT_FOUND` if absent).
    pub fn open_db(&self, name: &str) -> Result<lmdb::Database> {
        self.inner.open_db(Some(name)).map_err(Error::from)
    }

    /// Create a named database, `dup_sort` for secondary-index trees that
    /// admit multiple values per key (spec.md §4.5 "Duplicate-sorted
    /// secondary trees").
    pub fn create_db(&self, name: &str, dup_sort: bool) -> Result<lmdb::Database> {
        let mut flags = lmdb::DatabaseFlags::empty();
        if dup_sort {
            flags.insert(lmdb::DatabaseFlags::DUP_SORT);
        }
        self.inner.create_db(Some(name), flags).map_err(Error::from)
    }

    /// Remove a named database entirely, including its entry in the
    /// environment (spec.md §4.6 `drop`/§4.5 `drop` index).
    pub fn drop_db(&self, db: lmdb::Database) -> Result<()> {
        let mut txn = self.inner.begin_rw_txn().map_err(Error::from)?;
        err_at!(IoError, txn.drop_db(db))?;
        txn.commit().map_err(Error::from)
    }

    pub fn begin_ro(&self) -> Result<lmdb::RoTransaction> {
        self.inner.begin_ro_txn().map_err(Error::from)
    }

    pub fn begin_rw(&self) -> Result<lmdb::RwTransaction> {
        self.inner.begin_rw_txn().map_err(Error::from)
    }

    pub fn stat_entries(&self, db: lmdb::Database) -> Result<usize> {
        let txn = self.begin_ro()?;
        let mut cursor = err_at!(IoError, txn.open_ro_cursor(db))?;
        Ok(cursor.iter_start().count())
    }
}

/// Point get within an already-open transaction; callers copy the returned
/// bytes out immediately (spec.md §9 "Ownership across the storage
/// boundary" — borrowed bytes never outlive the transaction that produced
/// them once they cross this module's boundary).
pub fn get<T: Transaction>(txn: &T, db: lmdb::Database, key: &[u8]) -> Result<Option<Vec<u8>>> {
    match txn.get(db, &key) {
        Ok(bytes) => Ok(Some(bytes.to_vec())),
        Err(lmdb::Error::NotFound) => Ok(None),
        Err(err) => Err(Error::from(err)),
    }
}

pub fn put(txn: &mut lmdb::RwTransaction, db: lmdb::Database, key: &[u8], value: &[u8]) -> Result<()> {
    txn.put(db, &key, &value, lmdb::WriteFlags::empty()).map_err(Error::from)
}

/// Delete a key (non-`DUP_SORT` database, or delete every duplicate under
/// `key` in a `DUP_SORT` one).
pub fn del(txn: &mut lmdb::RwTransaction, db: lmdb::Database, key: &[u8]) -> Result<()> {
    match txn.del(db, &key, None) {
        Ok(()) => Ok(()),
        Err(lmdb::Error::NotFound) => Ok(()),
        Err(err) => Err(Error::from(err)),
    }
}

/// Delete exactly the `(key, value)` duplicate pair, leaving any other
/// value under `key` untouched (DESIGN.md Open Question #3 resolution).
pub fn del_dup(txn: &mut lmdb::RwTransaction, db: lmdb::Database, key: &[u8], value: &[u8]) -> Result<()> {
    match txn.del(db, &key, Some(value)) {
        Ok(()) => Ok(()),
        Err(lmdb::Error::NotFound) => Ok(()),
        Err(err) => Err(Error::from(err)),
    }
}

/// Every `(key, value)` pair whose key equals `key` exactly, for a
/// `DUP_SORT` database (used by `tree`'s index lookup and `query`'s
/// equality-index seek).
pub fn iter_dup_of<T: Transaction>(
    txn: &T,
    db: lmdb::Database,
    key: &[u8],
) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut cursor = err_at!(IoError, txn.open_ro_cursor(db))?;
    let mut out = Vec::new();
    for item in cursor.iter_dup_of(&key) {
        let (k, v) = err_at!(IoError, item)?;
        out.push((k.to_vec(), v.to_vec()));
    }
    Ok(out)
}

/// Every `(key, value)` pair whose key starts with `prefix`, found by
/// positioning the cursor at the first key `>= prefix` (`MDB_SET_RANGE`)
/// and walking forward (`MDB_NEXT`) while the key retains the prefix. Used
/// for compound-index *prefix* lookups (query's non-exact equality path),
/// where the wanted keys span more than one distinct stored key and
/// `iter_dup_of`'s exact `MDB_SET` positioning would miss all but the first.
pub fn iter_prefix<T: Transaction>(txn: &T, db: lmdb::Database, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut cursor = err_at!(IoError, txn.open_ro_cursor(db))?;
    let mut out = Vec::new();
    for item in cursor.iter_from(prefix) {
        let (k, v) = err_at!(IoError, item)?;
        if !k.starts_with(prefix) {
            break;
        }
        out.push((k.to_vec(), v.to_vec()));
    }
    Ok(out)
}

/// Iterate every `(key, value)` pair in a database in byte-wise key order
/// (used by `tree::populate` and the primary-scan fallback in `query`).
pub fn iter_all<T: Transaction>(txn: &T, db: lmdb::Database) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut cursor = err_at!(IoError, txn.open_ro_cursor(db))?;
    let mut out = Vec::new();
    for item in cursor.iter_start() {
        let (k, v) = err_at!(IoError, item)?;
        out.push((k.to_vec(), v.to_vec()));
    }
    Ok(out)
}
