//! Database handle, spec.md §6 public API: open/close/sync/resize a single
//! environment directory, plus every collection-lifecycle, CRUD, and
//! index-management entry point layered on top of `collection`/`tree`/
//! `query`.
//!
//! Grounded on `robt::Config`/`clru::lru::Config`'s `set_*`-returning-
//! `&mut Self` builder shape for [`Config`], and on the control-flow
//! description in spec.md §2 ("API call → acquire database lock → resolve
//! collection handle → begin write transaction → … → commit → release
//! lock") for every write path below.

use std::path::Path;

use log::info;

use crate::{
    collection::{self, Registry},
    err_at,
    keycodec::KeySpec,
    lock::Door,
    query,
    store::Env,
    update,
    value::{Document, ObjectId, Value},
    Error, Result,
};

const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024 * 1024; // 10 GiB, grown via resize
const DEFAULT_MAX_DBS: u32 = 1024;

/// `Database::open` options (spec.md §6), in the teacher's `set_*`-
/// returning-`&mut Self` builder shape.
#[derive(Clone, Debug)]
pub struct Config {
    map_size: usize,
    max_dbs: u32,
}

impl Config {
    pub fn new() -> Config {
        Config { map_size: DEFAULT_MAP_SIZE, max_dbs: DEFAULT_MAX_DBS }
    }

    pub fn set_map_size(&mut self, n: usize) -> &mut Self {
        self.map_size = n;
        self
    }

    pub fn set_max_dbs(&mut self, n: u32) -> &mut Self {
        self.max_dbs = n;
        self
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One open environment directory, the schema catalog tree inside it, the
/// process-local tree-handle cache, and the single writer-serializing
/// door (spec.md §4.8/§5).
pub struct Database {
    env: Env,
    schema_db: lmdb::Database,
    registry: Registry,
    door: Door,
}

impl Database {
    /// Open (creating if absent) the environment directory at `path`
    /// (spec.md §6 `Database::open`).
    pub fn open(path: &Path, config: &Config) -> Result<Database> {
        let env = Env::open(path, config.map_size, config.max_dbs)?;
        let schema_db = env.create_db(crate::catalog::SCHEMA_TREE_NAME, false)?;
        info!("opened database at {}", path.display());
        Ok(Database { env, schema_db, registry: Registry::new(), door: Door::new() })
    }

    /// Flush the environment's file buffers (spec.md §6 `sync`).
    pub fn sync(&self, force: bool) -> Result<()> {
        self.env.sync(force)
    }

    /// Grow the environment's map size, the recovery path for a
    /// `MAP_FULL` error (spec.md §6 `resize`, §7).
    pub fn resize(&mut self, new_map_size: usize) -> Result<()> {
        let _guard = self.door.acquire_write();
        self.env.resize(new_map_size)
    }

    /// Human-readable description for an [`Error::kind`] code (spec.md §6
    /// `strerror`).
    pub fn strerror(code: &str) -> &'static str {
        match code {
            "INVALID_ARGUMENT" => "caller-supplied argument is out of range or malformed",
            "NOT_FOUND" => "collection, index, or document does not exist",
            "ALREADY_EXISTS" => "collection or index already exists, or a unique key clashed on insert",
            "INDEX_CONFLICT" => "unique secondary index violated during maintenance",
            "OUT_OF_MEMORY" => "allocator or cache could not satisfy a memory request",
            "IO" => "underlying storage engine I/O failure",
            "MAP_FULL" => "underlying store capacity exhausted; call Database::resize",
            "INVALID_DOCUMENT" => "malformed document bytes or failed validation",
            "UPDATE_OPERATOR" => "unknown or misused update operator",
            "FATAL" => "internal invariant violation",
            _ => "unknown error code",
        }
    }

    /// Close this handle. The underlying environment is released when the
    /// last `Database` referencing it is dropped; exposed as an explicit
    /// method to match spec.md §6's `close()` entry point.
    pub fn close(self) -> Result<()> {
        self.env.sync(true)
    }

    fn ensure_cached<T: lmdb::Transaction>(&self, txn: &T, name: &str) -> Result<()> {
        self.registry.ensure(&self.env, txn, self.schema_db, name)
    }

    // ---- Collection lifecycle (spec.md §4.6 / §6 "Collection:") ----

    pub fn create_collection(&self, name: &str, options: Option<&Document>) -> Result<()> {
        let _guard = self.door.acquire_write();
        collection::create(&self.env, self.schema_db, &self.registry, name, options, now_ms())
    }

    pub fn drop_collection(&self, name: &str) -> Result<()> {
        let _guard = self.door.acquire_write();
        collection::drop(&self.env, self.schema_db, &self.registry, name)
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        let txn = self.env.begin_ro()?;
        collection::exists(&txn, self.schema_db, name)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let txn = self.env.begin_ro()?;
        collection::list(&txn, self.schema_db)
    }

    pub fn count(&self, coll: &str, filter: &Document) -> Result<usize> {
        let txn = self.env.begin_ro()?;
        self.ensure_cached(&txn, coll)?;
        if filter.is_empty() {
            self.registry.with(coll, |c| self.env.stat_entries(c.tree.primary_db))?
        } else {
            self.registry.with(coll, |c| query::find(&txn, c, filter).map(|v| v.len()))?
        }
    }

    pub fn metadata(&self, coll: &str) -> Result<Document> {
        let txn = self.env.begin_ro()?;
        collection::metadata(&txn, self.schema_db, coll)
    }

    pub fn set_metadata(&self, coll: &str, blob: &Document) -> Result<()> {
        let _guard = self.door.acquire_write();
        let mut txn = self.env.begin_rw()?;
        collection::set_metadata(&mut txn, self.schema_db, coll, blob, now_ms())?;
        txn.commit().map_err(Error::from)
    }

    // ---- Index lifecycle (spec.md §4.6 / §6 "Indexes:") ----

    #[allow(clippy::too_many_arguments)]
    pub fn create_index(
        &self,
        coll: &str,
        keys: KeySpec,
        name: Option<String>,
        unique: bool,
        sparse: bool,
        ttl_secs: Option<u64>,
    ) -> Result<String> {
        let _guard = self.door.acquire_write();
        collection::create_index(&self.env, self.schema_db, &self.registry, coll, keys, name, unique, sparse, ttl_secs, now_ms())
    }

    pub fn drop_index(&self, coll: &str, index_name: &str) -> Result<()> {
        let _guard = self.door.acquire_write();
        collection::drop_index(&self.env, self.schema_db, &self.registry, coll, index_name)
    }

    // ---- CRUD (spec.md §6 "CRUD:") ----

    /// Insert a new document. Every document must already carry an `_id`
    /// field (spec.md §3 "Every document must carry an `_id` field",
    /// §8 boundary behavior: "inserting a document without `_id` fails
    /// INVALID_DOCUMENT") — callers that want a fresh identity should
    /// generate one with [`ObjectId::new`] before calling this.
    pub fn insert_one(&self, coll: &str, doc: &Document) -> Result<Value> {
        let _guard = self.door.acquire_write();
        let doc = doc.clone();
        let id = doc
            .get("_id")
            .cloned()
            .ok_or_else(|| Error::InvalidDocument("document missing _id field".to_string()))?;
        let mut txn = self.env.begin_rw()?;
        self.ensure_cached(&txn, coll)?;
        self.registry.with(coll, |c| c.tree.insert(&mut txn, &doc))??;
        txn.commit()?;
        Ok(id)
    }

    pub fn find(&self, coll: &str, filter: &Document) -> Result<query::Cursor> {
        let txn = self.env.begin_ro()?;
        self.ensure_cached(&txn, coll)?;
        let docs = self.registry.with(coll, |c| query::find(&txn, c, filter))??;
        Ok(query::Cursor::new(docs))
    }

    pub fn find_one(&self, coll: &str, filter: &Document) -> Result<Option<Document>> {
        let txn = self.env.begin_ro()?;
        self.ensure_cached(&txn, coll)?;
        self.registry.with(coll, |c| query::find_one(&txn, c, filter))?
    }

    /// Apply `update` to the first document matching `filter`
    /// (spec.md §6 `update_one`).
    pub fn update_one(&self, coll: &str, filter: &Document, update_doc: &Document) -> Result<usize> {
        let _guard = self.door.acquire_write();
        let mut txn = self.env.begin_rw()?;
        self.ensure_cached(&txn, coll)?;
        let matched = self.registry.with(coll, |c| query::find(&txn, c, filter))??;
        match matched.into_iter().next() {
            Some(old_doc) => {
                let id = old_doc.get("_id").cloned().ok_or_else(|| Error::InvalidDocument("document missing _id".to_string()))?;
                let new_doc = update::apply(&old_doc, update_doc)?;
                self.registry.with(coll, |c| c.tree.update(&mut txn, &id, &new_doc))??;
                txn.commit()?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Apply `update` to every document matching `filter`, returning the
    /// modified count (spec.md §6 `update_many`).
    pub fn update_many(&self, coll: &str, filter: &Document, update_doc: &Document) -> Result<usize> {
        let _guard = self.door.acquire_write();
        let mut txn = self.env.begin_rw()?;
        self.ensure_cached(&txn, coll)?;
        let matched = self.registry.with(coll, |c| query::find(&txn, c, filter))??;
        let mut modified = 0;
        for old_doc in matched {
            let id = old_doc.get("_id").cloned().ok_or_else(|| Error::InvalidDocument("document missing _id".to_string()))?;
            let new_doc = update::apply(&old_doc, update_doc)?;
            self.registry.with(coll, |c| c.tree.update(&mut txn, &id, &new_doc))??;
            modified += 1;
        }
        txn.commit()?;
        Ok(modified)
    }

    /// Replace the first document matching `filter` wholesale, preserving
    /// its original `_id` (spec.md §6 `replace_one`).
    pub fn replace_one(&self, coll: &str, filter: &Document, replacement: &Document) -> Result<usize> {
        let _guard = self.door.acquire_write();
        let mut txn = self.env.begin_rw()?;
        self.ensure_cached(&txn, coll)?;
        let matched = self.registry.with(coll, |c| query::find(&txn, c, filter))??;
        match matched.into_iter().next() {
            Some(old_doc) => {
                let id = old_doc.get("_id").cloned().ok_or_else(|| Error::InvalidDocument("document missing _id".to_string()))?;
                let mut new_doc = replacement.clone();
                match new_doc.get("_id") {
                    Some(rid) if crate::cmp::compare(rid, &id) != std::cmp::Ordering::Equal => {
                        return err_at!(InvalidArgument, msg: "replacement _id must match the matched document's _id");
                    }
                    Some(_) => {}
                    None => new_doc.set("_id", id.clone()),
                }
                self.registry.with(coll, |c| c.tree.update(&mut txn, &id, &new_doc))??;
                txn.commit()?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    pub fn delete_one(&self, coll: &str, filter: &Document) -> Result<usize> {
        let _guard = self.door.acquire_write();
        let mut txn = self.env.begin_rw()?;
        self.ensure_cached(&txn, coll)?;
        let matched = self.registry.with(coll, |c| query::find(&txn, c, filter))??;
        match matched.into_iter().next() {
            Some(doc) => {
                let id = doc.get("_id").cloned().ok_or_else(|| Error::InvalidDocument("document missing _id".to_string()))?;
                self.registry.with(coll, |c| c.tree.delete(&mut txn, &id))??;
                txn.commit()?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    pub fn delete_many(&self, coll: &str, filter: &Document) -> Result<usize> {
        let _guard = self.door.acquire_write();
        let mut txn = self.env.begin_rw()?;
        self.ensure_cached(&txn, coll)?;
        let matched = self.registry.with(coll, |c| query::find(&txn, c, filter))??;
        let mut deleted = 0;
        for doc in matched {
            let id = doc.get("_id").cloned().ok_or_else(|| Error::InvalidDocument("document missing _id".to_string()))?;
            self.registry.with(coll, |c| c.tree.delete(&mut txn, &id))??;
            deleted += 1;
        }
        txn.commit()?;
        Ok(deleted)
    }
}
