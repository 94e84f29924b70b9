//! Collection Engine, spec.md §4.6: collection lifecycle, the process-local
//! cache of opened tree/index handles, and the catalog bookkeeping that
//! lifecycle operations must keep in lock-step with the trees they
//! describe.
//!
//! Grounded on `dbs/mod.rs`'s trait seams (`Footprint`, `WalWriter`) as the
//! model for where this module draws its own boundaries, and `llrb/index.rs`'s
//! "thin public wrapper over the raw engine, cached behind a registry"
//! layering idiom — here the registry is a plain `HashMap` behind a
//! `RwLock` rather than `llrb`'s `Arc<Mutex<_>>` snapshot, since every
//! mutation already runs under [`crate::lock::Door`].

use std::collections::HashMap;
use std::sync::RwLock;

use log::{debug, warn};

use crate::{
    catalog::{self, CollectionDescriptor, IndexSpecEntry},
    err_at,
    keycodec::{Direction, KeySpec},
    store,
    tree::{IndexHandle, Tree},
    value::Document,
    Error, Result,
};

/// Name of the implicit primary-key index every collection carries; it has
/// no LMDB tree of its own, the primary tree already serves that role
/// (spec.md §4.6 "implicit `_id_` index descriptor").
pub const ID_INDEX_NAME: &str = "_id_";

fn primary_db_name(coll: &str) -> String {
    format!("col:{}", coll)
}

fn index_db_name(coll: &str, index_name: &str) -> String {
    format!("idx:{}:{}", coll, index_name)
}

fn validate_collection_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= 100
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        err_at!(InvalidArgument, msg: "collection name {:?} must be 1..100 ASCII alphanumeric/underscore/dash characters", name)
    }
}

/// One collection's opened tree plus its compiled secondary-index table —
/// spec.md §3 "Cached Tree Handle," process-local and never persisted.
pub struct Collection {
    pub name: String,
    pub tree: Tree,
}

/// Process-local cache of opened [`Collection`] handles, keyed by name.
pub struct Registry {
    inner: RwLock<HashMap<String, Collection>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry { inner: RwLock::new(HashMap::new()) }
    }

    fn invalidate(&self, name: &str) {
        self.inner.write().unwrap().remove(name);
    }

    /// Build a [`Tree`] for `name` from its catalog descriptor, opening
    /// every non-`_id_` index's named database, and cache the result.
    fn load(&self, env: &store::Env, desc: &CollectionDescriptor) -> Result<()> {
        let primary_db = env.open_db(&primary_db_name(&desc.name))?;
        let mut handles = Vec::with_capacity(desc.indexes.len());
        for spec in &desc.indexes {
            if spec.name == ID_INDEX_NAME {
                continue;
            }
            let db = env.open_db(&index_db_name(&desc.name, &spec.name))?;
            handles.push(IndexHandle {
                name: spec.name.clone(),
                spec: spec.key_spec(),
                unique: spec.unique,
                sparse: spec.sparse,
                ttl_secs: spec.ttl_secs,
                db,
            });
        }
        let tree = Tree::new(primary_db, handles);
        self.inner
            .write()
            .unwrap()
            .insert(desc.name.clone(), Collection { name: desc.name.clone(), tree });
        Ok(())
    }

    /// Ensure `name` is cached, loading it from the catalog on a cold
    /// miss (spec.md §4.6 state diagram, `open/cache` transition).
    pub fn ensure<T: lmdb::Transaction>(&self, env: &store::Env, txn: &T, schema_db: lmdb::Database, name: &str) -> Result<()> {
        if self.inner.read().unwrap().contains_key(name) {
            return Ok(());
        }
        let desc = catalog::get(txn, schema_db, name)?
            .ok_or_else(|| Error::NotFound(format!("collection {:?} does not exist", name)))?;
        self.load(env, &desc)
    }

    /// Run `f` against the cached handle for `name`, failing `NOT_FOUND`
    /// if it isn't cached (callers call [`Registry::ensure`] first).
    pub fn with<R>(&self, name: &str, f: impl FnOnce(&Collection) -> R) -> Result<R> {
        let guard = self.inner.read().unwrap();
        match guard.get(name) {
            Some(coll) => Ok(f(coll)),
            None => Err(Error::NotFound(format!("collection {:?} is not cached", name))),
        }
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}

/// Create a new collection: fail `ALREADY_EXISTS` if present, create the
/// primary tree, write a catalog entry carrying the implicit `_id_` index
/// descriptor, cache the handle (spec.md §4.6 `create`).
pub fn create(
    env: &store::Env,
    schema_db: lmdb::Database,
    registry: &Registry,
    name: &str,
    options: Option<&Document>,
    now_ms: i64,
) -> Result<()> {
    validate_collection_name(name)?;
    {
        let txn = env.begin_ro()?;
        if catalog::get(&txn, schema_db, name)?.is_some() {
            return err_at!(AlreadyExists, msg: "collection {:?} already exists", name);
        }
    }
    // `create_db` opens its own internal write transaction (`mdb_dbi_open`
    // needs one); it must run before (and never under) the write txn below,
    // since LMDB allows only one live write txn per environment.
    let primary_db = env.create_db(&primary_db_name(name), false)?;
    let _ = primary_db; // opened to force creation; handle is re-opened via the registry below

    let mut desc = CollectionDescriptor::new(name, now_ms);
    desc.indexes.push(IndexSpecEntry {
        name: ID_INDEX_NAME.to_string(),
        fields: vec![("_id".to_string(), 1)],
        unique: true,
        sparse: false,
        ttl_secs: None,
    });
    if let Some(opts) = options {
        desc.set_options_doc(opts);
    }
    let mut txn = env.begin_rw()?;
    catalog::put(&mut txn, schema_db, &desc)?;
    txn.commit()?;

    registry.load(env, &desc)?;
    debug!("created collection {:?}", name);
    Ok(())
}

/// Drop a collection: fail `NOT_FOUND` if absent, invalidate the cache,
/// delete every secondary tree and the primary tree, delete the catalog
/// entry (spec.md §4.6 `drop`).
pub fn drop(env: &store::Env, schema_db: lmdb::Database, registry: &Registry, name: &str) -> Result<()> {
    let desc = {
        let txn = env.begin_ro()?;
        catalog::get(&txn, schema_db, name)?
            .ok_or_else(|| Error::NotFound(format!("collection {:?} does not exist", name)))?
    };

    for spec in &desc.indexes {
        if spec.name == ID_INDEX_NAME {
            continue;
        }
        if let Ok(db) = env.open_db(&index_db_name(name, &spec.name)) {
            env.drop_db(db)?;
        }
    }
    let primary_db = env.open_db(&primary_db_name(name))?;
    env.drop_db(primary_db)?;

    let mut txn = env.begin_rw()?;
    catalog::remove(&mut txn, schema_db, name)?;
    txn.commit()?;

    registry.invalidate(name);
    debug!("dropped collection {:?}", name);
    Ok(())
}

pub fn exists<T: lmdb::Transaction>(txn: &T, schema_db: lmdb::Database, name: &str) -> Result<bool> {
    Ok(catalog::get(txn, schema_db, name)?.is_some())
}

pub fn list<T: lmdb::Transaction>(txn: &T, schema_db: lmdb::Database) -> Result<Vec<String>> {
    catalog::list(txn, schema_db)
}

pub fn metadata<T: lmdb::Transaction>(txn: &T, schema_db: lmdb::Database, name: &str) -> Result<Document> {
    let desc = catalog::get(txn, schema_db, name)?
        .ok_or_else(|| Error::NotFound(format!("collection {:?} does not exist", name)))?;
    desc.options_doc()
}

pub fn set_metadata(txn: &mut lmdb::RwTransaction, schema_db: lmdb::Database, name: &str, blob: &Document, now_ms: i64) -> Result<()> {
    let mut desc = catalog::get(txn, schema_db, name)?
        .ok_or_else(|| Error::NotFound(format!("collection {:?} does not exist", name)))?;
    desc.set_options_doc(blob);
    desc.modified_at_ms = now_ms;
    catalog::put(txn, schema_db, &desc)
}

/// Generate the default index name `field1_dir1_field2_dir2_…`.
fn default_index_name(spec: &KeySpec) -> String {
    spec.default_name()
}

/// Create and populate a new secondary index under one write transaction;
/// on any failure the transaction is dropped, leaving the partial tree and
/// catalog entry untouched (spec.md §4.6 `create_index`).
#[allow(clippy::too_many_arguments)]
pub fn create_index(
    env: &store::Env,
    schema_db: lmdb::Database,
    registry: &Registry,
    coll: &str,
    spec: KeySpec,
    name: Option<String>,
    unique: bool,
    sparse: bool,
    ttl_secs: Option<u64>,
    now_ms: i64,
) -> Result<String> {
    if spec.is_empty() {
        return err_at!(InvalidArgument, msg: "index key specification must be non-empty");
    }
    let index_name = name.unwrap_or_else(|| default_index_name(&spec));
    if index_name == ID_INDEX_NAME {
        return err_at!(InvalidArgument, msg: "index name {:?} is reserved", ID_INDEX_NAME);
    }

    let mut desc = {
        let txn = env.begin_ro()?;
        catalog::get(&txn, schema_db, coll)?
            .ok_or_else(|| Error::NotFound(format!("collection {:?} does not exist", coll)))?
    };
    if desc.index(&index_name).is_some() {
        return err_at!(AlreadyExists, msg: "index {:?} already exists on {:?}", index_name, coll);
    }

    let db = env.create_db(&index_db_name(coll, &index_name), true)?;
    let handle = IndexHandle {
        name: index_name.clone(),
        spec: spec.clone(),
        unique,
        sparse,
        ttl_secs,
        db,
    };
    let primary_db = env.open_db(&primary_db_name(coll))?;
    let tree = Tree::new(primary_db, vec![handle]);

    let mut txn = env.begin_rw()?;
    if let Err(err) = tree.populate(&mut txn, &tree.indexes[0]) {
        std::mem::drop(txn);
        env.drop_db(db)?;
        return Err(err);
    }

    desc.indexes.push(IndexSpecEntry {
        name: index_name.clone(),
        fields: spec.fields().iter().map(|(p, d)| (p.clone(), d.as_i32())).collect(),
        unique,
        sparse,
        ttl_secs,
    });
    desc.modified_at_ms = now_ms;
    catalog::put(&mut txn, schema_db, &desc)?;
    txn.commit()?;

    registry.invalidate(coll);
    debug!("created index {:?} on collection {:?}", index_name, coll);
    Ok(index_name)
}

/// Drop a secondary index: forbid `_id_`, remove from the catalog, delete
/// its tree (spec.md §4.6 `drop_index`).
pub fn drop_index(env: &store::Env, schema_db: lmdb::Database, registry: &Registry, coll: &str, index_name: &str) -> Result<()> {
    if index_name == ID_INDEX_NAME {
        return err_at!(InvalidArgument, msg: "index {:?} cannot be dropped", ID_INDEX_NAME);
    }
    let mut desc = {
        let txn = env.begin_ro()?;
        catalog::get(&txn, schema_db, coll)?
            .ok_or_else(|| Error::NotFound(format!("collection {:?} does not exist", coll)))?
    };
    if desc.index(index_name).is_none() {
        return err_at!(NotFound, msg: "index {:?} does not exist on {:?}", index_name, coll);
    }
    desc.indexes.retain(|i| i.name != index_name);

    let mut txn = env.begin_rw()?;
    catalog::put(&mut txn, schema_db, &desc)?;
    txn.commit()?;

    if let Ok(db) = env.open_db(&index_db_name(coll, index_name)) {
        env.drop_db(db)?;
    } else {
        warn!("index tree {:?} already absent while dropping", index_name);
    }

    registry.invalidate(coll);
    Ok(())
}
