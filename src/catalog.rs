//! Schema Catalog, spec.md §3/§4.6: a persisted per-database mapping from
//! collection name to a descriptor (creation/modification timestamps,
//! document count, index specifications, an opaque options blob), stored
//! in a reserved `schema` named database.
//!
//! Grounded on `robt::config::Stats`'s `#[derive(Cborize)]` persisted-
//! struct pattern (a flat, non-recursive metadata struct, not the ROBT
//! engine itself) and the teacher's own `util::into_cbor_bytes`/
//! `from_cbor_bytes` helpers (`examples/prataprc-rdms/src/util/mod.rs`),
//! reproduced here directly since the teacher's `util` module itself does
//! not survive this port's final trimming pass.

use cbordata::{Cbor, Cborize, FromCbor, IntoCbor};

use crate::{err_at, keycodec::Direction, keycodec::KeySpec, store, value::Document, Error, Result};

const COLLECTION_DESCRIPTOR_VER: u32 = 0x00010001;

/// One secondary index's persisted specification (spec.md §3 "Secondary
/// Index").
#[derive(Clone, Debug, Cborize)]
pub struct IndexSpecEntry {
    pub name: String,
    pub fields: Vec<(String, i32)>,
    pub unique: bool,
    pub sparse: bool,
    pub ttl_secs: Option<u64>,
}

impl IndexSpecEntry {
    const ID: u32 = COLLECTION_DESCRIPTOR_VER;

    pub fn key_spec(&self) -> KeySpec {
        KeySpec::new(
            self.fields
                .iter()
                .map(|(p, d)| (p.clone(), Direction::from_i32(*d).unwrap_or(Direction::Asc)))
                .collect(),
        )
    }
}

/// Per-collection descriptor persisted in the `schema` tree (spec.md §3
/// "Schema Catalog").
#[derive(Clone, Debug, Cborize)]
pub struct CollectionDescriptor {
    pub name: String,
    pub created_at_ms: i64,
    pub modified_at_ms: i64,
    /// Advisory document count; authoritative-ness depends on the
    /// underlying store (spec.md §3).
    pub count_hint: u64,
    pub indexes: Vec<IndexSpecEntry>,
    /// Opaque options document (capped/validator/user metadata, §3),
    /// carried as this crate's own `Document` codec bytes rather than a
    /// second CBOR encoding — see SPEC_FULL.md §4.6.
    pub options: Vec<u8>,
}

impl CollectionDescriptor {
    const ID: u32 = COLLECTION_DESCRIPTOR_VER;

    pub fn new(name: &str, now_ms: i64) -> CollectionDescriptor {
        CollectionDescriptor {
            name: name.to_string(),
            created_at_ms: now_ms,
            modified_at_ms: now_ms,
            count_hint: 0,
            indexes: Vec::new(),
            options: Document::new().to_bytes(),
        }
    }

    pub fn options_doc(&self) -> Result<Document> {
        Document::from_bytes(&self.options)
    }

    pub fn set_options_doc(&mut self, doc: &Document) {
        self.options = doc.to_bytes();
    }

    pub fn index(&self, name: &str) -> Option<&IndexSpecEntry> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

pub const SCHEMA_TREE_NAME: &str = "schema";

fn encode<T: IntoCbor>(val: T) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let cbor = err_at!(Fatal, val.into_cbor())?;
    let n = err_at!(Fatal, cbor.encode(&mut data))?;
    if n != data.len() {
        return err_at!(Fatal, msg: "cbor encoding length mismatch {} != {}", n, data.len());
    }
    Ok(data)
}

fn decode<T: FromCbor>(mut data: &[u8]) -> Result<T> {
    let (cbor, _n) = err_at!(Fatal, Cbor::decode(&mut data))?;
    err_at!(Fatal, T::from_cbor(cbor))
}

/// Read one collection's descriptor, `None` if the catalog has no entry
/// for `name`.
pub fn get<T: lmdb::Transaction>(txn: &T, schema_db: lmdb::Database, name: &str) -> Result<Option<CollectionDescriptor>> {
    match store::get(txn, schema_db, name.as_bytes())? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

pub fn put(txn: &mut lmdb::RwTransaction, schema_db: lmdb::Database, desc: &CollectionDescriptor) -> Result<()> {
    let bytes = encode(desc.clone())?;
    store::put(txn, schema_db, desc.name.as_bytes(), &bytes)
}

pub fn remove(txn: &mut lmdb::RwTransaction, schema_db: lmdb::Database, name: &str) -> Result<()> {
    store::del(txn, schema_db, name.as_bytes())
}

/// Every collection name currently in the catalog (spec.md §4.6 `list`).
pub fn list<T: lmdb::Transaction>(txn: &T, schema_db: lmdb::Database) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for (k, _v) in store::iter_all(txn, schema_db)? {
        names.push(err_at!(InvalidDocument, String::from_utf8(k))?);
    }
    Ok(names)
}
