//! Query Executor, spec.md §4.7: equality-filter evaluation, index
//! selection by maximal key-spec prefix match, and a `Cursor` over the
//! resulting documents.
//!
//! Grounded on spec.md §4.7 directly for the selection/evaluation
//! algorithm; `llrb`'s `Iter`/`Range`/`Reverse` cursor shapes
//! (`llrb/mdb.rs`) for the idiom of a cursor that owns its results rather
//! than borrowing from a transaction — DESIGN.md Open Question #4 already
//! resolved ownership across the storage boundary in favor of owned
//! values, so the cursor here is a plain `Vec`-backed iterator rather than
//! something tied to the transaction's lifetime.

use std::collections::HashSet;

use crate::{
    collection::Collection,
    cmp,
    keycodec::{self, KeySpec},
    store,
    tree::IndexHandle,
    value::{Document, Value},
    Result,
};

/// A filter is an implicit AND of per-field equality conditions (spec.md
/// §4.7). Nested `$`-prefixed operator documents are rejected by
/// [`planner_fields`] and left to [`matches`]'s fallback full-scan
/// evaluation.
pub fn planner_fields(filter: &Document) -> Option<HashSet<String>> {
    let mut fields = HashSet::new();
    for (name, value) in filter.iter() {
        if name.starts_with('$') {
            return None;
        }
        if let Value::Document(inner) = value {
            if inner.iter().any(|(k, _)| k.starts_with('$')) {
                return None;
            }
        }
        fields.insert(name.clone());
    }
    Some(fields)
}

/// Whether `doc` satisfies every condition in `filter` (equality on every
/// named field, dotted paths included).
pub fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(name, expected)| match doc.get_path(name) {
        Some(actual) => cmp::compare(actual, expected) == std::cmp::Ordering::Equal,
        None => matches!(expected, Value::Null),
    })
}

/// Pick the secondary index with the largest matching prefix of equality
/// fields, ties broken by definition order (spec.md §4.7 "Index
/// selection"). Returns `None` when no index has a nonzero-length match,
/// meaning the caller should fall back to a primary scan.
pub fn choose_index<'a>(indexes: &'a [IndexHandle], equality_fields: &HashSet<String>) -> Option<&'a IndexHandle> {
    indexes
        .iter()
        .map(|idx| (idx, idx.spec.matching_prefix_len(equality_fields)))
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(idx, _)| idx)
}

/// Build the secondary-index lookup key from `filter` restricted to the
/// chosen index's key spec (spec.md §4.7 "Index lookup").
fn lookup_key(filter: &Document, spec: &KeySpec) -> Document {
    keycodec::extract_key(filter, spec)
}

/// Fetch every `(index key, primary key)` pair that matches `filter` through
/// `idx`, whether `equality_fields` cover the index's full key spec (an
/// exact stored key, reached with a dup-key lookup) or only a leading
/// prefix of it (no single stored key to seek to; reached with a
/// prefix range scan over the matched fields alone).
fn scan_index<T: lmdb::Transaction>(
    txn: &T,
    idx: &IndexHandle,
    filter: &Document,
    matching_prefix_len: usize,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    if matching_prefix_len == idx.spec.fields().len() {
        let key_doc = lookup_key(filter, &idx.spec);
        let key_bytes = keycodec::encode_key_bytes(&key_doc, &idx.spec);
        store::iter_dup_of(txn, idx.db, &key_bytes)
    } else {
        let prefix_spec = KeySpec::new(idx.spec.fields()[..matching_prefix_len].to_vec());
        let key_doc = lookup_key(filter, &prefix_spec);
        let prefix_bytes = keycodec::encode_key_bytes(&key_doc, &prefix_spec);
        store::iter_prefix(txn, idx.db, &prefix_bytes)
    }
}

/// Run `filter` against `collection`, returning every matching document in
/// whatever order the chosen access path yields them (no sort stage — out
/// of scope per spec.md Non-goals beyond single-index prefix equality).
pub fn find<T: lmdb::Transaction>(txn: &T, collection: &Collection, filter: &Document) -> Result<Vec<Document>> {
    // `_id` always has a point-lookup path through the primary tree itself
    // (spec.md §4.7 "excluding `_id`" from the secondary-index field set),
    // so an equality filter on it skips index selection entirely.
    if let Some(id) = filter.get("_id") {
        let pkey = keycodec::encode_primary_key(id);
        return Ok(match store::get(txn, collection.tree.primary_db, &pkey)? {
            Some(bytes) => {
                let doc = Document::from_bytes(&bytes)?;
                if matches(&doc, filter) {
                    vec![doc]
                } else {
                    Vec::new()
                }
            }
            None => Vec::new(),
        });
    }

    let equality_fields = planner_fields(filter);

    let chosen = equality_fields
        .as_ref()
        .and_then(|fields| choose_index(&collection.tree.indexes, fields));

    let mut out = Vec::new();
    match chosen {
        Some(idx) => {
            let matching_prefix_len = equality_fields
                .as_ref()
                .map(|fields| idx.spec.matching_prefix_len(fields))
                .unwrap_or(0);
            for (_k, v) in scan_index(txn, idx, filter, matching_prefix_len)? {
                let id = keycodec::decode_index_value(&v)?;
                let pkey = keycodec::encode_primary_key(&id);
                if let Some(bytes) = store::get(txn, collection.tree.primary_db, &pkey)? {
                    let doc = Document::from_bytes(&bytes)?;
                    if matches(&doc, filter) {
                        out.push(doc);
                    }
                }
            }
        }
        None => {
            for (_k, v) in store::iter_all(txn, collection.tree.primary_db)? {
                let doc = Document::from_bytes(&v)?;
                if matches(&doc, filter) {
                    out.push(doc);
                }
            }
        }
    }
    Ok(out)
}

pub fn find_one<T: lmdb::Transaction>(txn: &T, collection: &Collection, filter: &Document) -> Result<Option<Document>> {
    Ok(find(txn, collection, filter)?.into_iter().next())
}

/// An owned, already-materialized result set (DESIGN.md Open Question #4:
/// ownership never ties back to the transaction that produced it).
pub struct Cursor {
    items: std::vec::IntoIter<Document>,
}

impl Cursor {
    pub fn new(items: Vec<Document>) -> Cursor {
        Cursor { items: items.into_iter() }
    }

    pub fn next(&mut self) -> Option<Document> {
        self.items.next()
    }

    /// Drop the remaining results (spec.md §6 `Cursor::destroy`); a no-op
    /// beyond dropping, since the cursor holds no transaction or engine
    /// resource once `find` has materialized its results.
    pub fn destroy(self) {}
}

impl Iterator for Cursor {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        self.items.next()
    }
}
