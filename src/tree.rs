//! Tree Layer, spec.md §4.5: wraps `store` into a "tree with indexes" —
//! one primary tree plus N secondary duplicate-sorted trees, kept
//! consistent inside a single write transaction.
//!
//! Grounded on the teacher's layering of `llrb::Mdb` (raw tree) underneath
//! `llrb::Index` (its ergonomic wrapper) — the same "thin wrapper over the
//! real engine" shape, with the real engine swapped for `store`'s `lmdb`
//! wrapper. `dbs/wop.rs`'s `Write`/`Wr` enum is the model for keeping a
//! per-document set of pending index writes explicit rather than scattered
//! across call sites.

use crate::{
    err_at,
    keycodec::{self, KeySpec},
    store,
    value::{Document, Value},
    Error, Result,
};

/// A single secondary index's compiled descriptor plus its opened tree
/// handle (spec.md §3 "Cached Tree Handle" — process-local, never
/// persisted).
pub struct IndexHandle {
    pub name: String,
    pub spec: KeySpec,
    pub unique: bool,
    pub sparse: bool,
    /// TTL-seconds for expiry-style indexes — stored only, not enforced by
    /// this core (spec.md §3).
    pub ttl_secs: Option<u64>,
    pub db: lmdb::Database,
}

/// A collection's primary tree plus its compiled secondary-index table.
pub struct Tree {
    pub primary_db: lmdb::Database,
    pub indexes: Vec<IndexHandle>,
}

impl Tree {
    pub fn new(primary_db: lmdb::Database, indexes: Vec<IndexHandle>) -> Tree {
        Tree { primary_db, indexes }
    }

    fn doc_id(doc: &Document) -> Result<&Value> {
        doc.get("_id")
            .ok_or_else(|| Error::InvalidDocument("document missing _id field".to_string()))
    }

    /// Check a unique index's key does not already point at a different
    /// primary key, failing `INDEX_CONFLICT` (spec.md INV-3) if it does.
    fn check_unique<T: lmdb::Transaction>(
        txn: &T,
        idx: &IndexHandle,
        key_bytes: &[u8],
        id_bytes: &[u8],
    ) -> Result<()> {
        if !idx.unique {
            return Ok(());
        }
        for (_k, v) in store::iter_dup_of(txn, idx.db, key_bytes)? {
            if v != id_bytes {
                return err_at!(IndexConflict, msg: "unique index {} violated", idx.name);
            }
        }
        Ok(())
    }

    /// Insert a brand-new document: for each secondary index, extract the
    /// key, skip if the sparseness predicate fails, check uniqueness, write
    /// the index pair, then write the primary pair (spec.md §4.5).
    pub fn insert(&self, txn: &mut lmdb::RwTransaction, doc: &Document) -> Result<()> {
        let id = Self::doc_id(doc)?;
        let pkey = keycodec::encode_primary_key(id);
        let index_value = keycodec::encode_index_value(id);

        for idx in &self.indexes {
            if !keycodec::sparse_predicate_holds(doc, &idx.spec) && idx.sparse {
                continue;
            }
            let key_doc = keycodec::extract_key(doc, &idx.spec);
            let key_bytes = keycodec::encode_key_bytes(&key_doc, &idx.spec);
            Self::check_unique(txn, idx, &key_bytes, &index_value)?;
            store::put(txn, idx.db, &key_bytes, &index_value)?;
        }

        match txn.put(self.primary_db, &pkey, &doc.to_bytes(), lmdb::WriteFlags::NO_OVERWRITE) {
            Ok(()) => Ok(()),
            Err(lmdb::Error::KeyExist) => err_at!(AlreadyExists, msg: "document with this _id already exists"),
            Err(err) => Err(Error::from(err)),
        }
    }

    /// Replace an existing document's bytes: recompute each index's old and
    /// new key, skip when unchanged, otherwise delete the old duplicate
    /// pair and insert the new one (with a unique check), then replace the
    /// primary value (spec.md §4.5).
    pub fn update(&self, txn: &mut lmdb::RwTransaction, id: &Value, new_doc: &Document) -> Result<()> {
        let pkey = keycodec::encode_primary_key(id);
        let old_bytes = store::get(txn, self.primary_db, &pkey)?
            .ok_or_else(|| Error::NotFound("document not found for update".to_string()))?;
        let old_doc = Document::from_bytes(&old_bytes)?;
        let index_value = keycodec::encode_index_value(id);

        for idx in &self.indexes {
            let old_sparse_ok = !idx.sparse || keycodec::sparse_predicate_holds(&old_doc, &idx.spec);
            let new_sparse_ok = !idx.sparse || keycodec::sparse_predicate_holds(new_doc, &idx.spec);

            let old_key_doc = keycodec::extract_key(&old_doc, &idx.spec);
            let new_key_doc = keycodec::extract_key(new_doc, &idx.spec);
            let old_key_bytes = keycodec::encode_key_bytes(&old_key_doc, &idx.spec);
            let new_key_bytes = keycodec::encode_key_bytes(&new_key_doc, &idx.spec);

            if old_sparse_ok && new_sparse_ok && old_key_bytes == new_key_bytes {
                continue; // unchanged, nothing to maintain
            }
            if old_sparse_ok {
                store::del_dup(txn, idx.db, &old_key_bytes, &index_value)?;
            }
            if new_sparse_ok {
                Self::check_unique(txn, idx, &new_key_bytes, &index_value)?;
                store::put(txn, idx.db, &new_key_bytes, &index_value)?;
            }
        }

        store::put(txn, self.primary_db, &pkey, &new_doc.to_bytes())
    }

    /// Delete a document: delete each index pair, then the primary pair
    /// (spec.md §4.5).
    pub fn delete(&self, txn: &mut lmdb::RwTransaction, id: &Value) -> Result<()> {
        let pkey = keycodec::encode_primary_key(id);
        let old_bytes = store::get(txn, self.primary_db, &pkey)?
            .ok_or_else(|| Error::NotFound("document not found for delete".to_string()))?;
        let old_doc = Document::from_bytes(&old_bytes)?;
        let index_value = keycodec::encode_index_value(id);

        for idx in &self.indexes {
            if idx.sparse && !keycodec::sparse_predicate_holds(&old_doc, &idx.spec) {
                continue;
            }
            let key_doc = keycodec::extract_key(&old_doc, &idx.spec);
            let key_bytes = keycodec::encode_key_bytes(&key_doc, &idx.spec);
            store::del_dup(txn, idx.db, &key_bytes, &index_value)?;
        }

        store::del(txn, self.primary_db, &pkey)
    }

    /// Build one index from scratch by iterating every primary entry
    /// inside the caller's write transaction, aborting (returning an
    /// error; the caller drops the transaction) on any unique violation
    /// (spec.md §4.5 `populate`).
    pub fn populate(&self, txn: &mut lmdb::RwTransaction, idx: &IndexHandle) -> Result<()> {
        for (_pkey, doc_bytes) in store::iter_all(txn, self.primary_db)? {
            let doc = Document::from_bytes(&doc_bytes)?;
            if idx.sparse && !keycodec::sparse_predicate_holds(&doc, &idx.spec) {
                continue;
            }
            let id = Self::doc_id(&doc)?;
            let index_value = keycodec::encode_index_value(id);
            let key_doc = keycodec::extract_key(&doc, &idx.spec);
            let key_bytes = keycodec::encode_key_bytes(&key_doc, &idx.spec);
            Self::check_unique(txn, idx, &key_bytes, &index_value)?;
            store::put(txn, idx.db, &key_bytes, &index_value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tree_test {
    use super::*;
    use crate::keycodec::Direction;

    fn make_env() -> (tempfile::TempDir, store::Env) {
        let dir = tempfile::tempdir().unwrap();
        let env = store::Env::open(dir.path(), 10 * 1024 * 1024, 8).unwrap();
        (dir, env)
    }

    fn doc_with(id: i32, email: &str) -> Document {
        let mut d = Document::new();
        d.push_field("_id", Value::ObjectId(crate::value::ObjectId::new()));
        d.push_field("n", Value::Int32(id));
        d.push_field("email", Value::String(email.to_string()));
        d
    }

    #[test]
    fn test_insert_then_unique_conflict_fails() {
        let (_dir, env) = make_env();
        let primary_db = env.create_db("col:users", false).unwrap();
        let email_db = env.create_db("idx:users:email_1", true).unwrap();
        let idx = IndexHandle {
            name: "email_1".to_string(),
            spec: KeySpec::new(vec![("email".to_string(), Direction::Asc)]),
            unique: true,
            sparse: false,
            ttl_secs: None,
            db: email_db,
        };
        let tree = Tree::new(primary_db, vec![idx]);

        let mut txn = env.begin_rw().unwrap();
        let a = doc_with(1, "a@x");
        tree.insert(&mut txn, &a).unwrap();
        let b = doc_with(2, "b@x");
        tree.insert(&mut txn, &b).unwrap();
        txn.commit().unwrap();

        let mut txn = env.begin_rw().unwrap();
        let mut c = doc_with(3, "a@x");
        c.push_field("dup", Value::Bool(true));
        assert!(tree.insert(&mut txn, &c).is_err());
    }

    #[test]
    fn test_update_index_conflict_leaves_state_unchanged() {
        let (_dir, env) = make_env();
        let primary_db = env.create_db("col:users", false).unwrap();
        let email_db = env.create_db("idx:users:email_1", true).unwrap();
        let idx = IndexHandle {
            name: "email_1".to_string(),
            spec: KeySpec::new(vec![("email".to_string(), Direction::Asc)]),
            unique: true,
            sparse: false,
            ttl_secs: None,
            db: email_db,
        };
        let tree = Tree::new(primary_db, vec![idx]);

        let mut txn = env.begin_rw().unwrap();
        let a = doc_with(1, "a");
        let b = doc_with(2, "b");
        tree.insert(&mut txn, &a).unwrap();
        tree.insert(&mut txn, &b).unwrap();
        txn.commit().unwrap();

        let a_id = a.get("_id").cloned().unwrap();
        let mut a_conflict = a.clone();
        a_conflict.set("email", Value::String("b".to_string()));

        let mut txn = env.begin_rw().unwrap();
        let result = tree.update(&mut txn, &a_id, &a_conflict);
        assert!(result.is_err());
        // drop the transaction instead of committing: aborts, per INV-4.
        drop(txn);

        let txn = env.begin_ro().unwrap();
        let bytes = store::get(&txn, tree.primary_db, &keycodec::encode_primary_key(&a_id))
            .unwrap()
            .unwrap();
        let reread = Document::from_bytes(&bytes).unwrap();
        assert_eq!(reread.get("email").unwrap().as_str(), Some("a"));
    }

    #[test]
    fn test_sparse_index_excludes_null_and_absent() {
        let (_dir, env) = make_env();
        let primary_db = env.create_db("col:users", false).unwrap();
        let phone_db = env.create_db("idx:users:phone_1", true).unwrap();
        let idx = IndexHandle {
            name: "phone_1".to_string(),
            spec: KeySpec::new(vec![("phone".to_string(), Direction::Asc)]),
            unique: false,
            sparse: true,
            ttl_secs: None,
            db: phone_db,
        };
        let tree = Tree::new(primary_db, vec![idx]);

        let mut txn = env.begin_rw().unwrap();
        let mut with_phone = Document::new();
        with_phone.push_field("_id", Value::ObjectId(crate::value::ObjectId::new()));
        with_phone.push_field("phone", Value::String("555".to_string()));
        tree.insert(&mut txn, &with_phone).unwrap();

        let mut null_phone = Document::new();
        null_phone.push_field("_id", Value::ObjectId(crate::value::ObjectId::new()));
        null_phone.push_field("phone", Value::Null);
        tree.insert(&mut txn, &null_phone).unwrap();

        let mut absent = Document::new();
        absent.push_field("_id", Value::ObjectId(crate::value::ObjectId::new()));
        tree.insert(&mut txn, &absent).unwrap();
        txn.commit().unwrap();

        let txn = env.begin_ro().unwrap();
        assert_eq!(store::iter_all(&txn, phone_db).unwrap().len(), 1);
    }
}
