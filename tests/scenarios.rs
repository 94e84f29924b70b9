//! Crate-level integration tests for the six end-to-end scenarios in
//! spec.md §8, driven entirely through the public `colldb::Database` API
//! rather than internal module functions.

use colldb::keycodec::{Direction, KeySpec};
use colldb::{Config, Database, Document, ObjectId, Value};

fn open_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new();
    config.set_map_size(16 * 1024 * 1024).set_max_dbs(16);
    let db = Database::open(dir.path(), &config).unwrap();
    (dir, db)
}

fn doc_with_id(id: ObjectId, fields: &[(&str, Value)]) -> Document {
    let mut d = Document::new();
    d.push_field("_id", Value::ObjectId(id));
    for (name, value) in fields {
        d.push_field(*name, value.clone());
    }
    d
}

fn filter(name: &str, value: Value) -> Document {
    let mut f = Document::new();
    f.push_field(name, value);
    f
}

#[test]
fn scenario_1_insert_and_find_by_unique_index() {
    let (_dir, db) = open_db();
    db.create_collection("users", None).unwrap();
    let keys = KeySpec::new(vec![("email".to_string(), Direction::Asc)]);
    db.create_index("users", keys, Some("email_1".to_string()), true, false, None).unwrap();

    let a = doc_with_id(ObjectId::new(), &[("email", Value::String("a@x".to_string())), ("name", Value::String("A".to_string()))]);
    let b = doc_with_id(ObjectId::new(), &[("email", Value::String("b@x".to_string())), ("name", Value::String("B".to_string()))]);
    db.insert_one("users", &a).unwrap();
    db.insert_one("users", &b).unwrap();

    let c = doc_with_id(ObjectId::new(), &[("email", Value::String("a@x".to_string())), ("name", Value::String("C".to_string()))]);
    let err = db.insert_one("users", &c).unwrap_err();
    assert_eq!(err.kind(), "INDEX_CONFLICT");

    let found = db.find_one("users", &filter("email", Value::String("b@x".to_string()))).unwrap().unwrap();
    assert_eq!(found.get("name").unwrap().as_str(), Some("B"));
}

#[test]
fn scenario_2_compound_index_prefix_match() {
    let (_dir, db) = open_db();
    db.create_collection("people", None).unwrap();
    let keys = KeySpec::new(vec![
        ("lastName".to_string(), Direction::Asc),
        ("firstName".to_string(), Direction::Asc),
    ]);
    db.create_index("people", keys, Some("lastName_1_firstName_1".to_string()), false, false, None).unwrap();

    let doe_john = doc_with_id(
        ObjectId::new(),
        &[("lastName", Value::String("Doe".to_string())), ("firstName", Value::String("John".to_string()))],
    );
    let doe_jane = doc_with_id(
        ObjectId::new(),
        &[("lastName", Value::String("Doe".to_string())), ("firstName", Value::String("Jane".to_string()))],
    );
    let roe_roy = doc_with_id(
        ObjectId::new(),
        &[("lastName", Value::String("Roe".to_string())), ("firstName", Value::String("Roy".to_string()))],
    );
    db.insert_one("people", &doe_john).unwrap();
    db.insert_one("people", &doe_jane).unwrap();
    db.insert_one("people", &roe_roy).unwrap();

    let mut compound_filter = Document::new();
    compound_filter.push_field("lastName", Value::String("Doe".to_string()));
    compound_filter.push_field("firstName", Value::String("Jane".to_string()));
    let exact: Vec<Document> = db.find("people", &compound_filter).unwrap().collect();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].get("firstName").unwrap().as_str(), Some("Jane"));

    let last_only = db.find("people", &filter("lastName", Value::String("Doe".to_string()))).unwrap();
    let last_only: Vec<Document> = last_only.collect();
    assert_eq!(last_only.len(), 2);

    // no index covers `firstName` alone; falls back to a primary scan and
    // still finds the match.
    let first_only = db.find_one("people", &filter("firstName", Value::String("Jane".to_string()))).unwrap().unwrap();
    assert_eq!(first_only.get("lastName").unwrap().as_str(), Some("Doe"));
}

#[test]
fn scenario_3_sparse_index_excludes_nulls_and_absent() {
    let (_dir, db) = open_db();
    db.create_collection("contacts", None).unwrap();
    let keys = KeySpec::new(vec![("phone".to_string(), Direction::Asc)]);
    db.create_index("contacts", keys, Some("phone_1".to_string()), false, true, None).unwrap();

    let with_phone = doc_with_id(ObjectId::new(), &[("phone", Value::String("555".to_string()))]);
    let null_phone = doc_with_id(ObjectId::new(), &[("phone", Value::Null)]);
    let no_phone = doc_with_id(ObjectId::new(), &[]);
    db.insert_one("contacts", &with_phone).unwrap();
    db.insert_one("contacts", &null_phone).unwrap();
    db.insert_one("contacts", &no_phone).unwrap();

    // every document is still reachable through a primary scan...
    assert_eq!(db.count("contacts", &Document::new()).unwrap(), 3);
    // ...but the sparse index only represents the one with a real phone.
    let found = db.find("contacts", &filter("phone", Value::String("555".to_string()))).unwrap();
    assert_eq!(found.count(), 1);
}

#[test]
fn scenario_4_update_operator_composition() {
    let (_dir, db) = open_db();
    db.create_collection("docs", None).unwrap();
    let id = ObjectId::new();
    let doc = doc_with_id(
        id,
        &[
            ("n", Value::Int32(1)),
            ("a", Value::Array(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)])),
            ("name", Value::String("x".to_string())),
        ],
    );
    db.insert_one("docs", &doc).unwrap();

    let mut inc = Document::new();
    inc.push_field("n", Value::Int32(2));
    let mut pull = Document::new();
    pull.push_field("a", Value::Int32(2));
    let mut rename = Document::new();
    rename.push_field("name", Value::String("label".to_string()));
    let mut update = Document::new();
    update.push_field("$inc", Value::Document(inc));
    update.push_field("$pull", Value::Document(pull));
    update.push_field("$rename", Value::Document(rename));

    let modified = db.update_one("docs", &filter("_id", Value::ObjectId(id)), &update).unwrap();
    assert_eq!(modified, 1);

    let result = db.find_one("docs", &filter("_id", Value::ObjectId(id))).unwrap().unwrap();
    let names: Vec<&str> = result.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["_id", "n", "a", "label"]);
    assert_eq!(result.get("n").unwrap().as_i64(), Some(3));
    assert_eq!(result.get("label").unwrap().as_str(), Some("x"));
}

#[test]
fn scenario_5_atomicity_under_index_conflict() {
    let (_dir, db) = open_db();
    db.create_collection("users", None).unwrap();
    let keys = KeySpec::new(vec![("email".to_string(), Direction::Asc)]);
    db.create_index("users", keys, Some("email_1".to_string()), true, false, None).unwrap();

    let a = doc_with_id(ObjectId::new(), &[("email", Value::String("a".to_string()))]);
    let b = doc_with_id(ObjectId::new(), &[("email", Value::String("b".to_string()))]);
    db.insert_one("users", &a).unwrap();
    db.insert_one("users", &b).unwrap();

    let mut set_email = Document::new();
    set_email.push_field("email", Value::String("b".to_string()));
    let mut update = Document::new();
    update.push_field("$set", Value::Document(set_email));

    let err = db.update_one("users", &filter("email", Value::String("a".to_string())), &update).unwrap_err();
    assert_eq!(err.kind(), "INDEX_CONFLICT");

    // state is byte-identical to before the failed call.
    let untouched = db.find_one("users", &filter("email", Value::String("a".to_string()))).unwrap().unwrap();
    assert_eq!(untouched.get("email").unwrap().as_str(), Some("a"));
    let still_b = db.find_one("users", &filter("email", Value::String("b".to_string()))).unwrap().unwrap();
    assert_eq!(still_b.get("email").unwrap().as_str(), Some("b"));
}

#[test]
fn boundary_insert_without_id_fails_invalid_document() {
    let (_dir, db) = open_db();
    db.create_collection("docs", None).unwrap();
    let mut doc = Document::new();
    doc.push_field("x", Value::Int32(1));
    let err = db.insert_one("docs", &doc).unwrap_err();
    assert_eq!(err.kind(), "INVALID_DOCUMENT");
}

#[test]
fn boundary_drop_id_index_fails_invalid_argument() {
    let (_dir, db) = open_db();
    db.create_collection("docs", None).unwrap();
    let err = db.drop_index("docs", "_id_").unwrap_err();
    assert_eq!(err.kind(), "INVALID_ARGUMENT");
}

#[test]
fn boundary_recreate_index_with_same_spec_fails_exists() {
    let (_dir, db) = open_db();
    db.create_collection("docs", None).unwrap();
    let keys = KeySpec::new(vec![("a".to_string(), Direction::Asc)]);
    db.create_index("docs", keys.clone(), Some("a_1".to_string()), false, false, None).unwrap();
    let err = db.create_index("docs", keys, Some("a_1".to_string()), false, false, None).unwrap_err();
    assert_eq!(err.kind(), "ALREADY_EXISTS");
}
