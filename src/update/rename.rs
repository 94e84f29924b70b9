//! `$rename`: for each `(old, new)` pair where `old` exists, remove it and
//! append its value under `new`; silent no-op for a missing `old` (spec.md
//! §4.3).

use crate::{value::Document, Result};

pub fn apply(doc: &Document, param: &Document) -> Result<Document> {
    let mut out = doc.clone();
    for (old_path, new_name) in param.iter() {
        let new_path = match new_name.as_str() {
            Some(s) => s,
            None => continue, // malformed target name, treat like a no-op
        };
        if let Some(value) = out.remove_path(old_path) {
            out.set_path(new_path, value);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod rename_test {
    use super::*;
    use crate::value::Value;

    fn param(old: &str, new: &str) -> Document {
        let mut d = Document::new();
        d.set(old, Value::String(new.to_string()));
        d
    }

    #[test]
    fn test_renames_and_preserves_position() {
        let mut doc = Document::new();
        doc.set("_id", Value::Int32(1));
        doc.set("name", Value::String("x".into()));
        doc.set("n", Value::Int32(3));
        let out = apply(&doc, &param("name", "label")).unwrap();
        let names: Vec<&str> = out.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["_id", "n", "label"]);
        assert_eq!(out.get("label").unwrap().as_str(), Some("x"));
    }

    #[test]
    fn test_missing_old_is_noop() {
        let doc = Document::new();
        let out = apply(&doc, &param("missing", "target")).unwrap();
        assert!(out.is_empty());
    }
}
