//! Update-operator engine, spec.md §4.3: pure per-operator functions plus a
//! dispatcher that applies them in the fixed order `$set → $unset → $inc →
//! $push → $pull → $rename`, matching the teacher's one-concern-per-file
//! module layout (`clru/{access,evictor,writer}.rs`).

mod inc;
mod pull;
mod push;
mod rename;
mod set;
mod unset;

use crate::{err_at, value::Document, Result};

/// "A document whose top-level field names all begin with `$`" (spec.md
/// Glossary, "Update spec"). An empty document is not an update spec — it
/// is treated as a (no-op) replacement.
pub fn is_update_spec(doc: &Document) -> bool {
    !doc.is_empty() && doc.iter().all(|(name, _)| name.starts_with('$'))
}

/// Apply every operator present in `ops`, in the fixed dispatcher order, to
/// `doc`, returning the resulting document. Unknown top-level operators
/// fail `UPDATE_OPERATOR` (spec.md §4.3).
pub fn apply(doc: &Document, ops: &Document) -> Result<Document> {
    let mut out = doc.clone();
    let known = ["$set", "$unset", "$inc", "$push", "$pull", "$rename"];
    for (name, _) in ops.iter() {
        if !known.contains(&name.as_str()) {
            return err_at!(UpdateOperator, msg: "unknown update operator {}", name);
        }
    }
    if let Some(param) = ops.get("$set").and_then(|v| v.as_document()) {
        out = set::apply(&out, param)?;
    }
    if let Some(param) = ops.get("$unset").and_then(|v| v.as_document()) {
        out = unset::apply(&out, param)?;
    }
    if let Some(param) = ops.get("$inc").and_then(|v| v.as_document()) {
        out = inc::apply(&out, param)?;
    }
    if let Some(param) = ops.get("$push").and_then(|v| v.as_document()) {
        out = push::apply(&out, param)?;
    }
    if let Some(param) = ops.get("$pull").and_then(|v| v.as_document()) {
        out = pull::apply(&out, param)?;
    }
    if let Some(param) = ops.get("$rename").and_then(|v| v.as_document()) {
        out = rename::apply(&out, param)?;
    }
    Ok(out)
}

#[cfg(test)]
mod dispatcher_test {
    use super::*;
    use crate::value::Value;

    fn doc(fields: &[(&str, Value)]) -> Document {
        fields.iter().cloned().map(|(n, v)| (n.to_string(), v)).collect()
    }

    #[test]
    fn test_is_update_spec() {
        assert!(is_update_spec(&doc(&[("$set", Value::Document(Document::new()))])));
        assert!(!is_update_spec(&doc(&[("name", Value::Int32(1))])));
        assert!(!is_update_spec(&Document::new()));
    }

    #[test]
    fn test_unknown_operator_fails() {
        let d = doc(&[("name", Value::String("x".into()))]);
        let ops = doc(&[("$bogus", Value::Document(Document::new()))]);
        assert!(apply(&d, &ops).is_err());
    }

    #[test]
    fn test_dispatch_order_set_then_unset_then_inc() {
        let d = doc(&[("n", Value::Int32(1))]);
        let mut set_param = Document::new();
        set_param.set("n", Value::Int32(10));
        let mut inc_param = Document::new();
        inc_param.set("n", Value::Int32(5));
        let mut ops = Document::new();
        ops.set("$set", Value::Document(set_param));
        ops.set("$inc", Value::Document(inc_param));
        let out = apply(&d, &ops).unwrap();
        // $set runs before $inc: result is 10 + 5, not 1 + 5 then overwritten.
        assert_eq!(out.get("n").unwrap().as_i64(), Some(15));
    }

    #[test]
    fn test_composition_matches_scenario_4() {
        let mut d = Document::new();
        d.push_field("_id", Value::Int32(1));
        d.push_field("n", Value::Int32(1));
        d.push_field("a", Value::Array(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]));
        d.push_field("name", Value::String("x".into()));

        let mut inc_param = Document::new();
        inc_param.set("n", Value::Int32(2));
        let mut pull_param = Document::new();
        pull_param.set("a", Value::Int32(2));
        let mut rename_param = Document::new();
        rename_param.set("name", Value::String("label".into()));

        let mut ops = Document::new();
        ops.set("$inc", Value::Document(inc_param));
        ops.set("$pull", Value::Document(pull_param));
        ops.set("$rename", Value::Document(rename_param));

        let out = apply(&d, &ops).unwrap();
        let names: Vec<&str> = out.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["_id", "n", "a", "label"]);
        assert_eq!(out.get("n").unwrap().as_i64(), Some(3));
        assert_eq!(
            out.get("a").unwrap().as_array().unwrap().iter().map(|v| v.as_i64().unwrap()).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(out.get("label").unwrap().as_str(), Some("x"));
    }
}
