//! `$push`: append to an existing array field, or create a new
//! single-element array if the field is absent. Fails `UPDATE_OPERATOR` if
//! the field exists and is not an array (spec.md §4.3).

use crate::{err_at, value::Document, value::Value, Result};

pub fn apply(doc: &Document, param: &Document) -> Result<Document> {
    let mut out = doc.clone();
    for (path, elem) in param.iter() {
        match out.get_path(path) {
            Some(Value::Array(items)) => {
                let mut items = items.clone();
                items.push(elem.clone());
                out.set_path(path, Value::Array(items));
            }
            Some(_) => {
                return err_at!(UpdateOperator, msg: "$push: field {} is not an array", path);
            }
            None => out.set_path(path, Value::Array(vec![elem.clone()])),
        }
    }
    Ok(out)
}
