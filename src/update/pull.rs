//! `$pull`: remove every array element equal (by [`crate::cmp`]) to the
//! parameter value, compacting indices; silent no-op if the field is
//! absent; fails `UPDATE_OPERATOR` if present and not an array (spec.md
//! §4.3).

use crate::{cmp, err_at, value::Document, value::Value, Result};

pub fn apply(doc: &Document, param: &Document) -> Result<Document> {
    let mut out = doc.clone();
    for (path, needle) in param.iter() {
        match out.get_path(path) {
            Some(Value::Array(items)) => {
                let kept: Vec<Value> = items
                    .iter()
                    .filter(|v| cmp::compare(v, needle) != std::cmp::Ordering::Equal)
                    .cloned()
                    .collect();
                out.set_path(path, Value::Array(kept));
            }
            Some(_) => {
                return err_at!(UpdateOperator, msg: "$pull: field {} is not an array", path);
            }
            None => (),
        }
    }
    Ok(out)
}
