//! `$inc`: numeric add per listed field, with standard type widening —
//! `Int32 + Int32` stays `Int32`; anything touching `Int64` widens to
//! `Int64`; anything touching `Double` widens to `Double`. A missing field
//! becomes the increment value; a non-numeric current or increment value
//! fails `UPDATE_OPERATOR` (spec.md §4.3).

use crate::{err_at, value::Value, value::Document, Result};

fn add(current: &Value, delta: &Value) -> Result<Value> {
    use Value::*;
    match (current, delta) {
        (Int32(a), Int32(b)) => Ok(Int32(a.wrapping_add(*b))),
        (Double(_), _) | (_, Double(_)) => {
            let a = current
                .as_f64()
                .ok_or_else(|| crate::Error::UpdateOperator("$inc: non-numeric current value".to_string()))?;
            let b = delta
                .as_f64()
                .ok_or_else(|| crate::Error::UpdateOperator("$inc: non-numeric increment value".to_string()))?;
            Ok(Double(a + b))
        }
        (Int64(_), _) | (_, Int64(_)) => {
            let a = current
                .as_i64()
                .ok_or_else(|| crate::Error::UpdateOperator("$inc: non-numeric current value".to_string()))?;
            let b = delta
                .as_i64()
                .ok_or_else(|| crate::Error::UpdateOperator("$inc: non-numeric increment value".to_string()))?;
            Ok(Int64(a.wrapping_add(b)))
        }
        _ => err_at!(UpdateOperator, msg: "$inc requires numeric operands, got {:?}/{:?}", current, delta),
    }
}

pub fn apply(doc: &Document, param: &Document) -> Result<Document> {
    let mut out = doc.clone();
    for (path, delta) in param.iter() {
        if !delta.is_numeric() {
            return err_at!(UpdateOperator, msg: "$inc: increment for {} is not numeric", path);
        }
        let next = match out.get_path(path) {
            Some(current) => add(current, delta)?,
            None => delta.clone(),
        };
        out.set_path(path, next);
    }
    Ok(out)
}
