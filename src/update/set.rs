//! `$set`: replace or append each listed field, single-pass, preserving the
//! position of every untouched field (spec.md §4.3).

use crate::{value::Document, Result};

pub fn apply(doc: &Document, param: &Document) -> Result<Document> {
    let mut out = doc.clone();
    for (path, value) in param.iter() {
        out.set_path(path, value.clone());
    }
    Ok(out)
}
