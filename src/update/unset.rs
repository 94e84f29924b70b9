//! `$unset`: drop each listed field, preserving the order of the rest
//! (spec.md §4.3).

use crate::{value::Document, Result};

pub fn apply(doc: &Document, param: &Document) -> Result<Document> {
    let mut out = doc.clone();
    for (path, _) in param.iter() {
        out.remove_path(path);
    }
    Ok(out)
}
