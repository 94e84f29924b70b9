//! The self-describing value and document types every other module in this
//! crate builds on (`SPEC_FULL.md` §3).

use chrono::{DateTime, Utc};

use super::ObjectId;

/// A single BSON-like scalar, composite or sentinel value.
///
/// Numeric variants are kept distinct (`Int32`/`Int64`/`Double`) because
/// callers care about round-tripping their original width; the comparator
/// (`crate::cmp`) collapses them into one precedence class when ordering.
#[derive(Clone, Debug)]
pub enum Value {
    MinKey,
    Null,
    Int32(i32),
    Int64(i64),
    Double(f64),
    /// Decimal128, kept as its canonical decimal-string form (SPEC_FULL.md
    /// §4.1: "Decimal reduced via decimal-string round-trip").
    Decimal(String),
    String(String),
    Symbol(String),
    Document(Document),
    Array(Vec<Value>),
    /// Binary data tagged with a BSON-style sub-kind byte.
    Binary(u8, Vec<u8>),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime<Utc>),
    /// `(seconds, increment)`, both unsigned 32-bit per spec.md §3.
    Timestamp(u32, u32),
    Regex(String, String), // (pattern, options)
    MaxKey,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::Double(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Decimal(s) => s.parse::<f64>().ok().filter(|v| v.fract() == 0.0).map(|v| v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Decimal(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Symbol(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal(_)
        )
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        crate::cmp::compare(self, other) == std::cmp::Ordering::Equal
    }
}

/// An ordered sequence of `(field name, value)` pairs.
///
/// Field order is part of the document's identity (INV in `SPEC_FULL.md`
/// §3): inserting `{b: 1, a: 2}` and `{a: 2, b: 1}` yields documents that
/// compare unequal by field order even though both could express the
/// "same" logical fields, exactly mirroring the source model this crate
/// implements.
#[derive(Clone, Debug, Default)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Document {
        Document { fields: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.fields.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Insert or replace a top-level field, preserving its original
    /// position if it already existed, appending otherwise.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn push_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }

    /// Resolve a dotted path (`"a.b.c"`) against nested documents, stopping
    /// at the first `Array`/scalar that breaks the chain.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut cur = self.get(first)?;
        for seg in segments {
            cur = cur.as_document()?.get(seg)?;
        }
        Some(cur)
    }

    /// Set a dotted path, creating intermediate documents as needed.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = segments.pop().expect("path must be non-empty");
        let mut cur = self;
        for seg in segments {
            let slot = cur
                .fields
                .iter()
                .position(|(n, _)| n == seg)
                .unwrap_or_else(|| {
                    cur.fields.push((seg.to_string(), Value::Document(Document::new())));
                    cur.fields.len() - 1
                });
            cur = match &mut cur.fields[slot].1 {
                Value::Document(doc) => doc,
                slot_value => {
                    *slot_value = Value::Document(Document::new());
                    match slot_value {
                        Value::Document(doc) => doc,
                        _ => unreachable!(),
                    }
                }
            };
        }
        cur.set(last, value);
    }

    /// Remove a dotted path; returns the removed value if the path existed.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = segments.pop()?;
        let mut cur = self;
        for seg in segments {
            cur = match cur.get_mut(seg)? {
                Value::Document(doc) => doc,
                _ => return None,
            };
        }
        cur.remove(last)
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Document) -> bool {
        crate::cmp::compare_documents(self, other) == std::cmp::Ordering::Equal
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Document {
        Document {
            fields: iter.into_iter().collect(),
        }
    }
}
