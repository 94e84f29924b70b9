//! Index key extraction and memcomparable byte encoding, spec.md §4.2.
//!
//! Two distinct encodings live here:
//!
//! * [`extract_key`] builds an index key as a [`Document`] — one field per
//!   indexed path, in spec order — which is what `tree`/`query` reason
//!   about and what uniqueness/equality checks compare with [`crate::cmp`].
//! * [`encode_key_bytes`] turns that key `Document` into a byte string whose
//!   plain `memcmp` order matches [`crate::cmp::compare_documents`], since
//!   LMDB secondary trees (`SORT_SORT` duplicate trees, §4.5) order their
//!   keys with the engine's own default byte-wise comparator, not a
//!   registered callback — no custom comparator needs registering with the
//!   store as long as every key byte string is memcomparable (see
//!   DESIGN.md's Open Question #1 resolution: descending direction is
//!   folded into the encoding here, not into a second comparator).

use crate::value::{Document, Value};

/// Sort direction for one field of an index key specification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn from_i32(n: i32) -> Option<Direction> {
        match n {
            1 => Some(Direction::Asc),
            -1 => Some(Direction::Desc),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            Direction::Asc => 1,
            Direction::Desc => -1,
        }
    }
}

/// Ordered mapping from dotted field path to sort direction — an index key
/// specification (spec.md §3 "Secondary Index").
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeySpec(Vec<(String, Direction)>);

impl KeySpec {
    pub fn new(fields: Vec<(String, Direction)>) -> KeySpec {
        KeySpec(fields)
    }

    pub fn fields(&self) -> &[(String, Direction)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Default name for an index created without an explicit one:
    /// `field1_dir1_field2_dir2_…` (spec.md §4.6 `create_index`).
    pub fn default_name(&self) -> String {
        self.0
            .iter()
            .map(|(path, dir)| format!("{}_{}", path, dir.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Count of the maximal prefix of this spec whose fields all appear in
    /// `present` (spec.md §4.7 index selection).
    pub fn matching_prefix_len(&self, present: &std::collections::HashSet<String>) -> usize {
        self.0
            .iter()
            .take_while(|(path, _)| present.contains(path))
            .count()
    }
}

/// Build an index key document: one entry per path declared by `spec`, in
/// declared order, resolving dotted paths through nested documents. A
/// missing path yields an explicit `Value::Null` entry (spec.md §4.2).
pub fn extract_key(doc: &Document, spec: &KeySpec) -> Document {
    let mut key = Document::new();
    for (path, _dir) in spec.fields() {
        let v = doc.get_path(path).cloned().unwrap_or(Value::Null);
        key.push_field(path.clone(), v);
    }
    key
}

/// "At least one indexed path exists and is not Null" (spec.md Glossary,
/// "Sparseness predicate").
pub fn sparse_predicate_holds(doc: &Document, spec: &KeySpec) -> bool {
    spec.fields()
        .iter()
        .any(|(path, _)| !matches!(doc.get_path(path), None | Some(Value::Null)))
}

/// Encode a key `Document` into memcomparable bytes: fields are encoded in
/// order with no length prefixes around variable-width payloads (length
/// prefixes would not preserve byte order, e.g. `"ab"` vs `"b"`), each
/// field closed with an unescaped `0x00, 0x00` terminator so embedded
/// `0x00` bytes inside a field don't get mistaken for the terminator.
/// Descending fields have their encoded bytes bit-complemented so a single
/// ascending byte-wise compare realizes both directions.
pub fn encode_key_bytes(key: &Document, spec: &KeySpec) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, (_name, value)) in key.iter().enumerate() {
        let dir = spec.fields().get(i).map(|(_, d)| *d).unwrap_or(Direction::Asc);
        let mut field_buf = Vec::new();
        encode_value(value, &mut field_buf);
        if dir == Direction::Desc {
            for b in field_buf.iter_mut() {
                *b = !*b;
            }
        }
        out.extend_from_slice(&field_buf);
    }
    out
}

fn rank(v: &Value) -> u8 {
    match v {
        Value::MinKey => 0,
        Value::Null => 1,
        Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal(_) => 2,
        Value::String(_) | Value::Symbol(_) => 3,
        Value::Document(_) => 4,
        Value::Array(_) => 5,
        Value::Binary(..) => 6,
        Value::ObjectId(_) => 7,
        Value::Bool(_) => 8,
        Value::DateTime(_) => 9,
        Value::Timestamp(..) => 10,
        Value::Regex(..) => 11,
        Value::MaxKey => 12,
    }
}

fn encode_value(v: &Value, out: &mut Vec<u8>) {
    out.push(rank(v));
    match v {
        Value::MinKey | Value::Null | Value::MaxKey => (),
        Value::Int32(n) => encode_numeric(*n as f64, *n as i64, out),
        Value::Int64(n) => encode_numeric(*n as f64, *n, out),
        Value::Double(n) => encode_numeric(*n, n.round() as i64, out),
        Value::Decimal(s) => {
            let n = s.parse::<f64>().unwrap_or(0.0);
            encode_numeric(n, n.round() as i64, out)
        }
        Value::String(s) | Value::Symbol(s) => encode_escaped_bytes(s.as_bytes(), out),
        Value::Document(doc) => {
            for (name, val) in doc.iter() {
                encode_escaped_bytes(name.as_bytes(), out);
                encode_value(val, out);
            }
            out.extend_from_slice(&[0x00, 0x00]); // field-list terminator
        }
        Value::Array(items) => {
            for item in items {
                encode_value(item, out);
            }
            out.push(0x00);
        }
        Value::Binary(subkind, bytes) => {
            out.push(*subkind);
            encode_escaped_bytes(bytes, out);
        }
        Value::ObjectId(id) => out.extend_from_slice(id.as_bytes()),
        Value::Bool(b) => out.push(*b as u8),
        Value::DateTime(dt) => out.extend_from_slice(&order_preserving_i64(dt.timestamp_millis())),
        Value::Timestamp(secs, incr) => {
            out.extend_from_slice(&secs.to_be_bytes());
            out.extend_from_slice(&incr.to_be_bytes());
        }
        Value::Regex(pattern, opts) => {
            encode_escaped_bytes(pattern.as_bytes(), out);
            encode_escaped_bytes(opts.as_bytes(), out);
        }
    }
}

/// Order-preserving `f64` key within the fast safe range, falling back to a
/// tagged `i64` encoding outside it — mirrors `cmp::compare_numeric`'s two
/// paths so index-key order matches comparator order exactly.
fn encode_numeric(as_f64: f64, as_i64: i64, out: &mut Vec<u8>) {
    const SAFE: f64 = 9_007_199_254_740_992.0;
    if as_f64.abs() <= SAFE || as_f64.is_nan() {
        out.push(0x00);
        out.extend_from_slice(&order_preserving_f64(as_f64));
    } else {
        out.push(0x01);
        out.extend_from_slice(&order_preserving_i64(as_i64));
    }
}

/// Flip the sign bit of a positive float / invert all bits of a negative
/// float so the resulting big-endian bytes sort the same as the float
/// itself (the classic memcomparable-float trick). NaN is canonicalized to
/// sort below every other float, matching `cmp`'s "NaN sorts least" rule.
/// `-0.0` is canonicalized to `0.0` first so it encodes identically to
/// `+0.0`, matching `cmp::compare`'s "`-0 == +0`" rule (spec.md §4.1) —
/// without this, two values the comparator treats as equal would produce
/// different index-key bytes.
fn order_preserving_f64(v: f64) -> [u8; 8] {
    if v.is_nan() {
        return [0u8; 8];
    }
    let v = if v == 0.0 { 0.0 } else { v };
    let bits = v.to_bits();
    let out = if v.is_sign_negative() { !bits } else { bits | (1 << 63) };
    // shift every non-NaN value up by one to keep NaN's all-zero encoding
    // strictly least; NaN already returned above.
    (out.wrapping_add(1)).to_be_bytes()
}

fn order_preserving_i64(v: i64) -> [u8; 8] {
    ((v as u64) ^ (1u64 << 63)).to_be_bytes()
}

/// Append `bytes` followed by a `0x00,0x00` terminator, escaping any
/// embedded `0x00` byte as `0x00,0x01` so it can never be confused with the
/// terminator (standard memcomparable string encoding).
fn encode_escaped_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    for &b in bytes {
        if b == 0x00 {
            out.push(0x00);
            out.push(0x01);
        } else {
            out.push(b);
        }
    }
    out.push(0x00);
    out.push(0x00);
}

/// Encode the primary-key reference stored as a secondary index entry's
/// *value* (spec.md §4.2): the raw 12 bytes when `_id` is an `ObjectId`
/// (fast path), otherwise a minimal one-field document `{_id: <value>}`.
pub fn encode_index_value(id: &Value) -> Vec<u8> {
    match id {
        Value::ObjectId(oid) => oid.as_bytes().to_vec(),
        other => {
            let mut doc = Document::new();
            doc.push_field("_id", other.clone());
            doc.to_bytes()
        }
    }
}

/// Decode a secondary index entry's value back into the referenced `_id`,
/// attempting the 12-byte `ObjectId` fast path first (spec.md §4.2).
pub fn decode_index_value(bytes: &[u8]) -> crate::Result<Value> {
    if bytes.len() == 12 {
        let mut buf = [0u8; 12];
        buf.copy_from_slice(bytes);
        return Ok(Value::ObjectId(crate::value::ObjectId::from_bytes(buf)));
    }
    let doc = Document::from_bytes(bytes)?;
    doc.get("_id")
        .cloned()
        .ok_or_else(|| crate::Error::InvalidDocument("index value missing _id".to_string()))
}

/// Encode the primary tree key for a document's `_id` field — the bytes the
/// primary tree is keyed by (spec.md INV-1). Uses the same memcomparable
/// encoding as index keys so range scans over the primary tree are also
/// correctly ordered.
pub fn encode_primary_key(id: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value(id, &mut buf);
    buf
}

#[cfg(test)]
mod keycodec_test {
    use super::*;
    use crate::value::ObjectId;

    fn spec(fields: &[(&str, i32)]) -> KeySpec {
        KeySpec::new(
            fields
                .iter()
                .map(|(p, d)| (p.to_string(), Direction::from_i32(*d).unwrap()))
                .collect(),
        )
    }

    #[test]
    fn test_extract_key_preserves_spec_order() {
        let mut doc = Document::new();
        doc.set("b", Value::Int32(2));
        doc.set("a", Value::Int32(1));
        let spec = spec(&[("a", 1), ("b", 1)]);
        let key = extract_key(&doc, &spec);
        let names: Vec<&str> = key.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_missing_path_yields_null() {
        let doc = Document::new();
        let spec = spec(&[("missing", 1)]);
        let key = extract_key(&doc, &spec);
        assert_eq!(key.get("missing"), Some(&Value::Null));
    }

    #[test]
    fn test_sparse_predicate() {
        let spec = spec(&[("phone", 1)]);
        let mut with_phone = Document::new();
        with_phone.set("phone", Value::String("555".into()));
        assert!(sparse_predicate_holds(&with_phone, &spec));

        let mut null_phone = Document::new();
        null_phone.set("phone", Value::Null);
        assert!(!sparse_predicate_holds(&null_phone, &spec));

        let absent = Document::new();
        assert!(!sparse_predicate_holds(&absent, &spec));
    }

    #[test]
    fn test_encoded_byte_order_matches_comparator_ascending() {
        let spec = spec(&[("n", 1)]);
        let mut lo = Document::new();
        lo.push_field("n", Value::Int32(1));
        let mut hi = Document::new();
        hi.push_field("n", Value::Int32(2));
        assert!(encode_key_bytes(&lo, &spec) < encode_key_bytes(&hi, &spec));
    }

    #[test]
    fn test_encoded_byte_order_matches_comparator_descending() {
        let spec = spec(&[("n", -1)]);
        let mut lo = Document::new();
        lo.push_field("n", Value::Int32(1));
        let mut hi = Document::new();
        hi.push_field("n", Value::Int32(2));
        // descending: logically-greater value encodes to smaller bytes
        assert!(encode_key_bytes(&hi, &spec) < encode_key_bytes(&lo, &spec));
    }

    #[test]
    fn test_string_byte_order_matches_comparator() {
        let spec = spec(&[("s", 1)]);
        let mut a = Document::new();
        a.push_field("s", Value::String("ab".into()));
        let mut b = Document::new();
        b.push_field("s", Value::String("abc".into()));
        assert!(encode_key_bytes(&a, &spec) < encode_key_bytes(&b, &spec));
    }

    #[test]
    fn test_negative_numbers_order_correctly() {
        let spec = spec(&[("n", 1)]);
        let mut neg = Document::new();
        neg.push_field("n", Value::Int64(-5));
        let mut pos = Document::new();
        pos.push_field("n", Value::Int64(3));
        assert!(encode_key_bytes(&neg, &spec) < encode_key_bytes(&pos, &spec));
    }

    #[test]
    fn test_negative_zero_encodes_same_as_positive_zero() {
        let spec = spec(&[("n", 1)]);
        let mut neg_zero = Document::new();
        neg_zero.push_field("n", Value::Double(-0.0));
        let mut pos_zero = Document::new();
        pos_zero.push_field("n", Value::Double(0.0));
        assert_eq!(encode_key_bytes(&neg_zero, &spec), encode_key_bytes(&pos_zero, &spec));
    }

    #[test]
    fn test_index_value_objectid_fast_path_roundtrip() {
        let id = Value::ObjectId(ObjectId::new());
        let bytes = encode_index_value(&id);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_index_value(&bytes).unwrap(), id);
    }

    #[test]
    fn test_index_value_non_objectid_roundtrip() {
        let id = Value::String("custom-id".into());
        let bytes = encode_index_value(&id);
        assert_eq!(decode_index_value(&bytes).unwrap(), id);
    }
}
