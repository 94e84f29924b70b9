//! Total order over [`Value`](crate::value::Value)/[`Document`](crate::value::Document),
//! matching the BSON-style type precedence in `SPEC_FULL.md` §4.1.
//!
//! Grounded on the teacher's `llrb`/`mdb` discipline of building an entire
//! tree around a caller-supplied total order and property-testing it with
//! `arbitrary`-generated values (`llrb/mdb_test.rs`); this module plays the
//! same role for `keycodec`/`tree` that a custom `Ord` plays there.

use std::cmp::Ordering;

use crate::value::{Document, Value};

/// Precedence rank of a value's type class, lowest first. Numeric variants
/// and `String`/`Symbol` each collapse into one rank regardless of which
/// concrete variant is used, per spec.md §4.1.
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

/// Compare two values under the total order described by spec.md §4.1.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (rank(a), rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::MinKey, Value::MinKey) | (Value::Null, Value::Null) | (Value::MaxKey, Value::MaxKey) => {
            Ordering::Equal
        }
        (a, b) if rank(a) == 2 => compare_numeric(a, b),
        (a, b) if rank(a) == 3 => compare_bytes(str_bytes(a), str_bytes(b)),
        (Value::Document(a), Value::Document(b)) => compare_documents(a, b),
        (Value::Array(a), Value::Array(b)) => compare_value_slices(a, b),
        (Value::Binary(ka, a), Value::Binary(kb, b)) => a
            .len()
            .cmp(&b.len())
            .then_with(|| ka.cmp(kb))
            .then_with(|| compare_bytes(a, b)),
        (Value::ObjectId(a), Value::ObjectId(b)) => a.as_bytes().cmp(b.as_bytes()),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::DateTime(a), Value::DateTime(b)) => a.timestamp_millis().cmp(&b.timestamp_millis()),
        (Value::Timestamp(sa, ia), Value::Timestamp(sb, ib)) => sa.cmp(sb).then_with(|| ia.cmp(ib)),
        (Value::Regex(pa, oa), Value::Regex(pb, ob)) => {
            compare_bytes(pa.as_bytes(), pb.as_bytes()).then_with(|| compare_bytes(oa.as_bytes(), ob.as_bytes()))
        }
        _ => unreachable!("rank() guarantees matching variants for equal ranks"),
    }
}

fn str_bytes(v: &Value) -> &[u8] {
    match v {
        Value::String(s) | Value::Symbol(s) => s.as_bytes(),
        _ => unreachable!(),
    }
}

/// Byte-wise memcmp, shorter-is-less on a common prefix tie (spec.md §4.1).
fn compare_bytes(a: &[u8], b: &[u8]) -> Ordering {
    let n = a.len().min(b.len());
    match a[..n].cmp(&b[..n]) {
        Ordering::Equal => a.len().cmp(&b.len()),
        other => other,
    }
}

/// Numeric class compare. Fast path: both operands fit in ±2^53 and are
/// finite or NaN, compare as `f64` with `-0.0 == 0.0` and NaN sorting below
/// every non-NaN (spec.md §4.1). Fallback: stable cross-type order by BSON
/// tag then raw value, used only outside that safe range.
fn compare_numeric(a: &Value, b: &Value) -> Ordering {
    const SAFE: f64 = 9_007_199_254_740_992.0; // 2^53

    let safe = |v: &Value| -> Option<f64> {
        match v {
            Value::Int32(n) => Some(*n as f64),
            Value::Int64(n) => {
                if n.unsigned_abs() as f64 <= SAFE {
                    Some(*n as f64)
                } else {
                    None
                }
            }
            Value::Double(n) => {
                if n.is_nan() || n.is_infinite() || n.abs() <= SAFE {
                    Some(*n)
                } else {
                    None
                }
            }
            Value::Decimal(_) => None,
        }
    };

    if let (Some(fa), Some(fb)) = (safe(a), safe(b)) {
        return cmp_f64(fa, fb);
    }
    fallback_numeric(a, b)
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Deterministic fallback total order, used once either operand falls
/// outside the `f64`-safe range: rank by a stable per-variant tag first
/// (so the order is reproducible across process runs, per spec.md §4.1),
/// then by the raw value within a tag.
fn fallback_numeric(a: &Value, b: &Value) -> Ordering {
    fn tag(v: &Value) -> u8 {
        match v {
            Value::Int32(_) => 0,
            Value::Int64(_) => 1,
            Value::Double(_) => 2,
            Value::Decimal(_) => 3,
        }
    }
    let (ta, tb) = (tag(a), tag(b));
    if ta != tb {
        return ta.cmp(&tb);
    }
    match (a, b) {
        (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
        (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
        (Value::Double(a), Value::Double(b)) => cmp_f64(*a, *b),
        (Value::Decimal(a), Value::Decimal(b)) => {
            // Reduce via decimal-string round-trip (spec.md §4.1); parsing
            // failures are treated as equal to the unparseable string's own
            // byte order so the comparator stays total even on garbage input.
            match (a.parse::<f64>(), b.parse::<f64>()) {
                (Ok(fa), Ok(fb)) => cmp_f64(fa, fb).then_with(|| compare_bytes(a.as_bytes(), b.as_bytes())),
                _ => compare_bytes(a.as_bytes(), b.as_bytes()),
            }
        }
        _ => unreachable!(),
    }
}

/// Walk two documents' fields pairwise (spec.md §4.1): compare field name
/// byte-wise first, then value; the document that runs out of fields first
/// is less. Arrays use the identical rule over their elements.
pub fn compare_documents(a: &Document, b: &Document) -> Ordering {
    let mut ai = a.iter();
    let mut bi = b.iter();
    loop {
        match (ai.next(), bi.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some((na, va)), Some((nb, vb))) => {
                let name_order = compare_bytes(na.as_bytes(), nb.as_bytes());
                if name_order != Ordering::Equal {
                    return name_order;
                }
                let value_order = compare(va, vb);
                if value_order != Ordering::Equal {
                    return value_order;
                }
            }
        }
    }
}

fn compare_value_slices(a: &[Value], b: &[Value]) -> Ordering {
    let mut ai = a.iter();
    let mut bi = b.iter();
    loop {
        match (ai.next(), bi.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(va), Some(vb)) => {
                let order = compare(va, vb);
                if order != Ordering::Equal {
                    return order;
                }
            }
        }
    }
}

#[cfg(test)]
mod cmp_test {
    use super::*;
    use crate::value::ObjectId;
    use arbitrary::{Arbitrary, Unstructured};
    use rand::RngCore;

    fn arbitrary_value(seed: &[u8]) -> Value {
        let mut u = Unstructured::new(seed);
        arbitrary_value_from(&mut u, 0)
    }

    // hand-rolled small generator in the teacher's own style (`arbitrary`
    // driven by hand, see `dbs/types.rs`'s `Arbitrary for Binary`) rather
    // than deriving `Arbitrary` for a type with bounded recursion.
    fn arbitrary_value_from(u: &mut Unstructured, depth: u8) -> Value {
        let choice = u.arbitrary::<u8>().unwrap_or(0) % if depth < 3 { 10 } else { 7 };
        match choice {
            0 => Value::MinKey,
            1 => Value::Null,
            2 => Value::Int32(u.arbitrary().unwrap_or(0)),
            3 => Value::Int64(u.arbitrary().unwrap_or(0)),
            4 => Value::Double(u.arbitrary::<i32>().unwrap_or(0) as f64),
            5 => Value::String(format!("s{}", u.arbitrary::<u16>().unwrap_or(0))),
            6 => Value::Bool(u.arbitrary().unwrap_or(false)),
            7 => Value::ObjectId(ObjectId::arbitrary(u).unwrap_or(ObjectId::from_bytes([0; 12]))),
            8 => Value::Document({
                let mut d = crate::value::Document::new();
                d.set("f", arbitrary_value_from(u, depth + 1));
                d
            }),
            _ => Value::Array(vec![arbitrary_value_from(u, depth + 1)]),
        }
    }

    #[test]
    fn test_antisymmetry_property() {
        for _ in 0..200 {
            let mut seed = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut seed);
            let a = arbitrary_value(&seed[0..8]);
            let b = arbitrary_value(&seed[8..16]);
            assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
        }
    }

    #[test]
    fn test_transitivity_property() {
        for _ in 0..200 {
            let mut seed = [0u8; 24];
            rand::thread_rng().fill_bytes(&mut seed);
            let a = arbitrary_value(&seed[0..8]);
            let b = arbitrary_value(&seed[8..16]);
            let c = arbitrary_value(&seed[16..24]);
            if compare(&a, &b) != Ordering::Greater && compare(&b, &c) != Ordering::Greater {
                assert_ne!(compare(&a, &c), Ordering::Greater);
            }
        }
    }

    #[test]
    fn test_precedence_ordering() {
        assert_eq!(compare(&Value::MinKey, &Value::Null), Ordering::Less);
        assert_eq!(compare(&Value::Null, &Value::Int32(-1000)), Ordering::Less);
        assert_eq!(
            compare(&Value::Int32(1), &Value::String("".to_string())),
            Ordering::Less
        );
        assert_eq!(
            compare(&Value::String("z".to_string()), &Value::Document(Document::new())),
            Ordering::Less
        );
        assert_eq!(compare(&Value::Bool(true), &Value::DateTime(chrono::Utc::now())), Ordering::Less);
        assert_eq!(compare(&Value::Regex("a".into(), "".into()), &Value::MaxKey), Ordering::Less);
    }

    #[test]
    fn test_numeric_cross_type_equal() {
        assert_eq!(compare(&Value::Int32(3), &Value::Int64(3)), Ordering::Equal);
        assert_eq!(compare(&Value::Int32(3), &Value::Double(3.0)), Ordering::Equal);
        assert_eq!(compare(&Value::Double(-0.0), &Value::Double(0.0)), Ordering::Equal);
    }

    #[test]
    fn test_nan_sorts_below_everything_and_equals_itself() {
        let nan = Value::Double(f64::NAN);
        assert_eq!(compare(&nan, &Value::Double(f64::NAN)), Ordering::Equal);
        assert_eq!(compare(&nan, &Value::Double(-1e300)), Ordering::Less);
    }

    #[test]
    fn test_string_shorter_is_less_on_prefix_tie() {
        assert_eq!(
            compare(&Value::String("ab".into()), &Value::String("abc".into())),
            Ordering::Less
        );
    }

    #[test]
    fn test_document_field_order_matters() {
        let mut a = Document::new();
        a.set("a", Value::Int32(1));
        a.set("b", Value::Int32(2));
        let mut b = Document::new();
        b.set("b", Value::Int32(2));
        b.set("a", Value::Int32(1));
        assert_ne!(compare_documents(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_empty_documents_equal() {
        assert_eq!(compare_documents(&Document::new(), &Document::new()), Ordering::Equal);
    }

    #[test]
    fn test_shorter_document_is_less() {
        let mut a = Document::new();
        a.set("a", Value::Int32(1));
        let mut b = Document::new();
        b.set("a", Value::Int32(1));
        b.set("b", Value::Int32(2));
        assert_eq!(compare_documents(&a, &b), Ordering::Less);
    }
}
