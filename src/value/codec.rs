//! Self-describing binary codec for [`Value`]/[`Document`].
//!
//! Every value is written as a one-byte tag followed by its payload; a
//! `Document` is a `u32` field count followed by `(name, value)` pairs in
//! insertion order, so decoding never needs to sort or rehash — field
//! order round-trips exactly, matching the field-order-is-identity
//! invariant in [`Document`](super::Document).

use std::convert::TryInto;

use crate::{err_at, Error, Result};

use super::{Document, ObjectId, Value};

const TAG_MIN_KEY: u8 = 0x00;
const TAG_NULL: u8 = 0x01;
const TAG_INT32: u8 = 0x02;
const TAG_INT64: u8 = 0x03;
const TAG_DOUBLE: u8 = 0x04;
const TAG_DECIMAL: u8 = 0x05;
const TAG_STRING: u8 = 0x06;
const TAG_SYMBOL: u8 = 0x07;
const TAG_DOCUMENT: u8 = 0x08;
const TAG_ARRAY: u8 = 0x09;
const TAG_BINARY: u8 = 0x0A;
const TAG_OBJECT_ID: u8 = 0x0B;
const TAG_BOOL: u8 = 0x0C;
const TAG_DATE_TIME: u8 = 0x0D;
const TAG_TIMESTAMP: u8 = 0x0E;
const TAG_REGEX: u8 = 0x0F;
const TAG_MAX_KEY: u8 = 0x10;

fn put_len(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&(len as u32).to_be_bytes());
}

fn get_len(buf: &[u8]) -> Result<(usize, &[u8])> {
    if buf.len() < 4 {
        return err_at!(InvalidDocument, msg: "truncated length prefix");
    }
    let (head, tail) = buf.split_at(4);
    let n = u32::from_be_bytes(head.try_into().unwrap()) as usize;
    Ok((n, tail))
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_len(buf, bytes.len());
    buf.extend_from_slice(bytes);
}

fn get_bytes(buf: &[u8]) -> Result<(&[u8], &[u8])> {
    let (n, rest) = get_len(buf)?;
    if rest.len() < n {
        return err_at!(InvalidDocument, msg: "truncated byte payload");
    }
    Ok(rest.split_at(n))
}

impl Value {
    /// Encode this value, appending to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Value::MinKey => buf.push(TAG_MIN_KEY),
            Value::Null => buf.push(TAG_NULL),
            Value::Int32(v) => {
                buf.push(TAG_INT32);
                buf.extend_from_slice(&v.to_be_bytes());
            }
            Value::Int64(v) => {
                buf.push(TAG_INT64);
                buf.extend_from_slice(&v.to_be_bytes());
            }
            Value::Double(v) => {
                buf.push(TAG_DOUBLE);
                buf.extend_from_slice(&v.to_be_bytes());
            }
            Value::Decimal(s) => {
                buf.push(TAG_DECIMAL);
                put_bytes(buf, s.as_bytes());
            }
            Value::String(s) => {
                buf.push(TAG_STRING);
                put_bytes(buf, s.as_bytes());
            }
            Value::Symbol(s) => {
                buf.push(TAG_SYMBOL);
                put_bytes(buf, s.as_bytes());
            }
            Value::Document(doc) => {
                buf.push(TAG_DOCUMENT);
                doc.encode(buf);
            }
            Value::Array(items) => {
                buf.push(TAG_ARRAY);
                put_len(buf, items.len());
                for item in items {
                    item.encode(buf);
                }
            }
            Value::Binary(subkind, bytes) => {
                buf.push(TAG_BINARY);
                buf.push(*subkind);
                put_bytes(buf, bytes);
            }
            Value::ObjectId(id) => {
                buf.push(TAG_OBJECT_ID);
                buf.extend_from_slice(id.as_bytes());
            }
            Value::Bool(v) => {
                buf.push(TAG_BOOL);
                buf.push(*v as u8);
            }
            Value::DateTime(dt) => {
                buf.push(TAG_DATE_TIME);
                buf.extend_from_slice(&dt.timestamp_millis().to_be_bytes());
            }
            Value::Timestamp(secs, incr) => {
                buf.push(TAG_TIMESTAMP);
                buf.extend_from_slice(&secs.to_be_bytes());
                buf.extend_from_slice(&incr.to_be_bytes());
            }
            Value::Regex(pattern, opts) => {
                buf.push(TAG_REGEX);
                put_bytes(buf, pattern.as_bytes());
                put_bytes(buf, opts.as_bytes());
            }
            Value::MaxKey => buf.push(TAG_MAX_KEY),
        }
    }

    /// Decode a value from the front of `buf`, returning the remainder.
    pub fn decode(buf: &[u8]) -> Result<(Value, &[u8])> {
        let (tag, rest) = buf
            .split_first()
            .ok_or_else(|| Error::InvalidDocument("empty buffer".to_string()))?;
        match *tag {
            TAG_MIN_KEY => Ok((Value::MinKey, rest)),
            TAG_NULL => Ok((Value::Null, rest)),
            TAG_INT32 => {
                let (head, tail) = split_n(rest, 4)?;
                Ok((Value::Int32(i32::from_be_bytes(head.try_into().unwrap())), tail))
            }
            TAG_INT64 => {
                let (head, tail) = split_n(rest, 8)?;
                Ok((Value::Int64(i64::from_be_bytes(head.try_into().unwrap())), tail))
            }
            TAG_DOUBLE => {
                let (head, tail) = split_n(rest, 8)?;
                Ok((Value::Double(f64::from_be_bytes(head.try_into().unwrap())), tail))
            }
            TAG_DECIMAL => {
                let (bytes, tail) = get_bytes(rest)?;
                let s = err_at!(InvalidDocument, String::from_utf8(bytes.to_vec()))?;
                Ok((Value::Decimal(s), tail))
            }
            TAG_STRING => {
                let (bytes, tail) = get_bytes(rest)?;
                let s = err_at!(InvalidDocument, String::from_utf8(bytes.to_vec()))?;
                Ok((Value::String(s), tail))
            }
            TAG_SYMBOL => {
                let (bytes, tail) = get_bytes(rest)?;
                let s = err_at!(InvalidDocument, String::from_utf8(bytes.to_vec()))?;
                Ok((Value::Symbol(s), tail))
            }
            TAG_DOCUMENT => {
                let (doc, tail) = Document::decode(rest)?;
                Ok((Value::Document(doc), tail))
            }
            TAG_ARRAY => {
                let (n, mut tail) = get_len(rest)?;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    let (item, next) = Value::decode(tail)?;
                    items.push(item);
                    tail = next;
                }
                Ok((Value::Array(items), tail))
            }
            TAG_BINARY => {
                let (head, tail) = split_n(rest, 1)?;
                let subkind = head[0];
                let (bytes, tail) = get_bytes(tail)?;
                Ok((Value::Binary(subkind, bytes.to_vec()), tail))
            }
            TAG_OBJECT_ID => {
                let (head, tail) = split_n(rest, 12)?;
                Ok((Value::ObjectId(ObjectId::from_bytes(head.try_into().unwrap())), tail))
            }
            TAG_BOOL => {
                let (head, tail) = split_n(rest, 1)?;
                Ok((Value::Bool(head[0] != 0), tail))
            }
            TAG_DATE_TIME => {
                let (head, tail) = split_n(rest, 8)?;
                let millis = i64::from_be_bytes(head.try_into().unwrap());
                let dt = chrono::TimeZone::timestamp_millis_opt(&chrono::Utc, millis)
                    .single()
                    .ok_or_else(|| Error::InvalidDocument("out-of-range datetime".to_string()))?;
                Ok((Value::DateTime(dt), tail))
            }
            TAG_TIMESTAMP => {
                let (head, tail) = split_n(rest, 8)?;
                let secs = u32::from_be_bytes(head[0..4].try_into().unwrap());
                let incr = u32::from_be_bytes(head[4..8].try_into().unwrap());
                Ok((Value::Timestamp(secs, incr), tail))
            }
            TAG_REGEX => {
                let (pat_bytes, tail) = get_bytes(rest)?;
                let pattern = err_at!(InvalidDocument, String::from_utf8(pat_bytes.to_vec()))?;
                let (opt_bytes, tail) = get_bytes(tail)?;
                let opts = err_at!(InvalidDocument, String::from_utf8(opt_bytes.to_vec()))?;
                Ok((Value::Regex(pattern, opts), tail))
            }
            TAG_MAX_KEY => Ok((Value::MaxKey, rest)),
            tag => err_at!(InvalidDocument, msg: "unknown value tag {}", tag),
        }
    }
}

fn split_n(buf: &[u8], n: usize) -> Result<(&[u8], &[u8])> {
    if buf.len() < n {
        return err_at!(InvalidDocument, msg: "truncated fixed-width payload");
    }
    Ok(buf.split_at(n))
}

impl Document {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        put_len(buf, self.len());
        for (name, value) in self.iter() {
            put_bytes(buf, name.as_bytes());
            value.encode(buf);
        }
    }

    pub fn decode(buf: &[u8]) -> Result<(Document, &[u8])> {
        let (n, mut tail) = get_len(buf)?;
        let mut doc = Document::new();
        for _ in 0..n {
            let (name_bytes, next) = get_bytes(tail)?;
            let name = err_at!(InvalidDocument, String::from_utf8(name_bytes.to_vec()))?;
            let (value, next) = Value::decode(next)?;
            doc.push_field(name, value);
            tail = next;
        }
        Ok((doc, tail))
    }

    /// Encode this document to an owned byte vector; the form persisted
    /// into primary trees and used as the raw key-codec input.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    /// Decode a document previously produced by [`Document::to_bytes`].
    pub fn from_bytes(buf: &[u8]) -> Result<Document> {
        let (doc, rest) = Document::decode(buf)?;
        if !rest.is_empty() {
            return err_at!(InvalidDocument, msg: "trailing bytes after document");
        }
        Ok(doc)
    }
}
