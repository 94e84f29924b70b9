//! An embedded, indexed document-collection engine over a transactional
//! ordered key-value store.
//!
//! A [`db::Database`] owns one on-disk environment directory. Each
//! collection inside it keeps a primary tree keyed by `_id` plus zero or
//! more duplicate-sorted secondary-index trees, kept consistent inside a
//! single write transaction by the `tree` layer. The [`query`] module
//! picks the cheapest available index for an equality filter; the
//! [`update`] module applies Mongo-style `$set`/`$unset`/`$inc`/`$push`/
//! `$pull`/`$rename` operators in a fixed order; [`fxcache`] is a generic,
//! single-threaded, TTL/capacity-bounded cache callers can use alongside
//! the database for their own opaque keyed values.
//!
//! Every fallible operation returns this crate's own [`Error`]/[`Result`];
//! see `error` for the full kind taxonomy.

pub mod catalog;
pub mod cmp;
pub mod collection;
pub mod db;
mod error;
pub mod fxcache;
pub mod keycodec;
pub mod lock;
pub mod query;
mod store;
mod tree;
pub mod update;
pub mod value;

pub use db::{Config, Database};
pub use error::{Error, Result};
pub use query::Cursor;
pub use value::{Document, ObjectId, Value};
