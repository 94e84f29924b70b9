//! Error types returned by this crate, and the `err_at!` helper macro used
//! throughout to build them with file/line provenance.

use std::{fmt, result};

/// Result type used by every fallible operation in this crate.
pub type Result<T> = result::Result<T, Error>;

/// Error variants returned by this crate.
///
/// Every variant carries a `String` describing, with `file:line` prefix,
/// what went wrong; use `err_at!` to construct one instead of the variant
/// constructors directly.
#[derive(Clone, Eq, PartialEq)]
pub enum Error {
    /// Caller-supplied argument is out of range or malformed.
    InvalidArgument(String),
    /// Document or index entry does not exist.
    NotFound(String),
    /// Collection or index already exists.
    AlreadyExists(String),
    /// Unique secondary index violated by the write.
    IndexConflict(String),
    /// Allocator or cache could not satisfy a memory request.
    OutOfMemory(String),
    /// Underlying storage engine I/O failure.
    IoError(String),
    /// Storage engine's map-size limit was reached.
    MapFull(String),
    /// Document failed structural validation (not valid CBOR, wrong type).
    InvalidDocument(String),
    /// Update-operator application failed (bad path, type mismatch).
    UpdateOperator(String),
    /// Invariant violation; indicates a bug in this crate rather than
    /// caller misuse.
    Fatal(String),
}

impl Error {
    /// Short machine-stable name for this variant, matching the error
    /// kinds named by the persisted/wire error model.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::AlreadyExists(_) => "ALREADY_EXISTS",
            Error::IndexConflict(_) => "INDEX_CONFLICT",
            Error::OutOfMemory(_) => "OUT_OF_MEMORY",
            Error::IoError(_) => "IO",
            Error::MapFull(_) => "MAP_FULL",
            Error::InvalidDocument(_) => "INVALID_DOCUMENT",
            Error::UpdateOperator(_) => "UPDATE_OPERATOR",
            Error::Fatal(_) => "FATAL",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            Error::InvalidArgument(msg) => msg,
            Error::NotFound(msg) => msg,
            Error::AlreadyExists(msg) => msg,
            Error::IndexConflict(msg) => msg,
            Error::OutOfMemory(msg) => msg,
            Error::IoError(msg) => msg,
            Error::MapFull(msg) => msg,
            Error::InvalidDocument(msg) => msg,
            Error::UpdateOperator(msg) => msg,
            Error::Fatal(msg) => msg,
        };
        write!(f, "{}: {}", self.kind(), msg)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl std::error::Error for Error {}

impl From<lmdb::Error> for Error {
    fn from(err: lmdb::Error) -> Error {
        match err {
            lmdb::Error::MapFull => Error::MapFull(format!("lmdb: {}", err)),
            lmdb::Error::NotFound => Error::NotFound(format!("lmdb: {}", err)),
            lmdb::Error::KeyExist => Error::AlreadyExists(format!("lmdb: {}", err)),
            err => Error::IoError(format!("lmdb: {}", err)),
        }
    }
}

/// Construct an [`Error`] with `file:line` provenance, in one of two forms:
///
/// * `err_at!(Variant, result_expr)` — wraps an `Err` from `result_expr`
///   (anything implementing `Display`) into `Error::Variant`, passing
///   through the `Ok` value unchanged.
/// * `err_at!(Variant, msg: "fmt {}", args...)` — builds an
///   `Err(Error::Variant(..))` directly from a format string.
#[macro_export]
macro_rules! err_at {
    ($variant:ident, msg: $($arg:expr),+) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err($crate::Error::$variant(format!("{} {}", prefix, format!($($arg),+))))
    }};
    ($variant:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err($crate::Error::$variant(format!("{} {}", prefix, err)))
            }
        }
    }};
}
