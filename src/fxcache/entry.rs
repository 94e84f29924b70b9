//! Slab-indexed intrusive doubly-linked list node — the safe-Rust
//! substitute for `clru::Access`'s raw-pointer list, since this cache runs
//! single-threaded behind the database's writer lock and needs no atomic
//! bookkeeping.

pub(super) struct Slot<K, V> {
    pub(super) key: K,
    pub(super) value: V,
    pub(super) byte_size: usize,
    pub(super) expires_at: Option<u64>,
    pub(super) prev: Option<usize>,
    pub(super) next: Option<usize>,
}
