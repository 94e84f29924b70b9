//! Process-wide, reentrant-capable writer-serializing door.
//!
//! Readers never block: every read happens against an immutable snapshot
//! obtained before the door is consulted, matching the storage engine's own
//! MVCC guarantees (`spec.md` §5). Writers are serialized through this
//! single door, and a writer thread that already holds the door may
//! re-enter it (a collection operation invoking catalog maintenance under
//! the same writer, for instance) without deadlocking.
//!
//! Bit-packed layout borrowed from the latch-and-spin idiom seen in
//! `spinlock.rs`/`gate.rs`/`latch_lock.rs` in the wider tree this crate was
//! grown from, extended here with thread-local reentrancy tracking since a
//! non-reentrant door cannot support nested writer calls.

use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering::SeqCst},
    thread::{self, ThreadId},
};

/// A single process-wide writer door. One instance lives on each open
/// [`crate::db::Database`] — never as a global `static` — so independent
/// `Database` handles (as in tests) never contend on each other's locks.
pub struct Door {
    locked: AtomicBool,
    holder: AtomicU64, // hashed ThreadId of current holder, 0 == free
    depth: AtomicU64,  // reentrancy depth for current holder
    conflicts: AtomicU64,
}

fn thread_hash(id: ThreadId) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    id.hash(&mut hasher);
    let h = hasher.finish();
    if h == 0 {
        1
    } else {
        h
    }
}

impl Door {
    pub fn new() -> Door {
        Door {
            locked: AtomicBool::new(false),
            holder: AtomicU64::new(0),
            depth: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
        }
    }

    /// Acquire the writer door, spinning until it is free or already held
    /// by this thread.
    pub fn acquire_write(&self) -> Writer {
        let me = thread_hash(thread::current().id());

        if self.locked.load(SeqCst) && self.holder.load(SeqCst) == me {
            self.depth.fetch_add(1, SeqCst);
            return Writer { door: self, top: false };
        }

        loop {
            match self
                .locked
                .compare_exchange(false, true, SeqCst, SeqCst)
            {
                Ok(_) => {
                    self.holder.store(me, SeqCst);
                    self.depth.store(1, SeqCst);
                    break Writer { door: self, top: true };
                }
                Err(_) => {
                    self.conflicts.fetch_add(1, SeqCst);
                    thread::yield_now();
                }
            }
        }
    }

    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(SeqCst)
    }
}

impl Default for Door {
    fn default() -> Door {
        Door::new()
    }
}

/// RAII guard for a writer hold on [`Door`]. Releases on drop; a nested
/// (reentrant) guard only decrements the depth counter, the outermost
/// guard releases the door itself.
pub struct Writer<'a> {
    door: &'a Door,
    top: bool,
}

impl<'a> Drop for Writer<'a> {
    fn drop(&mut self) {
        if self.top {
            self.door.depth.store(0, SeqCst);
            self.door.holder.store(0, SeqCst);
            self.door.locked.store(false, SeqCst);
        } else {
            self.door.depth.fetch_sub(1, SeqCst);
        }
    }
}

#[cfg(test)]
#[path = "lock_test.rs"]
mod lock_test;
