//! Fixed-width key specializations spec.md §4.4/§6 calls for: `ObjectId`
//! (12-byte) and signed 64-bit (8-byte) keyed caches. Both are thin
//! wrappers over [`super::Cache`] — the generic cache already accepts any
//! `Eq + Hash + Clone` key, these exist only to give callers the two
//! pre-specialized names the public API sketch in spec.md §6 names
//! explicitly, the same way the teacher names `llrb::Mdb`/`llrb::Index` as
//! separate types over one generic core.

use crate::value::ObjectId;
use crate::Result;

use super::{Cache, Clock, Config, OnDelete};

/// Cache keyed by the 12-byte `ObjectId` (spec.md §4.4 "fixed 12-byte key
/// (ObjectId)").
pub struct FixedCache12<V>(Cache<ObjectId, V>);

impl<V> FixedCache12<V> {
    pub fn new(config: Config) -> FixedCache12<V> {
        FixedCache12(Cache::new(config))
    }

    pub fn set_on_delete(&mut self, cb: OnDelete<ObjectId, V>) -> &mut Self {
        self.0.set_on_delete(cb);
        self
    }

    pub fn insert(&mut self, clock: &dyn Clock, key: ObjectId, value: V, byte_size: usize) -> Result<()> {
        self.0.insert(clock, key, value, byte_size)
    }

    pub fn get(&mut self, clock: &dyn Clock, key: &ObjectId) -> Option<&V> {
        self.0.get(clock, key)
    }

    pub fn delete(&mut self, clock: &dyn Clock, key: &ObjectId) -> Option<V> {
        self.0.delete(clock, key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Cache keyed by a signed 64-bit integer (spec.md §4.4 "fixed 8-byte key
/// (signed 64-bit)").
pub struct FixedCache8<V>(Cache<i64, V>);

impl<V> FixedCache8<V> {
    pub fn new(config: Config) -> FixedCache8<V> {
        FixedCache8(Cache::new(config))
    }

    pub fn set_on_delete(&mut self, cb: OnDelete<i64, V>) -> &mut Self {
        self.0.set_on_delete(cb);
        self
    }

    pub fn insert(&mut self, clock: &dyn Clock, key: i64, value: V, byte_size: usize) -> Result<()> {
        self.0.insert(clock, key, value, byte_size)
    }

    pub fn get(&mut self, clock: &dyn Clock, key: &i64) -> Option<&V> {
        self.0.get(clock, key)
    }

    pub fn delete(&mut self, clock: &dyn Clock, key: &i64) -> Option<V> {
        self.0.delete(clock, key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod fixed_test {
    use super::*;

    struct FakeClock;
    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            0
        }
    }

    #[test]
    fn test_fixed_cache8_basic_roundtrip() {
        let mut cache: FixedCache8<&str> = FixedCache8::new(Config::new());
        let clock = FakeClock;
        cache.insert(&clock, 42, "hello", 5).unwrap();
        assert_eq!(cache.get(&clock, &42), Some(&"hello"));
    }

    #[test]
    fn test_fixed_cache12_basic_roundtrip() {
        let mut cache: FixedCache12<&str> = FixedCache12::new(Config::new());
        let clock = FakeClock;
        let id = ObjectId::new();
        cache.insert(&clock, id, "doc", 3).unwrap();
        assert_eq!(cache.get(&clock, &id), Some(&"doc"));
    }
}
