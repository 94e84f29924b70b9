//! BSON-style `ObjectId`: 4-byte seconds-since-epoch, 5 random bytes, and a
//! 3-byte process-local counter, all big-endian.

use rand::RngCore;
use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering::SeqCst},
    time::{SystemTime, UNIX_EPOCH},
};

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// 12-byte globally-orderable document identifier.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generate a fresh id from the current time, process-random bytes and
    /// a monotonic counter.
    pub fn new() -> ObjectId {
        let mut buf = [0u8; 12];

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        buf[0..4].copy_from_slice(&secs.to_be_bytes());

        let mut rand_bytes = [0u8; 5];
        rand::thread_rng().fill_bytes(&mut rand_bytes);
        buf[4..9].copy_from_slice(&rand_bytes);

        let count = COUNTER.fetch_add(1, SeqCst) & 0x00FF_FFFF;
        let count_bytes = count.to_be_bytes();
        buf[9..12].copy_from_slice(&count_bytes[1..4]);

        ObjectId(buf)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> ObjectId {
        ObjectId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectId(")?;
        for b in self.0.iter() {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

impl<'a> arbitrary::Arbitrary<'a> for ObjectId {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let mut buf = [0u8; 12];
        for b in buf.iter_mut() {
            *b = u.arbitrary::<u8>()?;
        }
        Ok(ObjectId(buf))
    }
}

#[cfg(test)]
mod objectid_test {
    use super::*;

    #[test]
    fn test_monotonic_counter_wraps() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_ordering_is_byte_lexicographic() {
        let a = ObjectId::from_bytes([0; 12]);
        let mut hi = [0; 12];
        hi[0] = 1;
        let b = ObjectId::from_bytes(hi);
        assert!(a < b);
    }
}
