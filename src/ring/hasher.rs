//! Hash functions used to place keys (and members) on the ring.
//!
//! The resolver is only correct when it hashes keys with exactly the
//! function the member nodes used to compute their positions, so the hash
//! is a strategy object rather than a hard-coded call.

use std::fmt::Debug;
use std::hash::Hasher;
use twox_hash::{XxHash32, XxHash64};

/// Maps a byte string to a position on the ring.
pub trait KeyHasher: Send + Sync + Debug {
    /// Hash `key` to a ring position.
    fn hash(&self, key: &[u8]) -> u64;
}

/// xxHash64 over the raw key bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XxHash64Hasher {
    seed: u64,
}

impl XxHash64Hasher {
    /// Create a hasher with the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

impl KeyHasher for XxHash64Hasher {
    fn hash(&self, key: &[u8]) -> u64 {
        let mut hasher = XxHash64::with_seed(self.seed);
        hasher.write(key);
        hasher.finish()
    }
}

/// xxHash32 over the raw key bytes, widened to 64 bits.
///
/// For clusters whose nodes place themselves on a 32-bit ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XxHash32Hasher {
    seed: u32,
}

impl XxHash32Hasher {
    /// Create a hasher with the given seed.
    pub fn with_seed(seed: u32) -> Self {
        Self { seed }
    }
}

impl KeyHasher for XxHash32Hasher {
    fn hash(&self, key: &[u8]) -> u64 {
        let mut hasher = XxHash32::with_seed(self.seed);
        hasher.write(key);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xxhash64_is_stable() {
        let hasher = XxHash64Hasher::default();
        assert_eq!(hasher.hash(b"key"), hasher.hash(b"key"));
        assert_ne!(hasher.hash(b"key"), hasher.hash(b"other"));
    }

    #[test]
    fn test_seed_changes_positions() {
        let a = XxHash64Hasher::with_seed(0);
        let b = XxHash64Hasher::with_seed(7);
        assert_ne!(a.hash(b"key"), b.hash(b"key"));
    }

    #[test]
    fn test_xxhash32_fits_in_u32() {
        let hasher = XxHash32Hasher::default();
        for key in ["a", "b", "user:123", ""] {
            assert!(hasher.hash(key.as_bytes()) <= u32::MAX as u64);
        }
    }
}
