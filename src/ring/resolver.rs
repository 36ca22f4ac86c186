//! Consistent-hash owner resolution.

use crate::ring::hasher::{KeyHasher, XxHash64Hasher};
use crate::ring::snapshot::{MemberEntry, RingSnapshot};
use std::sync::Arc;
use thiserror::Error;

/// The snapshot has no member that can own a key.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("ring has no members")]
pub struct EmptyRingError;

/// Resolves keys to their owning member under a given snapshot.
///
/// Keys are hashed with the same function the nodes used to place
/// themselves; the owner is the first ring point at or after the key's hash,
/// wrapping to the lowest point.
#[derive(Debug, Clone)]
pub struct Resolver {
    hasher: Arc<dyn KeyHasher>,
}

impl Resolver {
    /// Create a resolver using the given hash function.
    pub fn new(hasher: Arc<dyn KeyHasher>) -> Self {
        Self { hasher }
    }

    /// The hash function keys are placed with.
    pub fn hasher(&self) -> &Arc<dyn KeyHasher> {
        &self.hasher
    }

    /// Position of `key` on the ring.
    pub fn position_of(&self, key: &[u8]) -> u64 {
        self.hasher.hash(key)
    }

    /// Get the owner of `key` under `snapshot`.
    pub fn resolve<'a>(
        &self,
        snapshot: &'a RingSnapshot,
        key: &[u8],
    ) -> Result<&'a MemberEntry, EmptyRingError> {
        snapshot
            .successor(self.position_of(key))
            .ok_or(EmptyRingError)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(Arc::new(XxHash64Hasher::default()))
    }
}
