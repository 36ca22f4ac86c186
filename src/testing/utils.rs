use crate::error::TransportError;
use crate::network::client::SnapshotFetcher;
use crate::ring::{KeyHasher, RingSnapshot, XxHash64Hasher};
use crate::types::{ProtocolVersion, RingPosition};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

/// Hasher with hand-picked positions for chosen keys; every other key falls
/// back to xxHash64.
#[derive(Debug, Clone, Default)]
pub struct FixedHasher {
    positions: HashMap<Vec<u8>, RingPosition>,
    fallback: XxHash64Hasher,
}

impl FixedHasher {
    pub fn new<K: AsRef<[u8]>>(positions: impl IntoIterator<Item = (K, RingPosition)>) -> Self {
        Self {
            positions: positions
                .into_iter()
                .map(|(k, pos)| (k.as_ref().to_vec(), pos))
                .collect(),
            fallback: XxHash64Hasher::default(),
        }
    }
}

impl KeyHasher for FixedHasher {
    fn hash(&self, key: &[u8]) -> u64 {
        self.positions
            .get(key)
            .copied()
            .unwrap_or_else(|| self.fallback.hash(key))
    }
}

#[derive(Debug, Clone)]
enum Script {
    Snapshot(RingSnapshot),
    Refused,
    Malformed,
    Hanging,
}

/// In-memory fetcher answering each address from a script.
///
/// Unknown addresses behave like refused connections.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: RwLock<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(self, addr: &str, script: Script) -> Self {
        self.scripts.write().insert(addr.to_string(), script);
        self
    }

    /// Serve `snapshot` from `addr`.
    pub fn with_snapshot(self, addr: &str, snapshot: RingSnapshot) -> Self {
        self.with(addr, Script::Snapshot(snapshot))
    }

    /// Refuse connections to `addr`.
    pub fn with_refused(self, addr: &str) -> Self {
        self.with(addr, Script::Refused)
    }

    /// Answer `addr` with an undecodable frame.
    pub fn with_malformed(self, addr: &str) -> Self {
        self.with(addr, Script::Malformed)
    }

    /// Never answer `addr`.
    pub fn with_hanging(self, addr: &str) -> Self {
        self.with(addr, Script::Hanging)
    }

    /// Addresses fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    async fn fetch_snapshot(
        &self,
        addr: &str,
        _version: ProtocolVersion,
    ) -> Result<RingSnapshot, TransportError> {
        self.calls.lock().push(addr.to_string());
        let script = self.scripts.read().get(addr).cloned();
        match script {
            Some(Script::Snapshot(snapshot)) => Ok(snapshot),
            Some(Script::Malformed) => Err(TransportError::protocol(addr, "invalid magic bytes")),
            Some(Script::Hanging) => std::future::pending().await,
            Some(Script::Refused) | None => Err(TransportError::Connect {
                addr: addr.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}
