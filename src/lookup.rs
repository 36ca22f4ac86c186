//! Lookup orchestration: fetch, cross-check, detect partitions, resolve.
//!
//! A lookup walks a fixed sequence of states:
//!
//! ```text
//! FetchCoordinator → FetchPeers → Detect → Resolve → Done
//!        │               │                    │
//!        └───────────────┴──── error ─────────┘
//! ```
//!
//! Peer fetches run concurrently once the coordinator's snapshot names the
//! peers. The whole lookup is bounded by one deadline; when it expires every
//! in-flight fetch is abandoned and no partial result is returned. A peer
//! that has not answered by its own bound is left out, unless that bound is
//! the overall deadline itself, in which case the lookup times out.

use crate::config::{ClientConfig, LookupOptions};
use crate::error::{Error, Result};
use crate::network::client::{SnapshotFetcher, TcpSnapshotClient};
use crate::partition::{detect_partitions, Observation};
use crate::ring::{Resolver, RingSnapshot};
use rand::seq::IndexedRandom;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// States of a single lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupState {
    FetchCoordinator,
    FetchPeers,
    Detect,
    Resolve,
    Done,
}

impl fmt::Display for LookupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LookupState::FetchCoordinator => "fetch_coordinator",
            LookupState::FetchPeers => "fetch_peers",
            LookupState::Detect => "detect",
            LookupState::Resolve => "resolve",
            LookupState::Done => "done",
        };
        f.write_str(s)
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    /// Address of the member owning the key under the authoritative view.
    pub destination: String,

    /// Number of distinct membership views observed. Greater than one means
    /// the cluster is partitioned and `destination` is best-effort.
    pub partition_count: usize,

    /// Address whose snapshot was used to resolve the key.
    pub authority: String,

    /// Addresses whose snapshots took part in partition detection,
    /// coordinator first.
    pub contacted: Vec<String>,

    /// Peers left out because they did not answer in time.
    pub unresponsive: Vec<String>,
}

impl LookupResult {
    /// Whether the contacted nodes disagreed about membership.
    pub fn is_partitioned(&self) -> bool {
        self.partition_count > 1
    }
}

/// Resolves keys against a live cluster.
#[derive(Clone)]
pub struct RingLookup {
    fetcher: Arc<dyn SnapshotFetcher>,
}

impl fmt::Debug for RingLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingLookup").finish_non_exhaustive()
    }
}

impl RingLookup {
    /// Create a lookup driven by the given fetcher.
    pub fn new(fetcher: Arc<dyn SnapshotFetcher>) -> Self {
        Self { fetcher }
    }

    /// Create a lookup over TCP with the given client configuration.
    pub fn with_client_config(config: ClientConfig) -> Self {
        Self::new(Arc::new(TcpSnapshotClient::new(config)))
    }

    /// Find the member owning `key`, starting from `coordinator`.
    pub async fn lookup(
        &self,
        coordinator: &str,
        key: impl AsRef<[u8]>,
        options: &LookupOptions,
    ) -> Result<LookupResult> {
        options.validate()?;

        let deadline = Instant::now() + options.timeout;
        let run = self.run(coordinator, key.as_ref(), options, deadline);
        match tokio::time::timeout_at(deadline, run).await {
            Ok(result) => result,
            Err(_) => Err(deadline_expired(coordinator, options)),
        }
    }

    async fn run(
        &self,
        coordinator: &str,
        key: &[u8],
        options: &LookupOptions,
        deadline: Instant,
    ) -> Result<LookupResult> {
        let started = Instant::now();
        let version = options.protocol_version;

        debug!(
            state = %LookupState::FetchCoordinator,
            coordinator = %coordinator,
            version = %version,
            "Lookup started"
        );
        let coordinator_snapshot = self.fetcher.fetch_snapshot(coordinator, version).await?;

        let peers = sample_peers(&coordinator_snapshot, coordinator, options.peer_sample_size);
        let mut observations = vec![Observation::new(coordinator, coordinator_snapshot)];
        let mut unresponsive = Vec::new();

        if !peers.is_empty() {
            debug!(state = %LookupState::FetchPeers, peers = ?peers, "Cross-checking membership");
            let peer_deadline = (Instant::now() + options.peer_timeout).min(deadline);
            let (fetched, timed_out) = self.fetch_peers(peers, options, peer_deadline).await?;
            // A peer wait cut short by the overall deadline ends the lookup
            // rather than excluding the peer.
            if !timed_out.is_empty() && Instant::now() >= deadline {
                return Err(deadline_expired(coordinator, options));
            }
            observations.extend(fetched);
            unresponsive = timed_out;
        }

        debug!(
            state = %LookupState::Detect,
            snapshots = observations.len(),
            "Detecting partitions"
        );
        let report = detect_partitions(&observations, coordinator)
            .ok_or_else(|| Error::Internal("no snapshots gathered".into()))?;
        if report.is_partitioned() {
            warn!(
                coordinator = %coordinator,
                partitions = report.partition_count,
                authority = %report.authoritative.source,
                "Cluster membership views disagree"
            );
        }

        debug!(
            state = %LookupState::Resolve,
            authority = %report.authoritative.source,
            "Resolving key"
        );
        let resolver = Resolver::new(options.hasher.clone());
        let owner = resolver
            .resolve(&report.authoritative.snapshot, key)
            .map_err(|_| Error::EmptyRing {
                addr: report.authoritative.source.clone(),
            })?;

        let result = LookupResult {
            destination: owner.address.clone(),
            partition_count: report.partition_count,
            authority: report.authoritative.source.clone(),
            contacted: observations.iter().map(|o| o.source.clone()).collect(),
            unresponsive,
        };

        debug!(state = %LookupState::Done, elapsed = ?started.elapsed(), "Lookup finished");
        info!(
            destination = %result.destination,
            partitions = result.partition_count,
            "Key resolved"
        );
        Ok(result)
    }

    /// Fetch every peer concurrently, waiting until `peer_deadline` at most.
    /// Returns the snapshots in sampling order and the peers that timed out.
    /// Any other fetch failure aborts.
    async fn fetch_peers(
        &self,
        peers: Vec<String>,
        options: &LookupOptions,
        peer_deadline: Instant,
    ) -> Result<(Vec<Observation>, Vec<String>)> {
        let version = options.protocol_version;
        let mut tasks = JoinSet::new();
        for (idx, peer) in peers.into_iter().enumerate() {
            let fetcher = self.fetcher.clone();
            tasks.spawn(async move {
                let result =
                    tokio::time::timeout_at(peer_deadline, fetcher.fetch_snapshot(&peer, version))
                        .await;
                (idx, peer, result)
            });
        }

        let mut fetched: Vec<(usize, Observation)> = Vec::new();
        let mut timed_out = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (idx, peer, result) =
                joined.map_err(|e| Error::Internal(format!("peer fetch task failed: {}", e)))?;
            match result {
                Ok(Ok(snapshot)) => fetched.push((idx, Observation::new(peer, snapshot))),
                Ok(Err(e)) if e.is_timeout() => {
                    warn!(peer = %peer, error = %e, "Peer did not answer, excluding it");
                    timed_out.push(peer);
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    warn!(peer = %peer, "Peer did not answer, excluding it");
                    timed_out.push(peer);
                }
            }
        }

        fetched.sort_by_key(|(idx, _)| *idx);
        timed_out.sort();
        Ok((fetched.into_iter().map(|(_, obs)| obs).collect(), timed_out))
    }
}

impl Default for RingLookup {
    fn default() -> Self {
        Self::with_client_config(ClientConfig::default())
    }
}

fn deadline_expired(coordinator: &str, options: &LookupOptions) -> Error {
    warn!(coordinator = %coordinator, timeout = ?options.timeout, "Lookup deadline expired");
    Error::Timeout {
        after: options.timeout,
    }
}

/// Pick up to `sample_size` members to cross-check, excluding the
/// coordinator and faulty members. Everyone eligible is picked when the
/// sample covers them all.
pub fn sample_peers(snapshot: &RingSnapshot, coordinator: &str, sample_size: usize) -> Vec<String> {
    if sample_size == 0 {
        return Vec::new();
    }

    let candidates: Vec<&str> = snapshot
        .members()
        .iter()
        .filter(|m| m.address != coordinator && m.status.owns_positions())
        .map(|m| m.address.as_str())
        .collect();

    if candidates.len() <= sample_size {
        return candidates.into_iter().map(String::from).collect();
    }

    candidates
        .choose_multiple(&mut rand::rng(), sample_size)
        .map(|addr| addr.to_string())
        .collect()
}

/// Look up `key` over TCP with default client settings.
pub async fn lookup(
    coordinator: &str,
    key: impl AsRef<[u8]>,
    options: &LookupOptions,
) -> Result<LookupResult> {
    RingLookup::default().lookup(coordinator, key, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ring::MemberEntry;
    use crate::testing::{FixedHasher, ScriptedFetcher};
    use crate::types::{MemberStatus, ProtocolVersion};
    use std::time::Duration;

    const COORD: &str = "10.0.0.1:3000";
    const B: &str = "10.0.0.2:3000";
    const C: &str = "10.0.0.3:3000";

    fn abc(epoch: u64) -> RingSnapshot {
        RingSnapshot::new(
            Some(epoch),
            vec![
                MemberEntry::alive(COORD, [10]),
                MemberEntry::alive(B, [50]),
                MemberEntry::alive(C, [90]),
            ],
        )
        .unwrap()
    }

    fn options(peers: usize) -> LookupOptions {
        LookupOptions::new(ProtocolVersion::V2)
            .with_peer_sample_size(peers)
            .with_hasher(Arc::new(FixedHasher::new([("x", 42), ("z", 95)])))
    }

    #[tokio::test]
    async fn test_coordinator_only() {
        let fetcher = Arc::new(ScriptedFetcher::new().with_snapshot(COORD, abc(1)));
        let lookup = RingLookup::new(fetcher.clone());

        let result = lookup.lookup(COORD, "x", &options(0)).await.unwrap();
        assert_eq!(result.destination, B);
        assert_eq!(result.partition_count, 1);
        assert_eq!(result.contacted, vec![COORD.to_string()]);
        assert_eq!(fetcher.calls(), vec![COORD.to_string()]);
    }

    #[tokio::test]
    async fn test_wraparound_through_lookup() {
        let fetcher = Arc::new(ScriptedFetcher::new().with_snapshot(COORD, abc(1)));
        let result = RingLookup::new(fetcher)
            .lookup(COORD, "z", &options(0))
            .await
            .unwrap();
        assert_eq!(result.destination, COORD);
    }

    #[tokio::test]
    async fn test_unanimous_peers() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with_snapshot(COORD, abc(4))
                .with_snapshot(B, abc(4))
                .with_snapshot(C, abc(4)),
        );
        let result = RingLookup::new(fetcher.clone())
            .lookup(COORD, "x", &options(5))
            .await
            .unwrap();

        assert_eq!(result.partition_count, 1);
        assert!(!result.is_partitioned());
        assert_eq!(result.contacted.len(), 3);
        assert_eq!(fetcher.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_partitioned_peer_prefers_coordinator_on_tie() {
        // C is faulty in the coordinator's view, so B is the only peer sampled.
        let coordinator_view = RingSnapshot::new(
            Some(1),
            vec![
                MemberEntry::alive(COORD, [10]),
                MemberEntry::alive(B, [50]),
                MemberEntry::new(C, [90], MemberStatus::Faulty),
            ],
        )
        .unwrap();
        let split = RingSnapshot::new(
            None,
            vec![MemberEntry::alive(B, [50]), MemberEntry::alive(C, [90])],
        )
        .unwrap();
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with_snapshot(COORD, coordinator_view)
                .with_snapshot(B, split),
        );

        let result = RingLookup::new(fetcher)
            .lookup(COORD, "x", &options(1))
            .await
            .unwrap();
        assert_eq!(result.partition_count, 2);
        assert_eq!(result.destination, B);
        assert_eq!(result.authority, COORD);
        assert!(result.is_partitioned());
    }

    #[tokio::test]
    async fn test_majority_view_wins() {
        let majority = RingSnapshot::new(
            Some(2),
            vec![MemberEntry::alive(B, [50]), MemberEntry::alive(C, [90])],
        )
        .unwrap();
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with_snapshot(COORD, abc(1))
                .with_snapshot(B, majority.clone())
                .with_snapshot(C, majority),
        );
        let result = RingLookup::new(fetcher)
            .lookup(COORD, "z", &options(2))
            .await
            .unwrap();
        assert_eq!(result.partition_count, 2);
        assert_eq!(result.authority, B);
        // 95 wraps to B@50 under the majority view.
        assert_eq!(result.destination, B);
    }

    #[tokio::test]
    async fn test_coordinator_failure_aborts() {
        let fetcher = Arc::new(ScriptedFetcher::new().with_refused(COORD));
        let err = RingLookup::new(fetcher)
            .lookup(COORD, "x", &options(3))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connect);
        assert_eq!(err.address(), Some(COORD));
    }

    #[tokio::test]
    async fn test_peer_protocol_error_aborts() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with_snapshot(COORD, abc(1))
                .with_snapshot(B, abc(1))
                .with_malformed(C),
        );
        let err = RingLookup::new(fetcher)
            .lookup(COORD, "x", &options(2))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.address(), Some(C));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_peer_is_excluded() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with_snapshot(COORD, abc(1))
                .with_snapshot(B, abc(1))
                .with_hanging(C),
        );
        let opts = options(2)
            .with_peer_timeout(Duration::from_millis(200))
            .with_timeout(Duration::from_secs(5));

        let started = Instant::now();
        let result = RingLookup::new(fetcher).lookup(COORD, "x", &opts).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(result.partition_count, 1);
        assert_eq!(result.unresponsive, vec![C.to_string()]);
        assert_eq!(result.contacted, vec![COORD.to_string(), B.to_string()]);
        assert_eq!(result.destination, B);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_wins_over_long_peer_timeout() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with_snapshot(COORD, abc(1))
                .with_snapshot(B, abc(1))
                .with_hanging(C),
        );
        let opts = options(2)
            .with_timeout(Duration::from_millis(300))
            .with_peer_timeout(Duration::from_secs(10));

        for _ in 0..5 {
            let err = RingLookup::new(fetcher.clone())
                .lookup(COORD, "x", &opts)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Timeout);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_deadline() {
        let fetcher = Arc::new(ScriptedFetcher::new().with_hanging(COORD));
        let opts = options(0).with_timeout(Duration::from_millis(300));

        let err = RingLookup::new(fetcher)
            .lookup(COORD, "x", &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_empty_ring() {
        let empty = RingSnapshot::new(Some(1), Vec::new()).unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new().with_snapshot(COORD, empty));
        let err = RingLookup::new(fetcher)
            .lookup(COORD, "x", &options(3))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyRing);
        assert_eq!(err.address(), Some(COORD));
    }

    #[tokio::test]
    async fn test_invalid_options() {
        let fetcher = Arc::new(ScriptedFetcher::new().with_snapshot(COORD, abc(1)));
        let opts = options(0).with_timeout(Duration::ZERO);
        let err = RingLookup::new(fetcher.clone())
            .lookup(COORD, "x", &opts)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(fetcher.calls().is_empty());
    }

    #[test]
    fn test_sample_peers() {
        let snapshot = RingSnapshot::new(
            Some(1),
            vec![
                MemberEntry::alive(COORD, [10]),
                MemberEntry::alive(B, [50]),
                MemberEntry::new(C, [90], MemberStatus::Faulty),
                MemberEntry::new("10.0.0.4:3000", [130], MemberStatus::Suspect),
            ],
        )
        .unwrap();

        assert!(sample_peers(&snapshot, COORD, 0).is_empty());
        assert_eq!(
            sample_peers(&snapshot, COORD, 10),
            vec![B.to_string(), "10.0.0.4:3000".to_string()]
        );

        let one = sample_peers(&snapshot, COORD, 1);
        assert_eq!(one.len(), 1);
        assert!(one[0] == B || one[0] == "10.0.0.4:3000");
    }
}
