//! End-to-end lookups against membership responders on loopback.

use super::nodes::{allocate_os_ports, SilentNode, TestNode};
use crate::config::{ClientConfig, LookupOptions};
use crate::error::ErrorKind;
use crate::lookup::RingLookup;
use crate::ring::{MemberEntry, RingSnapshot};
use crate::testing::FixedHasher;
use crate::types::{MemberStatus, ProtocolVersion};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

async fn addrs(count: usize) -> Vec<SocketAddr> {
    allocate_os_ports(count)
        .await
        .into_iter()
        .map(|port| SocketAddr::from(([127, 0, 0, 1], port)))
        .collect()
}

fn ring(epoch: u64, addrs: &[SocketAddr]) -> RingSnapshot {
    let members = addrs
        .iter()
        .zip([10u64, 50, 90])
        .map(|(addr, pos)| MemberEntry::alive(addr.to_string(), [pos]))
        .collect();
    RingSnapshot::new(Some(epoch), members).unwrap()
}

fn options(version: ProtocolVersion, peers: usize) -> LookupOptions {
    LookupOptions::new(version)
        .with_peer_sample_size(peers)
        .with_timeout(Duration::from_secs(5))
        .with_peer_timeout(Duration::from_millis(300))
        .with_hasher(Arc::new(FixedHasher::new([("x", 42), ("z", 95)])))
}

#[tokio::test]
async fn test_consistent_cluster_both_versions() {
    for version in [ProtocolVersion::V1, ProtocolVersion::V2] {
        let addrs = addrs(3).await;
        let snapshot = ring(7, &addrs);
        let mut nodes = Vec::new();
        for addr in &addrs {
            nodes.push(TestNode::start(*addr, version, snapshot.clone()).await);
        }

        let coordinator = nodes[0].addr.to_string();
        let lookup = RingLookup::default();

        let result = lookup
            .lookup(&coordinator, "x", &options(version, 2))
            .await
            .unwrap();
        assert_eq!(result.destination, addrs[1].to_string());
        assert_eq!(result.partition_count, 1);
        assert_eq!(result.authority, coordinator);
        assert_eq!(result.contacted.len(), 3);
        assert!(result.unresponsive.is_empty());

        // Past the highest position the ring wraps to the first member.
        let result = lookup
            .lookup(&coordinator, "z", &options(version, 2))
            .await
            .unwrap();
        assert_eq!(result.destination, coordinator);

        for node in nodes {
            node.stop().await;
        }
    }
}

#[tokio::test]
async fn test_partitioned_cluster_reports_views() {
    let addrs = addrs(3).await;
    let majority = ring(7, &addrs);
    // The third node has lost contact with the other two.
    let isolated = RingSnapshot::new(
        Some(8),
        vec![
            MemberEntry::new(addrs[0].to_string(), [10], MemberStatus::Faulty),
            MemberEntry::new(addrs[1].to_string(), [50], MemberStatus::Faulty),
            MemberEntry::alive(addrs[2].to_string(), [90]),
        ],
    )
    .unwrap();

    let nodes = vec![
        TestNode::start(addrs[0], ProtocolVersion::V2, majority.clone()).await,
        TestNode::start(addrs[1], ProtocolVersion::V2, majority).await,
        TestNode::start(addrs[2], ProtocolVersion::V2, isolated).await,
    ];

    let coordinator = addrs[0].to_string();
    let result = RingLookup::default()
        .lookup(&coordinator, "x", &options(ProtocolVersion::V2, 2))
        .await
        .unwrap();
    assert_eq!(result.partition_count, 2);
    assert!(result.is_partitioned());
    assert_eq!(result.authority, coordinator);
    assert_eq!(result.destination, addrs[1].to_string());

    for node in nodes {
        node.stop().await;
    }
}

#[tokio::test]
async fn test_silent_peer_is_excluded() {
    let addrs = addrs(2).await;
    let snapshot = ring(3, &addrs);
    let node = TestNode::start(addrs[0], ProtocolVersion::V2, snapshot).await;
    let silent = SilentNode::start(addrs[1]).await;

    let coordinator = addrs[0].to_string();
    let result = RingLookup::default()
        .lookup(&coordinator, "x", &options(ProtocolVersion::V2, 3))
        .await
        .unwrap();
    assert_eq!(result.destination, addrs[1].to_string());
    assert_eq!(result.partition_count, 1);
    assert_eq!(result.contacted, vec![coordinator]);
    assert_eq!(result.unresponsive, vec![silent.addr.to_string()]);

    silent.stop();
    node.stop().await;
}

#[tokio::test]
async fn test_version_mismatch_is_protocol_error() {
    let addrs = addrs(1).await;
    let node = TestNode::start(addrs[0], ProtocolVersion::V1, ring(1, &addrs)).await;

    let err = RingLookup::with_client_config(
        ClientConfig::default().with_request_timeout(Duration::from_millis(500)),
    )
    .lookup(&addrs[0].to_string(), "x", &options(ProtocolVersion::V2, 0))
    .await
    .unwrap_err();
    // A v1 responder cannot parse a v2 query and drops the connection.
    assert!(matches!(err.kind(), ErrorKind::Connect | ErrorKind::Protocol));

    node.stop().await;
}

#[tokio::test]
async fn test_unreachable_coordinator() {
    let addrs = addrs(1).await;

    let err = RingLookup::default()
        .lookup(&addrs[0].to_string(), "x", &options(ProtocolVersion::V2, 3))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connect);
    assert_eq!(err.address(), Some(addrs[0].to_string().as_str()));
}

#[tokio::test]
async fn test_all_faulty_ring_is_empty() {
    let addrs = addrs(1).await;
    let snapshot = RingSnapshot::new(
        Some(2),
        vec![MemberEntry::new(addrs[0].to_string(), [10], MemberStatus::Faulty)],
    )
    .unwrap();
    let node = TestNode::start(addrs[0], ProtocolVersion::V2, snapshot).await;

    let err = RingLookup::default()
        .lookup(&addrs[0].to_string(), "x", &options(ProtocolVersion::V2, 3))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyRing);

    node.stop().await;
}
