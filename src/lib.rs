//! Partition-aware key lookup for consistent-hashing clusters.
//!
//! This crate answers one question: which member of a cluster owns a key?
//! It asks a coordinator node for its ring membership, cross-checks that view
//! with a sample of peers, and resolves the key against the authoritative one:
//! - **Consistent hashing** with the successor rule and wraparound
//! - **Partition detection** by grouping equivalent membership views
//! - **Two wire protocols**: length-prefixed v1 and checksummed v2 frames
//!
//! # Example
//!
//! ```rust,no_run
//! use ring_lookup::{lookup, LookupOptions, ProtocolVersion};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = LookupOptions::new(ProtocolVersion::V2).with_peer_sample_size(3);
//!
//!     let result = lookup("10.0.0.1:3000", "user:123", &options).await?;
//!     if result.is_partitioned() {
//!         eprintln!("{} membership views observed", result.partition_count);
//!     }
//!     println!("{}", result.destination);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            RingLookup::lookup               │
//! └─────────────────────────────────────────────┘
//!                     │
//!     ┌───────────────┼───────────────┐
//!     ▼               ▼               ▼
//! ┌─────────┐   ┌───────────┐   ┌──────────┐
//! │ Network │   │ Partition │   │   Ring   │
//! │ fetches │   │ detection │   │ resolver │
//! └─────────┘   └───────────┘   └──────────┘
//! ```
//!
//! # Consistency Model
//!
//! - **Agreeing views**: the destination is exact
//! - **Partitioned views**: the destination comes from the largest group of
//!   agreeing nodes and is reported with a partition count above one

pub mod config;
pub mod error;
pub mod lookup;
pub mod network;
pub mod partition;
pub mod ring;
pub mod testing;
pub mod types;

// Re-export main types for convenience
pub use config::{ClientConfig, LookupOptions, ServerConfig};
pub use error::{Error, ErrorKind, Result, TransportError};
pub use lookup::{lookup, sample_peers, LookupResult, LookupState, RingLookup};
pub use types::{MemberStatus, ProtocolVersion, RingPosition};

// Re-export ring types
pub use ring::{
    assign_positions, KeyHasher, MemberEntry, Resolver, RingSnapshot, SnapshotError,
    XxHash32Hasher, XxHash64Hasher,
};

// Re-export partition detection types
pub use partition::{detect_partitions, Observation, PartitionGroup, PartitionReport};

// Re-export network types
pub use network::{
    MembershipServer, MembershipSource, SnapshotFetcher, StaticMembership, TcpSnapshotClient,
};
