//! Configuration types for ring lookups.

use crate::error::{Error, Result};
use crate::network::codec::DEFAULT_MAX_FRAME_SIZE;
use crate::ring::{KeyHasher, XxHash64Hasher};
use crate::types::ProtocolVersion;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the snapshot client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on establishing the TCP connection.
    pub connect_timeout: Duration,

    /// Bound on sending the query and receiving the reply.
    pub request_timeout: Duration,

    /// Largest accepted reply payload.
    pub max_frame_size: usize,

    /// Ask nodes to list faulty members too. Only v2 queries carry this;
    /// v1 nodes always list every member.
    pub include_faulty: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            include_faulty: true,
        }
    }
}

impl ClientConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the maximum frame size.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set whether faulty members are requested (v2 only).
    pub fn with_include_faulty(mut self, include: bool) -> Self {
        self.include_faulty = include;
        self
    }
}

/// Options for a single lookup.
#[derive(Debug, Clone)]
pub struct LookupOptions {
    /// Wire protocol used for every fetch of the lookup.
    pub protocol_version: ProtocolVersion,

    /// How many members of the coordinator's snapshot to cross-check.
    /// Zero trusts the coordinator alone.
    pub peer_sample_size: usize,

    /// Deadline for the whole lookup.
    pub timeout: Duration,

    /// Bound on each peer fetch. A peer that does not answer in time is
    /// left out of partition detection instead of failing the lookup.
    pub peer_timeout: Duration,

    /// Hash function the cluster's nodes place themselves with.
    pub hasher: Arc<dyn KeyHasher>,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            protocol_version: ProtocolVersion::default(),
            peer_sample_size: 3,
            timeout: Duration::from_secs(10),
            peer_timeout: Duration::from_secs(3),
            hasher: Arc::new(XxHash64Hasher::default()),
        }
    }
}

impl LookupOptions {
    /// Create options for the given protocol version.
    pub fn new(protocol_version: ProtocolVersion) -> Self {
        Self {
            protocol_version,
            ..Default::default()
        }
    }

    /// Set the number of peers to cross-check.
    pub fn with_peer_sample_size(mut self, size: usize) -> Self {
        self.peer_sample_size = size;
        self
    }

    /// Set the overall deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-peer fetch bound.
    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    /// Set the hash function.
    pub fn with_hasher(mut self, hasher: Arc<dyn KeyHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Check the options are usable.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }
        if self.peer_sample_size > 0 && self.peer_timeout.is_zero() {
            return Err(Error::Config(
                "peer_timeout must be greater than zero when sampling peers".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for a membership responder.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,

    /// Protocol version the responder speaks.
    pub protocol_version: ProtocolVersion,

    /// Largest accepted request payload.
    pub max_frame_size: usize,
}

impl ServerConfig {
    /// Create a new config.
    pub fn new(bind_addr: SocketAddr, protocol_version: ProtocolVersion) -> Self {
        Self {
            bind_addr,
            protocol_version,
            max_frame_size: 64 * 1024,
        }
    }

    /// Set the maximum request frame size.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let client = ClientConfig::default();
        assert_eq!(client.connect_timeout, Duration::from_secs(2));
        assert_eq!(client.request_timeout, Duration::from_secs(5));
        assert_eq!(client.max_frame_size, 16 * 1024 * 1024);
        assert!(client.include_faulty);
        assert!(!client.with_include_faulty(false).include_faulty);

        let options = LookupOptions::default();
        assert_eq!(options.protocol_version, ProtocolVersion::V2);
        assert_eq!(options.peer_sample_size, 3);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let options = LookupOptions::new(ProtocolVersion::V1)
            .with_peer_sample_size(0)
            .with_timeout(Duration::from_millis(500));
        assert_eq!(options.protocol_version, ProtocolVersion::V1);
        assert_eq!(options.peer_sample_size, 0);
        assert_eq!(options.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let options = LookupOptions::default().with_timeout(Duration::ZERO);
        assert!(matches!(options.validate(), Err(Error::Config(_))));

        let options = LookupOptions::default().with_peer_timeout(Duration::ZERO);
        assert!(options.validate().is_err());

        let options = LookupOptions::default()
            .with_peer_sample_size(0)
            .with_peer_timeout(Duration::ZERO);
        assert!(options.validate().is_ok());
    }
}
