//! Client side of the membership protocol.

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::network::codec::{self, CodecError};
use crate::network::rpc::{Request, Response};
use crate::ring::RingSnapshot;
use crate::types::ProtocolVersion;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Something that can fetch a node's membership snapshot.
///
/// The lookup path only depends on this trait, so it can be driven by the
/// TCP client below or by an in-memory source.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Fetch the membership snapshot of the node at `addr`.
    async fn fetch_snapshot(
        &self,
        addr: &str,
        version: ProtocolVersion,
    ) -> Result<RingSnapshot, TransportError>;
}

/// Fetches snapshots over TCP, one connection per call.
///
/// Holds no connections between calls, so one instance can be shared by any
/// number of concurrent lookups.
#[derive(Debug)]
pub struct TcpSnapshotClient {
    config: ClientConfig,
    next_request_id: AtomicU64,
}

impl TcpSnapshotClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn connect(&self, addr: &str) -> Result<TcpStream, TransportError> {
        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Connect {
                addr: addr.to_string(),
                reason: "connection timeout".to_string(),
            })?
            .map_err(|e| TransportError::connect(addr, &e))?;
        // Single small request, no point in batching.
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    async fn exchange(
        &self,
        stream: &mut TcpStream,
        version: ProtocolVersion,
        request: &Request,
    ) -> Result<Response, CodecError> {
        let frame = codec::encode_request(version, request)?;
        codec::write_frame(stream, &frame).await?;
        trace!(bytes = frame.len(), "Membership request sent");
        codec::read_response(stream, version, self.config.max_frame_size).await
    }
}

impl Default for TcpSnapshotClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

fn map_codec_error(addr: &str, err: CodecError) -> TransportError {
    match err {
        CodecError::Io(e) => TransportError::Connect {
            addr: addr.to_string(),
            reason: format!("connection lost: {}", e),
        },
        other => TransportError::protocol(addr, other),
    }
}

#[async_trait]
impl SnapshotFetcher for TcpSnapshotClient {
    async fn fetch_snapshot(
        &self,
        addr: &str,
        version: ProtocolVersion,
    ) -> Result<RingSnapshot, TransportError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::Membership {
            request_id,
            include_faulty: self.config.include_faulty,
        };

        debug!(addr = %addr, version = %version, request_id, "Fetching membership snapshot");

        let mut stream = self.connect(addr).await?;

        let response = tokio::time::timeout(
            self.config.request_timeout,
            self.exchange(&mut stream, version, &request),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            addr: addr.to_string(),
            after: self.config.request_timeout,
        })?
        .map_err(|e| map_codec_error(addr, e))?;

        let _ = stream.shutdown().await;

        if response.request_id() != request_id {
            return Err(TransportError::protocol(
                addr,
                format!(
                    "request id mismatch: sent {}, got {}",
                    request_id,
                    response.request_id()
                ),
            ));
        }

        match response {
            Response::Membership { snapshot, .. } => {
                debug!(
                    addr = %addr,
                    epoch = ?snapshot.epoch(),
                    members = snapshot.member_count(),
                    "Received membership snapshot"
                );
                Ok(snapshot)
            }
            Response::Error { message, .. } => Err(TransportError::protocol(
                addr,
                format!("remote error: {}", message),
            )),
        }
    }
}
