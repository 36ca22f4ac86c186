//! TCP responder answering membership queries.
//!
//! Nodes embed this to serve their ring view to lookup clients; tests use it
//! to stand up fake cluster members.

use crate::config::ServerConfig;
use crate::error::Result;
use crate::network::codec::{self, CodecError};
use crate::network::rpc::{without_faulty, Request, Response};
use crate::ring::RingSnapshot;
use crate::types::ProtocolVersion;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Provides the snapshot a responder serves.
pub trait MembershipSource: Send + Sync + 'static {
    /// The node's current membership view, or a reason it cannot serve one.
    fn snapshot(&self) -> std::result::Result<RingSnapshot, String>;
}

/// TCP server answering membership queries in one protocol version.
pub struct MembershipServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    source: Arc<dyn MembershipSource>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl MembershipServer {
    /// Bind a new server. Returns the server and its shutdown trigger.
    pub async fn bind(
        config: ServerConfig,
        source: Arc<dyn MembershipSource>,
    ) -> Result<(Self, mpsc::Sender<()>)> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let server = Self {
            listener,
            local_addr,
            config,
            source,
            shutdown_rx,
        };

        Ok((server, shutdown_tx))
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the server until the shutdown trigger fires or is dropped.
    pub async fn run(mut self) -> Result<()> {
        info!(
            addr = %self.local_addr,
            version = %self.config.protocol_version,
            "Membership server listening"
        );

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            debug!(peer = %peer_addr, "Accepted connection");
                            let source = self.source.clone();
                            let version = self.config.protocol_version;
                            let max_frame_size = self.config.max_frame_size;
                            tokio::spawn(async move {
                                let handled = Self::handle_connection(
                                    stream,
                                    source,
                                    version,
                                    max_frame_size,
                                )
                                .await;
                                if let Err(e) = handled {
                                    debug!(peer = %peer_addr, error = %e, "Connection dropped");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!(addr = %self.local_addr, "Membership server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_connection(
        mut stream: TcpStream,
        source: Arc<dyn MembershipSource>,
        version: ProtocolVersion,
        max_frame_size: usize,
    ) -> std::result::Result<(), CodecError> {
        while let Some(request) = codec::read_request(&mut stream, version, max_frame_size).await? {
            let response = Self::answer(source.as_ref(), &request);
            let frame = codec::encode_response(version, &response)?;
            codec::write_frame(&mut stream, &frame).await?;
        }
        Ok(())
    }

    fn answer(source: &dyn MembershipSource, request: &Request) -> Response {
        let Request::Membership {
            request_id,
            include_faulty,
        } = *request;

        let snapshot = source.snapshot().and_then(|snapshot| {
            if include_faulty {
                Ok(snapshot)
            } else {
                without_faulty(&snapshot).map_err(|e| e.to_string())
            }
        });

        match snapshot {
            Ok(snapshot) => Response::Membership {
                request_id,
                snapshot,
            },
            Err(message) => Response::Error {
                request_id,
                message,
            },
        }
    }
}

/// Serves a fixed snapshot.
#[derive(Debug, Clone)]
pub struct StaticMembership {
    snapshot: RingSnapshot,
}

impl StaticMembership {
    /// Create a source that always serves `snapshot`.
    pub fn new(snapshot: RingSnapshot) -> Self {
        Self { snapshot }
    }
}

impl MembershipSource for StaticMembership {
    fn snapshot(&self) -> std::result::Result<RingSnapshot, String> {
        Ok(self.snapshot.clone())
    }
}
