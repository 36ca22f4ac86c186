//! Loopback cluster members for networked tests.

use crate::config::ServerConfig;
use crate::network::server::{MembershipServer, StaticMembership};
use crate::ring::RingSnapshot;
use crate::types::ProtocolVersion;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Allocate OS-assigned ports by briefly binding to port 0.
pub async fn allocate_os_ports(count: usize) -> Vec<u16> {
    let mut listeners = Vec::with_capacity(count);
    for _ in 0..count {
        listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
    }
    // Held until every port is picked so none repeats.
    listeners
        .iter()
        .map(|l| l.local_addr().unwrap().port())
        .collect()
}

/// A membership responder running in the background.
pub struct TestNode {
    pub addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestNode {
    /// Start a responder on `addr` serving `snapshot`.
    pub async fn start(addr: SocketAddr, version: ProtocolVersion, snapshot: RingSnapshot) -> Self {
        let config = ServerConfig::new(addr, version);
        let (server, shutdown_tx) =
            MembershipServer::bind(config, Arc::new(StaticMembership::new(snapshot)))
                .await
                .unwrap();
        let addr = server.local_addr();
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });
        Self {
            addr,
            shutdown_tx,
            handle,
        }
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.handle.await;
    }
}

/// Accepts connections and never answers.
pub struct SilentNode {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl SilentNode {
    pub async fn start(addr: SocketAddr) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        Self { addr, handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}
