//! Network communication layer.

pub mod client;
pub mod codec;
pub mod rpc;
pub mod server;

pub use client::{SnapshotFetcher, TcpSnapshotClient};
pub use codec::CodecError;
pub use rpc::{Request, Response};
pub use server::{MembershipServer, MembershipSource, StaticMembership};
