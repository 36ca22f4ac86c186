//! RPC message types for the membership protocol.
//!
//! Both protocol versions carry the same information (an epoch and the
//! member list) but lay it out differently: v1 sends one entry per ring
//! point and uses a zero checksum for "no epoch", v2 sends one entry per
//! member with all of its positions.

use crate::ring::{MemberEntry, RingSnapshot, SnapshotError};
use crate::types::{MemberStatus, RingPosition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Requests understood by a membership responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Ask for the node's current view of ring membership.
    Membership {
        /// Correlates the reply with this request.
        request_id: u64,
        /// Whether faulty members should be listed.
        include_faulty: bool,
    },
}

impl Request {
    /// Create a membership query.
    pub fn membership(request_id: u64) -> Self {
        Request::Membership {
            request_id,
            include_faulty: true,
        }
    }

    /// The request id.
    pub fn request_id(&self) -> u64 {
        match self {
            Request::Membership { request_id, .. } => *request_id,
        }
    }
}

/// Replies sent by a membership responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The node's membership view.
    Membership {
        request_id: u64,
        snapshot: RingSnapshot,
    },
    /// The node could not serve the request.
    Error { request_id: u64, message: String },
}

impl Response {
    /// The request id this is responding to.
    pub fn request_id(&self) -> u64 {
        match self {
            Response::Membership { request_id, .. } | Response::Error { request_id, .. } => {
                *request_id
            }
        }
    }
}

/// v1 wire messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum V1Message {
    /// Membership query.
    MembershipQuery { request_id: u64 },

    /// Membership reply.
    MembershipReply(V1MembershipReply),

    /// Error reply.
    Error { request_id: u64, message: String },
}

/// v1 membership reply: one entry per ring point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V1MembershipReply {
    /// The request ID this is responding to.
    pub request_id: u64,

    /// Membership checksum; zero when the node has none.
    pub checksum: u64,

    /// Ring points.
    pub entries: Vec<V1RingEntry>,
}

/// A single ring point in a v1 reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V1RingEntry {
    pub address: String,
    pub status: MemberStatus,
    pub position: RingPosition,
}

impl V1MembershipReply {
    /// Flatten a snapshot into v1 ring entries.
    pub fn from_snapshot(request_id: u64, snapshot: &RingSnapshot) -> Self {
        let entries = snapshot
            .members()
            .iter()
            .flat_map(|m| {
                m.positions.iter().map(move |&position| V1RingEntry {
                    address: m.address.clone(),
                    status: m.status,
                    position,
                })
            })
            .collect();

        Self {
            request_id,
            checksum: snapshot.epoch().unwrap_or(0),
            entries,
        }
    }

    /// Merge entries sharing an address back into members.
    pub fn into_snapshot(self) -> Result<RingSnapshot, SnapshotError> {
        let mut merged: BTreeMap<String, (MemberStatus, Vec<RingPosition>)> = BTreeMap::new();
        for entry in self.entries {
            let slot = merged
                .entry(entry.address)
                .or_insert_with(|| (entry.status, Vec::new()));
            // A member reported with mixed states is treated as its worst one.
            slot.0 = slot.0.max(entry.status);
            slot.1.push(entry.position);
        }

        let members = merged
            .into_iter()
            .map(|(address, (status, positions))| MemberEntry::new(address, positions, status))
            .collect();
        let epoch = (self.checksum != 0).then_some(self.checksum);
        RingSnapshot::new(epoch, members)
    }
}

/// v2 membership query payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipQueryV2 {
    /// Whether faulty members should be listed.
    pub include_faulty: bool,
}

/// v2 membership reply payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipReplyV2 {
    pub epoch: Option<u64>,
    pub members: Vec<WireMemberV2>,
}

/// A member in a v2 reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMemberV2 {
    pub address: String,
    pub status: MemberStatus,
    pub positions: Vec<RingPosition>,
}

impl MembershipReplyV2 {
    /// Build a v2 reply from a snapshot.
    pub fn from_snapshot(snapshot: &RingSnapshot) -> Self {
        Self {
            epoch: snapshot.epoch(),
            members: snapshot
                .members()
                .iter()
                .map(|m| WireMemberV2 {
                    address: m.address.clone(),
                    status: m.status,
                    positions: m.positions.clone(),
                })
                .collect(),
        }
    }

    /// Convert into a snapshot, validating ring invariants.
    pub fn into_snapshot(self) -> Result<RingSnapshot, SnapshotError> {
        let members = self
            .members
            .into_iter()
            .map(|m| MemberEntry::new(m.address, m.positions, m.status))
            .collect();
        RingSnapshot::new(self.epoch, members)
    }
}

/// v2 error reply payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReplyV2 {
    pub message: String,
}

/// Drop faulty members from a snapshot, for queries that asked to omit them.
pub fn without_faulty(snapshot: &RingSnapshot) -> Result<RingSnapshot, SnapshotError> {
    let members = snapshot
        .members()
        .iter()
        .filter(|m| m.status.owns_positions())
        .cloned()
        .collect();
    RingSnapshot::new(snapshot.epoch(), members)
}
