//! Immutable view of ring membership as reported by a single node.

use crate::types::{MemberStatus, RingPosition};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// One member of the ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    /// host:port of the member.
    pub address: String,

    /// Positions of this member on the ring, ascending.
    pub positions: Vec<RingPosition>,

    /// Health state as seen by the reporting node.
    pub status: MemberStatus,
}

impl MemberEntry {
    /// Create a new member entry. Positions are sorted and deduplicated.
    pub fn new(
        address: impl Into<String>,
        positions: impl IntoIterator<Item = RingPosition>,
        status: MemberStatus,
    ) -> Self {
        let mut positions: Vec<_> = positions.into_iter().collect();
        positions.sort_unstable();
        positions.dedup();
        Self {
            address: address.into(),
            positions,
            status,
        }
    }

    /// Create an alive member.
    pub fn alive(
        address: impl Into<String>,
        positions: impl IntoIterator<Item = RingPosition>,
    ) -> Self {
        Self::new(address, positions, MemberStatus::Alive)
    }

    /// Lowest ring position of this member.
    pub fn first_position(&self) -> Option<RingPosition> {
        self.positions.first().copied()
    }
}

/// Reasons a set of members cannot form a snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("member with empty address")]
    EmptyAddress,

    #[error("duplicate member address: {0}")]
    DuplicateAddress(String),

    #[error("member {0} has no ring positions")]
    NoPositions(String),
}

/// A point on the ring owned by one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RingPoint {
    position: RingPosition,
    member: usize,
}

/// One node's point-in-time view of ring membership.
///
/// Members are kept in ring order (by lowest position, then address). The
/// ring itself only holds points of members that may own keys: faulty
/// members stay listed but own nothing. When two members claim the same
/// position the lexicographically smaller address keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingSnapshot {
    epoch: Option<u64>,
    members: Vec<MemberEntry>,
    ring: Vec<RingPoint>,
}

impl RingSnapshot {
    /// Build a snapshot from an epoch (if the node reported one) and members.
    pub fn new(epoch: Option<u64>, members: Vec<MemberEntry>) -> Result<Self, SnapshotError> {
        let mut seen = HashSet::with_capacity(members.len());
        for member in &members {
            if member.address.is_empty() {
                return Err(SnapshotError::EmptyAddress);
            }
            if member.positions.is_empty() {
                return Err(SnapshotError::NoPositions(member.address.clone()));
            }
            if !seen.insert(member.address.as_str()) {
                return Err(SnapshotError::DuplicateAddress(member.address.clone()));
            }
        }

        let mut members: Vec<MemberEntry> = members
            .into_iter()
            .map(|m| MemberEntry::new(m.address, m.positions, m.status))
            .collect();
        members.sort_by(|a, b| {
            a.first_position()
                .cmp(&b.first_position())
                .then_with(|| a.address.cmp(&b.address))
        });

        let mut ring: Vec<RingPoint> = members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.status.owns_positions())
            .flat_map(|(idx, m)| {
                m.positions.iter().map(move |&position| RingPoint {
                    position,
                    member: idx,
                })
            })
            .collect();
        ring.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| members[a.member].address.cmp(&members[b.member].address))
        });
        // Sorted by address within a position, so the first claimant wins.
        ring.dedup_by_key(|p| p.position);

        Ok(Self {
            epoch,
            members,
            ring,
        })
    }

    /// Epoch (membership version or checksum) if the node reported one.
    pub fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    /// All members, in ring order.
    pub fn members(&self) -> &[MemberEntry] {
        &self.members
    }

    /// Number of members, including faulty ones.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Find a member by address.
    pub fn member(&self, address: &str) -> Option<&MemberEntry> {
        self.members.iter().find(|m| m.address == address)
    }

    /// Whether no member owns a position on the ring.
    pub fn is_ring_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Number of points on the ring.
    pub fn ring_len(&self) -> usize {
        self.ring.len()
    }

    /// Ring points in ascending order, paired with their owners.
    pub fn ring_points(&self) -> impl Iterator<Item = (RingPosition, &MemberEntry)> + '_ {
        self.ring
            .iter()
            .map(move |p| (p.position, &self.members[p.member]))
    }

    /// The member owning `hash`: the first point at or after it, wrapping
    /// around to the lowest point.
    pub fn successor(&self, hash: RingPosition) -> Option<&MemberEntry> {
        if self.ring.is_empty() {
            return None;
        }
        let idx = self.ring.partition_point(|p| p.position < hash);
        let point = self.ring.get(idx).unwrap_or(&self.ring[0]);
        Some(&self.members[point.member])
    }
}
