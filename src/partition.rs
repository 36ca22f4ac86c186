//! Partition detection over membership snapshots gathered from several nodes.
//!
//! Snapshots are grouped by equivalence: same epoch when the node reported
//! one, otherwise the same member set. More than one group means the
//! contacted nodes disagree about membership and the ring is split.

use crate::ring::RingSnapshot;
use crate::types::{MemberStatus, RingPosition};
use std::collections::HashMap;

/// A snapshot together with the address it was fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Address the snapshot was fetched from.
    pub source: String,
    /// The snapshot itself.
    pub snapshot: RingSnapshot,
}

impl Observation {
    /// Create a new observation.
    pub fn new(source: impl Into<String>, snapshot: RingSnapshot) -> Self {
        Self {
            source: source.into(),
            snapshot,
        }
    }
}

/// Identity of a membership view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ViewKey {
    Epoch(u64),
    Members(Vec<(String, MemberStatus, Vec<RingPosition>)>),
}

impl ViewKey {
    fn of(snapshot: &RingSnapshot) -> Self {
        match snapshot.epoch() {
            Some(epoch) => ViewKey::Epoch(epoch),
            None => {
                let mut members: Vec<_> = snapshot
                    .members()
                    .iter()
                    .map(|m| (m.address.clone(), m.status, m.positions.clone()))
                    .collect();
                members.sort();
                ViewKey::Members(members)
            }
        }
    }
}

/// A set of observations that agree on membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionGroup {
    /// Indices into the input observations, in input order.
    pub members: Vec<usize>,
}

impl PartitionGroup {
    /// Number of observations in the group.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Outcome of partition detection.
#[derive(Debug)]
pub struct PartitionReport<'a> {
    /// Number of distinct membership views.
    pub partition_count: usize,

    /// The observation whose snapshot should be trusted.
    pub authoritative: &'a Observation,

    /// All groups, in order of first appearance.
    pub groups: Vec<PartitionGroup>,
}

impl PartitionReport<'_> {
    /// Whether the contacted nodes disagree about membership.
    pub fn is_partitioned(&self) -> bool {
        self.partition_count > 1
    }
}

/// Group observations into partitions and pick the authoritative view.
///
/// The authoritative view comes from the largest group. Ties go to the group
/// containing the coordinator; within the chosen group the coordinator's own
/// snapshot is preferred. Returns `None` for an empty input.
pub fn detect_partitions<'a>(
    observations: &'a [Observation],
    coordinator: &str,
) -> Option<PartitionReport<'a>> {
    if observations.is_empty() {
        return None;
    }

    let mut index: HashMap<ViewKey, usize> = HashMap::new();
    let mut groups: Vec<PartitionGroup> = Vec::new();
    for (i, obs) in observations.iter().enumerate() {
        let slot = *index.entry(ViewKey::of(&obs.snapshot)).or_insert_with(|| {
            groups.push(PartitionGroup {
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].members.push(i);
    }

    let has_coordinator =
        |g: &PartitionGroup| g.members.iter().any(|&i| observations[i].source == coordinator);

    // Groups are in first-appearance order, so on a full tie the earliest wins.
    let mut best = 0;
    for (i, group) in groups.iter().enumerate().skip(1) {
        let current = &groups[best];
        if group.len() > current.len()
            || (group.len() == current.len() && has_coordinator(group) && !has_coordinator(current))
        {
            best = i;
        }
    }

    let chosen = &groups[best];
    let authoritative = chosen
        .members
        .iter()
        .map(|&i| &observations[i])
        .find(|obs| obs.source == coordinator)
        .unwrap_or(&observations[chosen.members[0]]);

    Some(PartitionReport {
        partition_count: groups.len(),
        authoritative,
        groups,
    })
}
