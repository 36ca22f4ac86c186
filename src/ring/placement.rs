//! Deterministic placement of members on the ring.

use crate::ring::hasher::KeyHasher;
use crate::ring::snapshot::MemberEntry;
use crate::types::MemberStatus;

/// Default number of ring points per member.
pub const DEFAULT_POINTS_PER_MEMBER: usize = 100;

/// Positions for one address: the hash of `"{address}{i}"` for each point.
pub fn positions_for(address: &str, points_per_member: usize, hasher: &dyn KeyHasher) -> Vec<u64> {
    (0..points_per_member)
        .map(|i| hasher.hash(format!("{}{}", address, i).as_bytes()))
        .collect()
}

/// Place every address on the ring as an alive member.
pub fn assign_positions<I, S>(
    addresses: I,
    points_per_member: usize,
    hasher: &dyn KeyHasher,
) -> Vec<MemberEntry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    addresses
        .into_iter()
        .map(|addr| {
            let addr = addr.as_ref();
            MemberEntry::new(
                addr,
                positions_for(addr, points_per_member, hasher),
                MemberStatus::Alive,
            )
        })
        .collect()
}
