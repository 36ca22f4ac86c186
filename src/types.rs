//! Core types shared by the ring, the wire protocol and the lookup path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position on the hash ring.
pub type RingPosition = u64;

/// Health state of a member as reported by the node that produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MemberStatus {
    /// Member is healthy.
    Alive,
    /// Member missed probes but has not been declared dead yet.
    Suspect,
    /// Member was declared dead by the gossip protocol.
    Faulty,
}

impl MemberStatus {
    /// Whether a member in this state may own positions on the ring.
    pub fn owns_positions(self) -> bool {
        !matches!(self, MemberStatus::Faulty)
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemberStatus::Alive => "alive",
            MemberStatus::Suspect => "suspect",
            MemberStatus::Faulty => "faulty",
        };
        f.write_str(s)
    }
}

/// Wire protocol version used to talk to a node.
///
/// The version is always chosen by the caller; it is never negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVersion {
    /// Legacy length-prefixed framing.
    V1,
    /// Headered framing with request ids and payload checksums.
    #[default]
    V2,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V1 => f.write_str("v1"),
            ProtocolVersion::V2 => f.write_str("v2"),
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(ProtocolVersion::V1),
            "v2" | "2" => Ok(ProtocolVersion::V2),
            other => Err(format!("unknown protocol version: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_version_parse() {
        assert_eq!("v1".parse::<ProtocolVersion>(), Ok(ProtocolVersion::V1));
        assert_eq!("2".parse::<ProtocolVersion>(), Ok(ProtocolVersion::V2));
        assert!("v3".parse::<ProtocolVersion>().is_err());
        assert_eq!(ProtocolVersion::default(), ProtocolVersion::V2);
    }

    #[test]
    fn test_faulty_members_own_nothing() {
        assert!(MemberStatus::Alive.owns_positions());
        assert!(MemberStatus::Suspect.owns_positions());
        assert!(!MemberStatus::Faulty.owns_positions());
    }
}
