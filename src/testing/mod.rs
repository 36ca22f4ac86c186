//! Testing utilities for ring lookups.
//!
//! - `FixedHasher` pins chosen keys to chosen ring positions
//! - `ScriptedFetcher` answers snapshot fetches from memory, including
//!   refusals, malformed replies and nodes that never answer
//!
//! Networked scenarios stand up real membership responders on loopback.
//!
//! # Example
//!
//! ```rust
//! use ring_lookup::testing::{FixedHasher, ScriptedFetcher};
//! use ring_lookup::ring::{MemberEntry, RingSnapshot};
//!
//! let snapshot = RingSnapshot::new(Some(1), vec![MemberEntry::alive("a:1", [10])]).unwrap();
//! let fetcher = ScriptedFetcher::new()
//!     .with_snapshot("a:1", snapshot)
//!     .with_hanging("b:1");
//! let hasher = FixedHasher::new([("x", 42)]);
//! # let _ = (fetcher, hasher);
//! ```

mod utils;

#[cfg(test)]
mod nodes;

#[cfg(test)]
mod lookup_integration_tests;

pub use utils::{FixedHasher, ScriptedFetcher};
