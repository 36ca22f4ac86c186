//! Ring membership snapshots and consistent-hash resolution.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     RingSnapshot                          │
//! │   epoch: Option<u64>                                      │
//! │   ┌──────┐   ┌──────┐   ┌──────┐   ┌──────┐              │
//! │   │A@10  │ → │B@50  │ → │C@90  │ → │A@130 │ → (wrap)     │
//! │   └──────┘   └──────┘   └──────┘   └──────┘              │
//! └──────────────────────────────────────────────────────────┘
//!
//!   Key "x" → KeyHasher → 42 → first point ≥ 42 → B
//! ```
//!
//! # Example
//!
//! ```rust
//! use ring_lookup::ring::{MemberEntry, Resolver, RingSnapshot};
//!
//! let snapshot = RingSnapshot::new(
//!     Some(1),
//!     vec![
//!         MemberEntry::alive("10.0.0.1:3000", [10]),
//!         MemberEntry::alive("10.0.0.2:3000", [50]),
//!     ],
//! )
//! .unwrap();
//!
//! let owner = Resolver::default().resolve(&snapshot, b"user:123").unwrap();
//! println!("owner: {}", owner.address);
//! ```

mod hasher;
pub mod placement;
mod resolver;
mod snapshot;

pub use hasher::{KeyHasher, XxHash32Hasher, XxHash64Hasher};
pub use placement::{assign_positions, positions_for, DEFAULT_POINTS_PER_MEMBER};
pub use resolver::{EmptyRingError, Resolver};
pub use snapshot::{MemberEntry, RingSnapshot, SnapshotError};
