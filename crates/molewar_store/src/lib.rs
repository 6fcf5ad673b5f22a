//! # MOLEWAR Store
//!
//! Durable concurrent storage for player aggregates: an in-memory
//! directory of per-player mutexes fronting an append-only, checksummed
//! journal of post-commit snapshots.
//!
//! ## Design principles
//!
//! 1. **Commit boundary owns atomicity** - callers hand the store a
//!    fallible transform; the store locks, applies, journals, publishes
//! 2. **Crash safety by replay** - on open the journal is replayed
//!    last-record-wins; a torn tail is simply the uncommitted attempt
//! 3. **No background work** - expiry happens on access, compaction on
//!    explicit checkpoint

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod journal;
pub mod store;

pub use error::{JournalError, StoreError, StoreResult};
pub use journal::Journal;
pub use store::PlayerStore;
