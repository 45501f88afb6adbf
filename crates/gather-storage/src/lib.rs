//! Persistence layer for the gather event system.
//!
//! The [`Backend`] trait covers the five record families (events,
//! entries, badges, QR codes, wallets) plus the guarded commit
//! operations the lifecycle and reward services rely on for
//! at-most-once bookkeeping. [`MemoryBackend`] is always available;
//! `RocksBackend` ships behind the `rocksdb` feature.

pub mod backend;
pub mod error;
pub mod memory;

#[cfg(feature = "rocksdb")]
pub mod rocks;

pub use backend::{
    Backend, ConfirmOutcome, ExchangeOutcome, GrantOutcome, IssueOutcome, StoreStats,
};
pub use error::{Result, StoreError};
pub use memory::MemoryBackend;

#[cfg(feature = "rocksdb")]
pub use rocks::RocksBackend;
