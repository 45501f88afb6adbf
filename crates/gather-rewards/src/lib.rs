//! Reward fulfillment against the external ledger: badge creation and
//! distribution, review mileage, and mileage-for-token exchanges.
//!
//! Every issuance is guarded twice: a keyed async lock keeps one
//! operation in flight per event (badges) or per user (exchanges), and
//! the storage layer's latched commits make the bookkeeping at-most-once
//! even if a guard is bypassed. Ledger calls never run under a store
//! lock, and no local state moves until the ledger confirms.

pub mod badges;
pub mod error;
pub mod locks;
pub mod mileage;

pub use badges::{BadgeIssuer, DistributionReport, RecipientOutcome, RecipientReport};
pub use error::{Result, RewardError};
pub use locks::KeyedLocks;
pub use mileage::{ExchangeReceipt, MileageManager, RewardPolicy};
