//! Core types shared across the gather event and reward system.
//!
//! Everything here is plain data: identifiers, amounts, lifecycle
//! statuses, and the persisted record shapes. Behavior lives in the
//! lifecycle, rewards, and storage crates.

pub mod amount;
pub mod badge;
pub mod entry;
pub mod event;
pub mod id;
pub mod qr;
pub mod wallet;

pub use amount::Points;
pub use badge::{Badge, BadgeDraft, BadgeKind, BadgeMetadata};
pub use entry::EventEntry;
pub use event::{Event, EventDraft, EventKind, EventPatch, EventStatus};
pub use id::{Address, EventId, ParseIdError, TokenId, TxHash};
pub use qr::QrCode;
pub use wallet::Wallet;
