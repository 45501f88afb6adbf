use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use gather_types::{Address, Badge, Event, EventEntry, EventId, EventStatus, Points, QrCode, Wallet};

/// Result of latching an entry's attendance flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Flag newly set; the event's remaining count was decremented.
    Confirmed,
    /// Flag was already set; nothing changed.
    AlreadyConfirmed,
}

/// Result of committing a badge issue for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    /// Supply decremented, owner appended, flag latched, wallet credited.
    Issued,
    AlreadyIssued,
    /// `remain_quantity` was zero; nothing changed.
    SupplyExhausted,
}

/// Result of committing a review reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Granted { balance: Points },
    AlreadyGranted,
}

/// Result of settling a mileage-for-tokens exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Settled { mileage: Points, tokens: Points },
    InsufficientMileage { available: Points },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub event_count: usize,
    pub active_event_count: usize,
    pub entry_count: usize,
    pub badge_count: usize,
    pub wallet_count: usize,
}

/// Persistence backend for the event system.
///
/// The guarded operations (`update_event_status`, `confirm_entry`,
/// `apply_badge_issue`, `apply_review_grant`, `apply_exchange`) are
/// all-or-nothing: each checks its precondition and applies every related
/// mutation in one atomic step, reporting the outcome instead of partially
/// writing. Callers never have to repair a half-applied commit.
#[async_trait]
pub trait Backend: Send + Sync {
    // Event operations

    async fn put_event(&self, event: &Event) -> Result<()>;
    async fn get_event(&self, id: EventId) -> Result<Option<Event>>;
    async fn list_events(&self) -> Result<Vec<Event>>;
    /// Events whose status is non-terminal, for the scheduler scan.
    async fn active_events(&self) -> Result<Vec<Event>>;
    /// Conditionally moves an event's status. Returns false when the
    /// current status no longer matches `expected`, so an overlapping
    /// scheduler pass cannot clobber a transition applied by a newer one.
    async fn update_event_status(
        &self,
        id: EventId,
        expected: EventStatus,
        next: EventStatus,
    ) -> Result<bool>;
    /// Removes the event together with its entries, badge, and QR record.
    async fn delete_event(&self, id: EventId) -> Result<()>;

    // Entry operations

    /// Creates a participation row; fails with `AlreadyExists` for a
    /// duplicate (event, user) pair.
    async fn insert_entry(&self, entry: &EventEntry) -> Result<()>;
    /// Upserts a row as-is. Intended for migrations and test fixtures;
    /// live flows go through `insert_entry` and the guarded ops.
    async fn put_entry(&self, entry: &EventEntry) -> Result<()>;
    async fn get_entry(&self, event_id: EventId, user: Address) -> Result<Option<EventEntry>>;
    /// Entries for an event in registration order.
    async fn list_entries(&self, event_id: EventId) -> Result<Vec<EventEntry>>;
    /// Latches `is_confirmed` and decrements the event's remaining count
    /// in one step.
    async fn confirm_entry(
        &self,
        event_id: EventId,
        user: Address,
        at: DateTime<Utc>,
    ) -> Result<ConfirmOutcome>;

    // Badge operations

    /// Persists the badge record; fails with `AlreadyExists` when the
    /// event already has one.
    async fn insert_badge(&self, badge: &Badge) -> Result<()>;
    async fn get_badge(&self, event_id: EventId) -> Result<Option<Badge>>;
    /// Commits one issued badge: latches the entry flag, decrements
    /// supply, appends the owner, credits the wallet counters.
    async fn apply_badge_issue(
        &self,
        event_id: EventId,
        user: Address,
        score: u64,
    ) -> Result<IssueOutcome>;

    // QR operations

    async fn put_qr(&self, qr: &QrCode) -> Result<()>;
    async fn get_qr(&self, event_id: EventId) -> Result<Option<QrCode>>;
    /// Returns false when the event has no QR record.
    async fn set_qr_active(&self, event_id: EventId, active: bool) -> Result<bool>;
    async fn mark_qr_scanned(&self, event_id: EventId, at: DateTime<Utc>) -> Result<()>;

    // Wallet operations

    /// Returns a zeroed wallet for addresses never seen before.
    async fn get_wallet(&self, address: Address) -> Result<Wallet>;
    /// Latches `is_reviewed` and credits mileage in one step.
    async fn apply_review_grant(
        &self,
        event_id: EventId,
        user: Address,
        amount: Points,
    ) -> Result<GrantOutcome>;
    /// Debits mileage and credits tokens in one step, refusing when the
    /// available mileage is below `amount`.
    async fn apply_exchange(&self, address: Address, amount: Points) -> Result<ExchangeOutcome>;

    // Maintenance

    async fn flush(&self) -> Result<()>;
    async fn stats(&self) -> Result<StoreStats>;
}
