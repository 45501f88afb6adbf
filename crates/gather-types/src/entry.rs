use crate::{Address, EventId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's participation record against one event.
///
/// The three flags are one-way latches: they move false to true exactly
/// once and are never reset. They are the sole authority for whether a
/// side effect (attendance credit, badge transfer, review reward) has
/// already happened, which is what makes retries safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntry {
    pub event_id: EventId,
    pub user: Address,
    /// Attendance proven via a check-in scan.
    pub is_confirmed: bool,
    /// Badge transferred on the ledger and recorded locally.
    pub is_badge_issued: bool,
    /// Review submitted and mileage granted.
    pub is_reviewed: bool,
    pub registered_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl EventEntry {
    pub fn new(event_id: EventId, user: Address, now: DateTime<Utc>) -> Self {
        Self {
            event_id,
            user,
            is_confirmed: false,
            is_badge_issued: false,
            is_reviewed: false,
            registered_at: now,
            confirmed_at: None,
        }
    }
}
