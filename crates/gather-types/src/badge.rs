use crate::{Address, EventId, TokenId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Badge tier. The score feeds a wallet's cumulative badge score when the
/// badge is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeKind {
    Attendance,
    Bronze,
    Silver,
    Gold,
}

impl BadgeKind {
    pub fn score(&self) -> u64 {
        match self {
            BadgeKind::Attendance => 10,
            BadgeKind::Bronze => 20,
            BadgeKind::Silver => 50,
            BadgeKind::Gold => 100,
        }
    }
}

impl fmt::Display for BadgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BadgeKind::Attendance => f.write_str("attendance"),
            BadgeKind::Bronze => f.write_str("bronze"),
            BadgeKind::Silver => f.write_str("silver"),
            BadgeKind::Gold => f.write_str("gold"),
        }
    }
}

/// The fixed-supply non-fungible reward tied to one event.
///
/// Immutable after creation except for `remain_quantity` (monotonically
/// decreasing, never below zero) and `owners` (append-only, one entry per
/// successful transfer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub event_id: EventId,
    pub token_id: TokenId,
    pub kind: BadgeKind,
    pub name: String,
    pub metadata_uri: String,
    pub initial_quantity: u32,
    pub remain_quantity: u32,
    pub owners: Vec<Address>,
    pub created_at: DateTime<Utc>,
}

impl Badge {
    pub fn issued_count(&self) -> u32 {
        self.initial_quantity - self.remain_quantity
    }
}

/// Descriptive metadata pinned to the off-chain store before minting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
    pub kind: BadgeKind,
}

/// Input for creating an event's badge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeDraft {
    pub name: String,
    pub description: String,
    pub image: String,
    pub kind: BadgeKind,
    pub quantity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_scores_are_tiered() {
        assert!(BadgeKind::Attendance.score() < BadgeKind::Bronze.score());
        assert!(BadgeKind::Bronze.score() < BadgeKind::Silver.score());
        assert!(BadgeKind::Silver.score() < BadgeKind::Gold.score());
    }

    #[test]
    fn test_issued_count() {
        let badge = Badge {
            event_id: EventId::new(1),
            token_id: TokenId::new(7),
            kind: BadgeKind::Gold,
            name: "Finisher".into(),
            metadata_uri: "ipfs://abc".into(),
            initial_quantity: 10,
            remain_quantity: 6,
            owners: vec![Address::ZERO; 4],
            created_at: Utc::now(),
        };
        assert_eq!(badge.issued_count(), 4);
    }
}
