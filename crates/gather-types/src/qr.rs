use crate::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The check-in token record for an event.
///
/// At most one record is live per event; re-activation replaces the token,
/// so superseded tokens stop validating immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrCode {
    pub event_id: EventId,
    pub active: bool,
    /// Opaque secret presented by scanners.
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

impl QrCode {
    pub fn new(event_id: EventId, token: String, now: DateTime<Utc>) -> Self {
        Self {
            event_id,
            active: true,
            token,
            issued_at: now,
            last_scanned_at: None,
        }
    }

    pub fn accepts(&self, presented: &str) -> bool {
        self.active && self.token == presented
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_only_active_matching_token() {
        let mut qr = QrCode::new(EventId::new(1), "secret".into(), Utc::now());
        assert!(qr.accepts("secret"));
        assert!(!qr.accepts("other"));
        qr.active = false;
        assert!(!qr.accepts("secret"));
    }
}
