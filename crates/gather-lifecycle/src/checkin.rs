use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{LifecycleError, Result};
use gather_storage::{Backend, ConfirmOutcome};
use gather_types::{Address, EventId, EventStatus, QrCode};

/// Attendance confirmation via rotating check-in tokens.
///
/// One record per event, at most one live token. Scans validate event
/// status before the token, so a code that outlives its event can never
/// confirm anyone.
pub struct CheckInManager {
    store: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
}

impl CheckInManager {
    pub fn new(store: Arc<dyn Backend>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Issues a fresh token for an event that is underway. Re-activation
    /// replaces the token, so previously issued codes stop validating.
    pub async fn activate(&self, event_id: EventId) -> Result<QrCode> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(LifecycleError::EventNotFound(event_id))?;
        if event.status != EventStatus::Progressing {
            return Err(LifecycleError::EventNotInProgress {
                event_id,
                status: event.status,
            });
        }

        let qr = QrCode::new(event_id, self.fresh_token(event_id), self.clock.now());
        self.store.put_qr(&qr).await?;
        info!(event_id = %event_id, "🔓 Check-in code activated");
        Ok(qr)
    }

    /// Marks the event's code inactive. Missing records are a no-op, so
    /// repeated deactivation is harmless.
    pub async fn deactivate(&self, event_id: EventId) -> Result<()> {
        if self.store.set_qr_active(event_id, false).await? {
            info!(event_id = %event_id, "🔒 Check-in code deactivated");
        }
        Ok(())
    }

    /// Validates a presented token and latches the scanning user's
    /// attendance. Re-scanning an already confirmed entry succeeds
    /// without changing anything.
    pub async fn scan(
        &self,
        event_id: EventId,
        token: &str,
        user: Address,
    ) -> Result<ConfirmOutcome> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(LifecycleError::EventNotFound(event_id))?;
        if event.status != EventStatus::Progressing {
            return Err(LifecycleError::EventNotInProgress {
                event_id,
                status: event.status,
            });
        }

        let qr = self
            .store
            .get_qr(event_id)
            .await?
            .ok_or(LifecycleError::InvalidToken(event_id))?;
        if !qr.accepts(token) {
            return Err(LifecycleError::InvalidToken(event_id));
        }

        self.store
            .get_entry(event_id, user)
            .await?
            .ok_or(LifecycleError::EntryNotFound { event_id, user })?;

        let now = self.clock.now();
        let outcome = self.store.confirm_entry(event_id, user, now).await?;
        self.store.mark_qr_scanned(event_id, now).await?;

        match outcome {
            ConfirmOutcome::Confirmed => {
                info!(event_id = %event_id, user = %user, "✅ Attendance confirmed");
            }
            ConfirmOutcome::AlreadyConfirmed => {
                debug!(event_id = %event_id, user = %user, "Repeat scan, already confirmed");
            }
        }
        Ok(outcome)
    }

    fn fresh_token(&self, event_id: EventId) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&event_id.value().to_le_bytes());
        hasher.update(&self.clock.now().timestamp_millis().to_le_bytes());
        hasher.update(&rand::random::<u64>().to_le_bytes());
        hex::encode(hasher.finalize().as_bytes())
    }
}
