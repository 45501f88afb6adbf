use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use gather_storage::Backend;
use gather_types::{Event, EventStatus};

/// The next forward transition an event is due for at `now`, if any.
///
/// Transitions are driven purely by the stored schedule, so a lagging
/// event catches up deterministically no matter how late the check runs.
pub fn transition_for(event: &Event, now: DateTime<Utc>) -> Option<EventStatus> {
    match event.status {
        EventStatus::Created if now >= event.recruit_start_at => Some(EventStatus::Recruiting),
        EventStatus::Recruiting if now >= event.event_start_at => Some(EventStatus::Progressing),
        EventStatus::Progressing if now >= event.event_end_at => Some(EventStatus::Finished),
        _ => None,
    }
}

/// Counts for one scheduler pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickSummary {
    /// Non-terminal events examined.
    pub scanned: usize,
    /// Events that moved at least one step.
    pub advanced: usize,
    /// Total steps applied across all events.
    pub transitions: usize,
    /// Events whose advance failed and was skipped this pass.
    pub failures: usize,
}

/// Periodic status checker. Every tick it scans non-terminal events and
/// applies every transition whose scheduled time has passed.
///
/// A tick that finds nothing due changes nothing, so overlapping or
/// repeated ticks are harmless.
pub struct EventScheduler {
    store: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
}

impl EventScheduler {
    pub fn new(store: Arc<dyn Backend>, clock: Arc<dyn Clock>, tick_interval: Duration) -> Self {
        Self {
            store,
            clock,
            tick_interval,
        }
    }

    /// Spawns the background tick loop.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        info!(
            interval_secs = scheduler.tick_interval.as_secs(),
            "⏳ Status scheduler started"
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.tick_interval);
            loop {
                interval.tick().await;
                match scheduler.tick().await {
                    Ok(summary) if summary.transitions > 0 || summary.failures > 0 => {
                        info!(
                            scanned = summary.scanned,
                            advanced = summary.advanced,
                            transitions = summary.transitions,
                            failures = summary.failures,
                            "🔄 Status check complete"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Status check error: {}", e);
                    }
                }
            }
        })
    }

    /// Runs one pass over all non-terminal events. A failure on one event
    /// is logged and skipped; the rest of the pass still runs.
    pub async fn tick(&self) -> Result<TickSummary> {
        let now = self.clock.now();
        let events = self.store.active_events().await?;

        let mut summary = TickSummary {
            scanned: events.len(),
            ..Default::default()
        };
        for event in events {
            let id = event.id;
            match self.advance_event(event, now).await {
                Ok(0) => {}
                Ok(steps) => {
                    summary.advanced += 1;
                    summary.transitions += steps;
                }
                Err(e) => {
                    summary.failures += 1;
                    error!(event_id = %id, error = %e, "Failed to advance event");
                }
            }
        }
        Ok(summary)
    }

    /// Applies every due transition for one event, in order. Returns the
    /// number of steps taken.
    async fn advance_event(&self, mut event: Event, now: DateTime<Utc>) -> Result<usize> {
        let mut steps = 0;
        while let Some(next) = transition_for(&event, now) {
            let applied = self
                .store
                .update_event_status(event.id, event.status, next)
                .await?;
            if !applied {
                // A concurrent pass or a cancellation got there first.
                debug!(event_id = %event.id, "Status changed underneath, skipping");
                break;
            }
            info!(event_id = %event.id, from = %event.status, to = %next, "🔄 Event advanced");

            if next == EventStatus::Finished {
                self.deactivate_check_in(&event).await;
            }
            event.status = next;
            steps += 1;
        }
        Ok(steps)
    }

    /// Turns off the event's check-in code once it finishes. Scans
    /// re-check event status, so a code left active here cannot confirm
    /// anyone; the failure is logged and the transition stands.
    async fn deactivate_check_in(&self, event: &Event) {
        match self.store.set_qr_active(event.id, false).await {
            Ok(true) => {
                info!(event_id = %event.id, "🔒 Check-in code deactivated");
            }
            Ok(false) => {}
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Failed to deactivate check-in code");
            }
        }
    }
}
