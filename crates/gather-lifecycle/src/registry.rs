use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{LifecycleError, Result};
use gather_storage::{Backend, StoreError};
use gather_types::{Address, Event, EventDraft, EventEntry, EventId, EventPatch, EventStatus};

/// Command surface for event records: creation, display edits,
/// registration, cancellation, and removal. Status progression is owned
/// by the scheduler; the only status change made here is cancellation.
pub struct EventRegistry {
    store: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
}

impl EventRegistry {
    /// Hydrates the id allocator from the highest stored event id.
    pub async fn new(store: Arc<dyn Backend>, clock: Arc<dyn Clock>) -> Result<Self> {
        let max_id = store
            .list_events()
            .await?
            .iter()
            .map(|e| e.id.value())
            .max()
            .unwrap_or(0);
        Ok(Self {
            store,
            clock,
            next_id: AtomicU64::new(max_id + 1),
        })
    }

    pub async fn create_event(&self, draft: EventDraft) -> Result<Event> {
        if !draft.schedule_valid() {
            return Err(LifecycleError::InvalidSchedule(
                "recruitment and event windows must each be ordered".to_string(),
            ));
        }
        if draft.capacity == 0 {
            return Err(LifecycleError::InvalidSchedule(
                "capacity must be positive".to_string(),
            ));
        }

        let id = EventId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let event = Event::from_draft(id, draft, self.clock.now());
        self.store.put_event(&event).await?;
        info!(
            event_id = %event.id,
            title = %event.title,
            capacity = event.capacity,
            kind = %event.kind,
            "📝 Event created"
        );
        Ok(event)
    }

    /// Edits display fields. Allowed only before the lifecycle starts
    /// moving, so published schedules and capacities stay trustworthy.
    pub async fn update_details(&self, id: EventId, patch: EventPatch) -> Result<Event> {
        let mut event = self.get_event(id).await?;
        if event.status != EventStatus::Created {
            return Err(LifecycleError::EventNotEditable {
                event_id: id,
                status: event.status,
            });
        }
        if patch.is_empty() {
            return Ok(event);
        }

        if let Some(title) = patch.title {
            event.title = title;
        }
        if let Some(content) = patch.content {
            event.content = content;
        }
        if let Some(location) = patch.location {
            event.location = location;
        }
        event.updated_at = self.clock.now();
        self.store.put_event(&event).await?;
        debug!(event_id = %id, "📝 Event details updated");
        Ok(event)
    }

    /// Registers a user's interest while the event is recruiting. How
    /// oversubscribed events select attendees (fcfs, random draw) is the
    /// enrollment layer's concern, not enforced here.
    pub async fn register(&self, id: EventId, user: Address) -> Result<EventEntry> {
        let event = self.get_event(id).await?;
        if event.status != EventStatus::Recruiting {
            return Err(LifecycleError::RegistrationClosed {
                event_id: id,
                status: event.status,
            });
        }

        let entry = EventEntry::new(id, user, self.clock.now());
        match self.store.insert_entry(&entry).await {
            Ok(()) => {
                info!(event_id = %id, user = %user, "📝 Registration recorded");
                Ok(entry)
            }
            Err(StoreError::AlreadyExists(_)) => Err(LifecycleError::AlreadyRegistered {
                event_id: id,
                user,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Cancels an event that has not started progressing. Terminal.
    pub async fn cancel(&self, id: EventId) -> Result<Event> {
        let event = self.get_event(id).await?;
        if !event.status.can_cancel() {
            return Err(LifecycleError::InvalidTransition {
                event_id: id,
                from: event.status,
                to: EventStatus::Canceled,
            });
        }

        let applied = self
            .store
            .update_event_status(id, event.status, EventStatus::Canceled)
            .await?;
        if !applied {
            // The scheduler advanced it between our read and the write.
            let fresh = self.get_event(id).await?;
            return Err(LifecycleError::InvalidTransition {
                event_id: id,
                from: fresh.status,
                to: EventStatus::Canceled,
            });
        }
        info!(event_id = %id, from = %event.status, "🛑 Event canceled");
        self.get_event(id).await
    }

    /// Removes a terminal event together with its entries, badge, and
    /// QR record.
    pub async fn remove(&self, id: EventId) -> Result<()> {
        let event = self.get_event(id).await?;
        if !event.is_terminal() {
            return Err(LifecycleError::EventNotRemovable {
                event_id: id,
                status: event.status,
            });
        }
        self.store.delete_event(id).await?;
        info!(event_id = %id, "🧹 Event removed");
        Ok(())
    }

    pub async fn get_event(&self, id: EventId) -> Result<Event> {
        self.store
            .get_event(id)
            .await?
            .ok_or(LifecycleError::EventNotFound(id))
    }

    pub async fn list_events(&self) -> Result<Vec<Event>> {
        Ok(self.store.list_events().await?)
    }

    pub async fn list_entries(&self, id: EventId) -> Result<Vec<EventEntry>> {
        Ok(self.store.list_entries(id).await?)
    }

    pub async fn get_entry(&self, id: EventId, user: Address) -> Result<EventEntry> {
        self.store
            .get_entry(id, user)
            .await?
            .ok_or(LifecycleError::EntryNotFound { event_id: id, user })
    }
}
