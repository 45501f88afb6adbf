use gather_storage::StoreError;
use gather_types::{Address, EventId, EventStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Entry not found: event {event_id}, user {user}")]
    EntryNotFound { event_id: EventId, user: Address },

    #[error("Event {event_id} is not in progress (status: {status})")]
    EventNotInProgress {
        event_id: EventId,
        status: EventStatus,
    },

    #[error("Invalid or superseded check-in token for event {0}")]
    InvalidToken(EventId),

    #[error("Event {event_id} is not recruiting (status: {status})")]
    RegistrationClosed {
        event_id: EventId,
        status: EventStatus,
    },

    #[error("User {user} already registered for event {event_id}")]
    AlreadyRegistered { event_id: EventId, user: Address },

    #[error("Event {event_id} can no longer be edited (status: {status})")]
    EventNotEditable {
        event_id: EventId,
        status: EventStatus,
    },

    #[error("Invalid status transition for event {event_id}: {from} -> {to}")]
    InvalidTransition {
        event_id: EventId,
        from: EventStatus,
        to: EventStatus,
    },

    #[error("Event {event_id} cannot be removed while {status}")]
    EventNotRemovable {
        event_id: EventId,
        status: EventStatus,
    },

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
