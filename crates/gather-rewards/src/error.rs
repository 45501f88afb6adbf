use gather_chain::ChainError;
use gather_storage::StoreError;
use gather_types::{Address, EventId, EventStatus, Points};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RewardError {
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Event {event_id} has not finished (status: {status})")]
    EventNotFinished {
        event_id: EventId,
        status: EventStatus,
    },

    #[error("Review reward already granted: event {event_id}, user {user}")]
    AlreadyRewarded { event_id: EventId, user: Address },

    #[error("Insufficient mileage: {available} available, {required} required")]
    InsufficientMileage {
        available: Points,
        required: Points,
    },

    #[error("Event {0} already has a badge")]
    BadgeExists(EventId),

    #[error("No badge created for event {0}")]
    BadgeNotFound(EventId),

    #[error("Entry not found: event {event_id}, user {user}")]
    EntryNotFound { event_id: EventId, user: Address },

    #[error("Badge quantity must be positive")]
    InvalidQuantity,

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RewardError>;
