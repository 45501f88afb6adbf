use gather_types::{Address, EventId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Entry not found: event {0}, user {1}")]
    EntryNotFound(EventId, Address),

    #[error("Badge not found for event {0}")]
    BadgeNotFound(EventId),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
