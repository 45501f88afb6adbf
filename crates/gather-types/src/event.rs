use crate::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an event.
///
/// The only forward path is `Created -> Recruiting -> Progressing ->
/// Finished`. `Canceled` is reachable from the pre-progressing states and,
/// like `Finished`, is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Created,
    Recruiting,
    Progressing,
    Finished,
    Canceled,
}

impl EventStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Finished | EventStatus::Canceled)
    }

    /// Whether an admin cancellation is still allowed from this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, EventStatus::Created | EventStatus::Recruiting)
    }

    /// The next status on the forward path, if any.
    pub fn next(&self) -> Option<EventStatus> {
        match self {
            EventStatus::Created => Some(EventStatus::Recruiting),
            EventStatus::Recruiting => Some(EventStatus::Progressing),
            EventStatus::Progressing => Some(EventStatus::Finished),
            EventStatus::Finished | EventStatus::Canceled => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Created => "created",
            EventStatus::Recruiting => "recruiting",
            EventStatus::Progressing => "progressing",
            EventStatus::Finished => "finished",
            EventStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How entries are accepted while recruiting. The selection algorithm
/// itself lives with the enrollment layer, not in this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Fcfs,
    Random,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Fcfs => f.write_str("fcfs"),
            EventKind::Random => f.write_str("random"),
        }
    }
}

/// A community event with a recruitment window and an execution window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub content: String,
    pub location: String,
    pub capacity: u32,
    /// Capacity minus confirmed attendances, floored at zero.
    pub remaining: u32,
    pub status: EventStatus,
    pub kind: EventKind,
    pub recruit_start_at: DateTime<Utc>,
    pub recruit_end_at: DateTime<Utc>,
    pub event_start_at: DateTime<Utc>,
    pub event_end_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn from_draft(id: EventId, draft: EventDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            content: draft.content,
            location: draft.location,
            capacity: draft.capacity,
            remaining: draft.capacity,
            status: EventStatus::Created,
            kind: draft.kind,
            recruit_start_at: draft.recruit_start_at,
            recruit_end_at: draft.recruit_end_at,
            event_start_at: draft.event_start_at,
            event_end_at: draft.event_end_at,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Input for creating a new event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub content: String,
    pub location: String,
    pub capacity: u32,
    pub kind: EventKind,
    pub recruit_start_at: DateTime<Utc>,
    pub recruit_end_at: DateTime<Utc>,
    pub event_start_at: DateTime<Utc>,
    pub event_end_at: DateTime<Utc>,
}

impl EventDraft {
    /// Both windows must be ordered. Recruitment closing before the event
    /// starts is assumed for sensible scheduling but not enforced here.
    pub fn schedule_valid(&self) -> bool {
        self.recruit_start_at <= self.recruit_end_at && self.event_start_at <= self.event_end_at
    }
}

/// Partial update of an event's display fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub location: Option<String>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.location.is_none()
    }
}
