//! Event lifecycle: registry commands, the time-driven status
//! scheduler, and check-in confirmation.

pub mod checkin;
pub mod clock;
pub mod error;
pub mod registry;
pub mod scheduler;

pub use checkin::CheckInManager;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{LifecycleError, Result};
pub use registry::EventRegistry;
pub use scheduler::{transition_for, EventScheduler, TickSummary};
