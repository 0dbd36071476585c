pub mod engine;
pub mod pattern;
pub mod state;

pub use engine::SessionScheduler;
pub use pattern::{SessionPattern, SessionRange};
pub use state::{ActiveSession, SchedulerSnapshot, SchedulerState};
