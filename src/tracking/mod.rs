pub mod controller;
mod loop_worker;
pub mod state;

pub use controller::{TrackingController, DEFAULT_TICK_INTERVAL};
pub use state::{TrackingSnapshot, TrackingState, TrackingStatus};
