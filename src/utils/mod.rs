pub mod logging;
pub mod time;

pub use time::{Clock, MonotonicClock, SystemClock};
