//! Progress tracking and throttling.
//!
//! Rate-limiting for chunk worker reports and speed smoothing for the
//! supervisor's aggregation.

mod speed;
mod throttle;

pub use speed::{SpeedMeter, time_left};
pub use throttle::ProgressThrottle;
