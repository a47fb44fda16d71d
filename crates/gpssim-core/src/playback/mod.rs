//! Track playback
//!
//! The scheduler turns the loaded track into one sentence burst per second:
//! - Fixed-period cadence against the monotonic clock ([`cadence`])
//! - The Active/Stopped playback machine and the tick itself ([`scheduler`])

pub mod cadence;
pub mod scheduler;

pub use cadence::Cadence;
pub use scheduler::{PlaybackError, PlaybackScheduler, PlaybackState, TickOutcome};
