//! gpssim core - Track playback, NMEA encoding, and network time
//!
//! This library replays a recorded GPS track as a live NMEA-0183 stream. Each
//! second the next track row is stamped with the current UTC time, rendered
//! as a u-blox style sentence burst, and written to the enabled serial
//! outputs. Time comes from the network when the host is a client and from a
//! monotonic extrapolation otherwise.

pub mod nmea;
pub mod output;
pub mod playback;
pub mod simulator;
pub mod stats;
pub mod time;
pub mod track;

pub use output::{OutputConfig, OutputRouter};
pub use playback::PlaybackScheduler;
pub use simulator::{ControlError, Simulator, SimulatorHandle, StatusSnapshot};
pub use stats::StatsStore;
pub use time::{NetworkMode, TimeSource};
pub use track::{NavigationFix, TrackStore};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date stamped by build.rs
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Playback cadence (1 Hz, like a real receiver)
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Gap between consecutive sentences of a burst
pub const SENTENCE_PACING_MS: u64 = 50;

/// Serial line rate expected by NMEA-0183 listeners
pub const DEFAULT_BAUD_RATE: u32 = 9600;
