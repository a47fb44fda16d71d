//! Playback statistics

pub mod store;

pub use store::{BurstRecord, PlaybackStats, StatsStore};
