//! Playback counters and recent burst history
//!
//! Keeps the last hour of emitted positions at full resolution for status
//! displays and log summaries.

use crate::playback::TickOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Maximum number of bursts kept in history (1 hour at 1 Hz)
const MAX_HISTORY_SIZE: usize = 3600;

/// One emitted burst
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurstRecord {
    /// Wall time the burst was stamped with
    pub timestamp: DateTime<Utc>,
    /// Track line the fix came from
    pub line: usize,
    pub latitude: f64,
    pub longitude: f64,
}

/// Running counters since the last reset
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct PlaybackStats {
    /// Bursts fully rendered and sent
    pub bursts_sent: u64,
    /// Sentences written (counted once per sentence, not per channel)
    pub sentences_sent: u64,
    /// Due ticks that emitted nothing because the row had no valid fix
    pub ticks_skipped: u64,
    /// Times the track wrapped back to its first row
    pub track_wraps: u64,
    /// Sentence writes that failed on at least one channel
    pub channel_failures: u64,
    /// Track line of the last burst
    pub last_line: usize,
}

/// Statistics store for playback
#[derive(Debug)]
pub struct StatsStore {
    history: VecDeque<BurstRecord>,
    max_size: usize,
    stats: PlaybackStats,
}

impl StatsStore {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            max_size: MAX_HISTORY_SIZE,
            stats: PlaybackStats::default(),
        }
    }

    /// Fold one tick outcome into the counters
    pub fn record_tick(&mut self, outcome: &TickOutcome, timestamp: DateTime<Utc>) {
        match outcome {
            TickOutcome::NotDue | TickOutcome::Idle => {}
            TickOutcome::Skipped { .. } => self.stats.ticks_skipped += 1,
            TickOutcome::Emitted {
                line,
                fix,
                sentences,
                report,
                wrapped,
            } => {
                self.stats.bursts_sent += 1;
                self.stats.sentences_sent += *sentences as u64;
                if report.failed > 0 {
                    self.stats.channel_failures += 1;
                }
                if *wrapped {
                    self.stats.track_wraps += 1;
                }
                self.stats.last_line = *line;

                if self.history.len() >= self.max_size {
                    self.history.pop_front();
                }
                self.history.push_back(BurstRecord {
                    timestamp,
                    line: *line,
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                });
            }
        }
    }

    pub fn stats(&self) -> &PlaybackStats {
        &self.stats
    }

    pub fn history(&self) -> &VecDeque<BurstRecord> {
        &self.history
    }

    /// The most recent `count` bursts, oldest first
    pub fn recent(&self, count: usize) -> Vec<BurstRecord> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Zero the counters and drop history
    pub fn clear(&mut self) {
        self.history.clear();
        self.stats = PlaybackStats::default();
    }
}

impl Default for StatsStore {
    fn default() -> Self {
        Self::new()
    }
}
