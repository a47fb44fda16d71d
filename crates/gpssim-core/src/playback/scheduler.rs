//! Playback state machine and the 1 Hz tick
//!
//! Exactly one fix is buffered ahead of transmission. On each due tick the
//! buffered fix is stamped with the current UTC time of day, rendered to a
//! burst, sent, and replaced by the next row. The end of the track wraps to
//! the first data row so playback never stops on its own.

use super::cadence::Cadence;
use crate::nmea::{format_utc_time, render_burst};
use crate::output::{OutputRouter, SendReport};
use crate::time::MonotonicClock;
use crate::track::{NavigationFix, TrackError, TrackRead, TrackStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Playback errors
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("No track loaded")]
    NoTrackLoaded,

    #[error(transparent)]
    Track(#[from] TrackError),
}

/// Whether ticks emit sentences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Active,
    #[default]
    Stopped,
}

/// What a call to [`PlaybackScheduler::tick`] did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The cadence deadline has not been reached
    NotDue,
    /// Due, but playback is stopped or there is nothing to play
    Idle,
    /// Due, but the buffered row had no valid fix; nothing was sent
    Skipped { line: usize },
    /// A full burst went out
    Emitted {
        line: usize,
        fix: NavigationFix,
        sentences: usize,
        report: SendReport,
        /// The track wrapped to its first row after this burst
        wrapped: bool,
    },
}

/// Drives the track through the codec to the outputs
pub struct PlaybackScheduler {
    track: TrackStore,
    state: PlaybackState,
    buffered: Option<NavigationFix>,
    /// Track line of the buffered fix
    buffered_line: usize,
    cadence: Cadence,
    pacing: Duration,
    clock: Arc<dyn MonotonicClock>,
}

impl PlaybackScheduler {
    /// Scheduler with no track; the first tick is due immediately
    pub fn new(clock: Arc<dyn MonotonicClock>, period: Duration, pacing: Duration) -> Self {
        let cadence = Cadence::new(period, clock.now_ms());
        Self {
            track: TrackStore::new(),
            state: PlaybackState::Stopped,
            buffered: None,
            buffered_line: 0,
            cadence,
            pacing,
            clock,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == PlaybackState::Active
    }

    /// A track is loaded (the "running" flag)
    pub fn is_running(&self) -> bool {
        self.track.is_loaded()
    }

    pub fn track(&self) -> &TrackStore {
        &self.track
    }

    pub fn buffered(&self) -> Option<&NavigationFix> {
        self.buffered.as_ref()
    }

    /// Time left until the next tick is due
    pub fn time_until_due(&self) -> Duration {
        self.cadence.remaining(self.clock.now_ms())
    }

    /// Stop playback and load a new track, discarding the buffered fix
    pub fn load_track(&mut self, path: impl AsRef<Path>) -> Result<(), TrackError> {
        self.stop();
        self.buffered = None;
        self.buffered_line = 0;
        self.track.open(path)
    }

    /// Stop playback and release the track
    pub fn unload(&mut self) {
        self.stop();
        self.buffered = None;
        self.buffered_line = 0;
        self.track.close();
    }

    /// Begin emitting; buffers the first fix if none is buffered
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        if !self.track.is_loaded() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        if self.buffered.is_none() {
            self.fetch_next();
        }
        if self.state != PlaybackState::Active {
            tracing::info!(line = self.buffered_line, "Playback started");
        }
        self.state = PlaybackState::Active;
        Ok(())
    }

    /// Halt emission; the buffered fix and cursor are kept
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Active {
            tracing::info!(line = self.track.current_line(), "Playback stopped");
        }
        self.state = PlaybackState::Stopped;
    }

    /// Run one tick if it is due
    ///
    /// `now` is only consulted when a burst is actually rendered.
    pub fn tick(
        &mut self,
        now: impl FnOnce() -> DateTime<Utc>,
        router: &mut OutputRouter,
    ) -> TickOutcome {
        if !self.cadence.try_advance(self.clock.now_ms()) {
            return TickOutcome::NotDue;
        }
        if self.state != PlaybackState::Active || !self.track.is_loaded() {
            return TickOutcome::Idle;
        }

        if self.buffered.is_none() {
            self.fetch_next();
        }
        let Some(fix) = self.buffered.take() else {
            tracing::debug!("Track has no data rows");
            return TickOutcome::Idle;
        };
        let line = self.buffered_line;

        if !fix.is_valid() {
            tracing::debug!(line, "Skipping tick for row without a valid fix");
            self.fetch_next();
            return TickOutcome::Skipped { line };
        }

        let stamped = fix.with_utc_time(format_utc_time(now()));
        let burst = match render_burst(&stamped) {
            Ok(burst) => burst,
            Err(e) => {
                tracing::debug!(line, error = %e, "Fix could not be rendered");
                self.fetch_next();
                return TickOutcome::Skipped { line };
            }
        };

        let mut report = SendReport::default();
        for (i, sentence) in burst.iter().enumerate() {
            if i > 0 {
                self.clock.sleep(self.pacing);
            }
            let sent = router.send(sentence);
            report.delivered = report.delivered.max(sent.delivered);
            report.failed = report.failed.max(sent.failed);
        }
        tracing::trace!(line, time = %stamped.utc_time, lat = stamped.latitude, lon = stamped.longitude, "Burst sent");

        let wrapped = self.fetch_next();
        TickOutcome::Emitted {
            line,
            fix: stamped,
            sentences: burst.len(),
            report,
            wrapped,
        }
    }

    /// Buffer the next row, wrapping at end of data; returns true on wrap
    fn fetch_next(&mut self) -> bool {
        if let TrackRead::Fix(fix) = self.track.next() {
            self.buffer(fix);
            return false;
        }

        tracing::info!(path = ?self.track.path(), "End of track, restarting from first row");
        if let Err(e) = self.track.rewind() {
            tracing::warn!(error = %e, "Track could not be reopened, stopping playback");
            self.buffered = None;
            self.stop();
            return true;
        }
        match self.track.next() {
            TrackRead::Fix(fix) => self.buffer(fix),
            TrackRead::EndOfData => self.buffered = None,
        }
        true
    }

    fn buffer(&mut self, fix: NavigationFix) {
        self.buffered = Some(fix);
        self.buffered_line = self.track.current_line();
    }
}
