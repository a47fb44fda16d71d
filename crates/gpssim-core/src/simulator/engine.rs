//! Simulator engine: owns every component and runs the cooperative loop body
//!
//! All control operations take `&mut self`, so configuration changes made
//! between two polls are picked up by the next tick.

use crate::output::{OutputConfig, OutputRouter, ValidationError};
use crate::playback::{PlaybackError, PlaybackScheduler, PlaybackState, TickOutcome};
use crate::stats::{BurstRecord, PlaybackStats, StatsStore};
use crate::time::{ModeError, MonotonicClock, NetworkMode, SyncError, SyncStatus, TimeSource};
use crate::track::TrackError;
use crate::{SENTENCE_PACING_MS, TICK_INTERVAL_MS};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Point-in-time view of the simulator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub mode: NetworkMode,
    pub connected: bool,
    pub sync_status: SyncStatus,
    /// Seconds since network time was last obtained
    pub last_sync_age_secs: Option<u64>,
    pub track_loaded: bool,
    pub track_path: Option<PathBuf>,
    pub active: bool,
    pub current_line: usize,
    pub gpio_enabled: bool,
    pub usb_enabled: bool,
    /// Authoritative time without touching the network
    pub utc_time: DateTime<Utc>,
    pub counters: PlaybackStats,
}

/// GPS simulator engine
pub struct Simulator {
    playback: PlaybackScheduler,
    router: OutputRouter,
    time: TimeSource,
    stats: StatsStore,
    /// Last successfully loaded track, kept for reload
    track_path: Option<PathBuf>,
}

impl Simulator {
    /// Engine with the standard 1 Hz cadence and 50 ms sentence pacing
    pub fn new(time: TimeSource, router: OutputRouter, clock: Arc<dyn MonotonicClock>) -> Self {
        Self::with_timing(
            time,
            router,
            clock,
            Duration::from_millis(TICK_INTERVAL_MS),
            Duration::from_millis(SENTENCE_PACING_MS),
        )
    }

    pub fn with_timing(
        time: TimeSource,
        router: OutputRouter,
        clock: Arc<dyn MonotonicClock>,
        period: Duration,
        pacing: Duration,
    ) -> Self {
        Self {
            playback: PlaybackScheduler::new(clock, period, pacing),
            router,
            time,
            stats: StatsStore::new(),
            track_path: None,
        }
    }

    /// Bring up the persisted network mode
    pub fn establish_network(&mut self) -> Result<(), ModeError> {
        self.time.establish()
    }

    /// Stop playback and load a track file
    pub fn load_track(&mut self, path: impl AsRef<Path>) -> Result<(), TrackError> {
        let path = path.as_ref();
        match self.playback.load_track(path) {
            Ok(()) => {
                self.track_path = Some(path.to_path_buf());
                Ok(())
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Track load failed");
                Err(e)
            }
        }
    }

    /// Stop and reopen the last loaded track from its first row
    pub fn reload_track(&mut self) -> Result<(), PlaybackError> {
        let path = self.track_path.clone().ok_or(PlaybackError::NoTrackLoaded)?;
        tracing::info!(path = %path.display(), "Reloading track");
        self.playback.load_track(&path)?;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), PlaybackError> {
        self.playback.start()
    }

    pub fn stop(&mut self) {
        self.playback.stop();
    }

    /// Start if stopped, stop if active; returns the new state
    pub fn toggle(&mut self) -> Result<PlaybackState, PlaybackError> {
        if self.playback.is_active() {
            self.playback.stop();
        } else {
            self.playback.start()?;
        }
        Ok(self.playback.state())
    }

    pub fn set_output_config(&mut self, gpio: bool, usb: bool) -> Result<(), ValidationError> {
        let config = OutputConfig {
            gpio_enabled: gpio,
            usb_enabled: usb,
        };
        self.router.set_config(config)
    }

    pub fn switch_mode(&mut self, target: NetworkMode) -> Result<(), ModeError> {
        self.time.switch_mode(target)
    }

    pub fn request_sync(&mut self, force: bool) -> Result<(), SyncError> {
        self.time.sync(force)
    }

    /// One pass of the run loop: tick if due, fold the result into the counters
    pub fn poll(&mut self) -> TickOutcome {
        let outcome = self.playback.tick(|| self.time.now(), &mut self.router);

        match &outcome {
            TickOutcome::NotDue => {}
            TickOutcome::Emitted { .. } | TickOutcome::Skipped { .. } => {
                let stamp = DateTime::from_timestamp_millis(self.time.extrapolated_epoch_ms())
                    .unwrap_or_default();
                self.stats.record_tick(&outcome, stamp);
            }
            // Playback did not ask for time, keep network time fresh anyway
            TickOutcome::Idle => self.time.refresh(),
        }
        outcome
    }

    /// Time the run loop may sleep before the next poll
    pub fn time_until_next_tick(&self) -> Duration {
        self.playback.time_until_due()
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        let output = self.router.config();
        StatusSnapshot {
            mode: self.time.mode(),
            connected: self.time.is_connected(),
            sync_status: self.time.sync_status(),
            last_sync_age_secs: self.time.last_sync_age().map(|age| age.as_secs()),
            track_loaded: self.playback.is_running(),
            track_path: self.playback.track().path().map(Path::to_path_buf),
            active: self.playback.is_active(),
            current_line: self.playback.track().current_line(),
            gpio_enabled: output.gpio_enabled,
            usb_enabled: output.usb_enabled,
            utc_time: DateTime::from_timestamp_millis(self.time.extrapolated_epoch_ms())
                .unwrap_or_default(),
            counters: self.stats.stats().clone(),
        }
    }

    pub fn recent_bursts(&self, count: usize) -> Vec<BurstRecord> {
        self.stats.recent(count)
    }

    pub fn router_mut(&mut self) -> &mut OutputRouter {
        &mut self.router
    }

    /// Stop playback and release the track
    pub fn shutdown(&mut self) {
        self.playback.unload();
        tracing::info!(bursts = self.stats.stats().bursts_sent, "Simulator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::verify;
    use crate::output::{Channel, MemorySink};
    use crate::time::source::tests::{candidates, FakeFetcher, FakeNetwork, NetLog};
    use crate::time::{ManualClock, PreferenceStore, TimeSettings};
    use crate::track::schema::tests::row;
    use std::io::Write;
    use std::sync::Mutex;

    struct Rig {
        sim: Simulator,
        gpio: MemorySink,
        usb: MemorySink,
        clock: ManualClock,
        net: Arc<Mutex<NetLog>>,
    }

    fn rig(answers: Vec<Option<i64>>) -> Rig {
        let clock = ManualClock::starting_at(10_000);
        let net = Arc::new(Mutex::new(NetLog {
            reachable: vec!["alpha".to_string()],
            ..Default::default()
        }));
        let time = TimeSource::new(
            TimeSettings {
                candidates: candidates(),
                ..Default::default()
            },
            Box::new(FakeNetwork(Arc::clone(&net))),
            Box::new(FakeFetcher {
                answers,
                clock: clock.clone(),
            }),
            Arc::new(clock.clone()),
            PreferenceStore::in_memory(),
        );

        let gpio = MemorySink::new();
        let usb = MemorySink::new();
        let mut router = OutputRouter::new();
        router.attach(Channel::Gpio, Box::new(gpio.clone()));
        router.attach(Channel::Usb, Box::new(usb.clone()));

        Rig {
            sim: Simulator::new(time, router, Arc::new(clock.clone())),
            gpio,
            usb,
            clock,
            net,
        }
    }

    fn track(rows: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "header").unwrap();
        for i in 0..rows {
            let coords = format!("\"[51.{}, -0.5]\"", i + 1);
            writeln!(file, "{}", row("000000", &coords, "45", "3", "1.1", "9")).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_burst_uses_network_time() {
        let mut rig = rig(vec![Some(1_753_187_719)]); // 2025-07-22T12:35:19Z
        rig.sim.establish_network().unwrap();
        let file = track(3);
        rig.sim.load_track(file.path()).unwrap();
        rig.sim.start().unwrap();

        let outcome = rig.sim.poll();
        assert!(matches!(outcome, TickOutcome::Emitted { line: 1, .. }));
        let sent = rig.usb.sentences();
        assert_eq!(sent.len(), 8);
        assert!(sent[0].starts_with("$GNRMC,123519.00,A,"));
        assert!(sent.iter().all(|s| verify(s)));
        assert_eq!(rig.gpio.sentences(), sent);
        assert_eq!(rig.sim.status_snapshot().current_line, 2);
    }

    #[test]
    fn test_output_config_applies_next_tick() {
        let mut rig = rig(vec![None]);
        let file = track(2);
        rig.sim.load_track(file.path()).unwrap();
        rig.sim.start().unwrap();
        rig.sim.poll();

        rig.sim.set_output_config(false, true).unwrap();
        rig.gpio.clear();
        rig.usb.clear();
        rig.clock.advance(Duration::from_secs(1));
        rig.sim.poll();
        assert!(rig.gpio.contents().is_empty());
        assert_eq!(rig.usb.sentences().len(), 8);
    }

    #[test]
    fn test_rejected_output_config_unchanged() {
        let mut rig = rig(vec![None]);
        rig.sim.set_output_config(true, false).unwrap();
        assert_eq!(
            rig.sim.set_output_config(false, false),
            Err(ValidationError::AllOutputsDisabled)
        );
        let status = rig.sim.status_snapshot();
        assert!(status.gpio_enabled);
        assert!(!status.usb_enabled);
    }

    #[test]
    fn test_toggle_and_reload() {
        let mut rig = rig(vec![None]);
        assert!(matches!(rig.sim.toggle(), Err(PlaybackError::NoTrackLoaded)));
        assert!(matches!(rig.sim.reload_track(), Err(PlaybackError::NoTrackLoaded)));

        let file = track(3);
        rig.sim.load_track(file.path()).unwrap();
        assert_eq!(rig.sim.toggle().unwrap(), PlaybackState::Active);
        rig.sim.poll();
        assert_eq!(rig.sim.status_snapshot().current_line, 2);

        rig.sim.reload_track().unwrap();
        let status = rig.sim.status_snapshot();
        assert!(!status.active);
        assert_eq!(status.current_line, 0);
        assert_eq!(rig.sim.toggle().unwrap(), PlaybackState::Active);
        assert_eq!(rig.sim.toggle().unwrap(), PlaybackState::Stopped);
    }

    #[test]
    fn test_failed_load_reported() {
        let mut rig = rig(vec![None]);
        let err = rig.sim.load_track("/no/such/track.csv").unwrap_err();
        assert!(matches!(err, TrackError::NotFound(_)));
        assert!(!rig.sim.status_snapshot().track_loaded);
    }

    #[test]
    fn test_counters_in_status() {
        let mut rig = rig(vec![None]);
        let file = track(1);
        rig.sim.load_track(file.path()).unwrap();
        rig.sim.start().unwrap();
        for _ in 0..3 {
            rig.sim.poll();
            rig.clock.advance(Duration::from_secs(1));
        }
        let counters = rig.sim.status_snapshot().counters;
        assert_eq!(counters.bursts_sent, 3);
        assert_eq!(counters.sentences_sent, 24);
        assert_eq!(counters.track_wraps, 3);
        assert_eq!(rig.sim.recent_bursts(2).len(), 2);
    }

    #[test]
    fn test_forced_sync_from_access_point() {
        let mut rig = rig(vec![Some(1_753_187_719)]);
        rig.sim.switch_mode(NetworkMode::AccessPoint).unwrap();
        rig.sim.request_sync(true).unwrap();

        let status = rig.sim.status_snapshot();
        assert_eq!(status.mode, NetworkMode::AccessPoint);
        assert!(!status.connected);
        assert!(rig.net.lock().unwrap().ap_up);
        assert_eq!(status.last_sync_age_secs, Some(0));
        assert_eq!(status.utc_time.timestamp(), 1_753_187_719);
    }

    #[test]
    fn test_snapshot_serializes() {
        let rig = rig(vec![None]);
        let json = serde_json::to_value(rig.sim.status_snapshot()).unwrap();
        assert_eq!(json["mode"], "client");
        assert_eq!(json["sync_status"]["state"], "never_synchronized");
        assert_eq!(json["track_loaded"], false);
    }
}
