//! Thread-owned simulator with an async command handle
//!
//! The engine lives on a dedicated thread running a single-threaded tokio
//! runtime. The loop waits for either the next tick deadline or a control
//! command, so commands are applied between ticks and never concurrently.

use super::engine::{Simulator, StatusSnapshot};
use crate::output::ValidationError;
use crate::playback::{PlaybackError, PlaybackState, TickOutcome};
use crate::stats::BurstRecord;
use crate::time::{ModeError, NetworkMode, SyncError};
use crate::track::TrackError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Errors surfaced through the control handle
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Simulator thread stopped")]
    EngineStopped,

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Commands sent to the simulator thread
pub enum SimulatorCommand {
    LoadTrack {
        path: PathBuf,
        reply: oneshot::Sender<Result<(), TrackError>>,
    },
    ReloadTrack {
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    Start {
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Toggle {
        reply: oneshot::Sender<Result<PlaybackState, PlaybackError>>,
    },
    SetOutputConfig {
        gpio: bool,
        usb: bool,
        reply: oneshot::Sender<Result<(), ValidationError>>,
    },
    SwitchMode {
        target: NetworkMode,
        guard: TransitionGuard,
        reply: oneshot::Sender<Result<(), ModeError>>,
    },
    RequestSync {
        force: bool,
        guard: TransitionGuard,
        reply: oneshot::Sender<Result<(), SyncError>>,
    },
    GetStatus {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    RecentBursts {
        count: usize,
        reply: oneshot::Sender<Vec<BurstRecord>>,
    },
    Shutdown,
}

/// Held while a mode switch or sync is queued or running
///
/// Travels inside the command, so the flag clears only after the engine
/// thread has handled it, even if the caller stops waiting.
pub struct TransitionGuard(Arc<AtomicBool>);

impl TransitionGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for TransitionGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to communicate with the simulator thread
#[derive(Clone)]
pub struct SimulatorHandle {
    tx: mpsc::Sender<SimulatorCommand>,
    transition: Arc<AtomicBool>,
}

impl SimulatorHandle {
    /// Move the simulator onto its own thread and return a handle
    pub fn spawn(simulator: Simulator) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<SimulatorCommand>(32);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        std::thread::Builder::new()
            .name("gpssim-engine".to_string())
            .spawn(move || runtime.block_on(run_loop(simulator, rx)))?;

        Ok(Self {
            tx,
            transition: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SimulatorCommand,
    ) -> Result<T, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| ControlError::EngineStopped)?;
        rx.await.map_err(|_| ControlError::EngineStopped)
    }

    pub async fn load_track(&self, path: impl Into<PathBuf>) -> Result<(), ControlError> {
        let path = path.into();
        Ok(self
            .request(|reply| SimulatorCommand::LoadTrack { path, reply })
            .await??)
    }

    pub async fn reload_track(&self) -> Result<(), ControlError> {
        Ok(self
            .request(|reply| SimulatorCommand::ReloadTrack { reply })
            .await??)
    }

    pub async fn start(&self) -> Result<(), ControlError> {
        Ok(self.request(|reply| SimulatorCommand::Start { reply }).await??)
    }

    pub async fn stop(&self) -> Result<(), ControlError> {
        self.request(|reply| SimulatorCommand::Stop { reply }).await
    }

    pub async fn toggle(&self) -> Result<PlaybackState, ControlError> {
        Ok(self.request(|reply| SimulatorCommand::Toggle { reply }).await??)
    }

    pub async fn set_output_config(&self, gpio: bool, usb: bool) -> Result<(), ControlError> {
        Ok(self
            .request(|reply| SimulatorCommand::SetOutputConfig { gpio, usb, reply })
            .await??)
    }

    /// Switch network mode; rejected while another switch or sync is pending
    pub async fn switch_mode(&self, target: NetworkMode) -> Result<(), ControlError> {
        let guard =
            TransitionGuard::acquire(&self.transition).ok_or(ModeError::AlreadyInProgress)?;
        Ok(self
            .request(|reply| SimulatorCommand::SwitchMode {
                target,
                guard,
                reply,
            })
            .await??)
    }

    /// Synchronize network time; rejected while another switch or sync is pending
    pub async fn request_sync(&self, force: bool) -> Result<(), ControlError> {
        let guard = TransitionGuard::acquire(&self.transition).ok_or(SyncError::Busy)?;
        Ok(self
            .request(|reply| SimulatorCommand::RequestSync {
                force,
                guard,
                reply,
            })
            .await??)
    }

    pub async fn status(&self) -> Result<StatusSnapshot, ControlError> {
        self.request(|reply| SimulatorCommand::GetStatus { reply })
            .await
    }

    pub async fn recent_bursts(&self, count: usize) -> Result<Vec<BurstRecord>, ControlError> {
        self.request(|reply| SimulatorCommand::RecentBursts { count, reply })
            .await
    }

    /// Ask the thread to stop playback and exit
    pub async fn shutdown(&self) {
        let _ = self.tx.send(SimulatorCommand::Shutdown).await;
    }

    /// Whether a mode switch or sync is in flight
    pub fn transition_in_progress(&self) -> bool {
        self.transition.load(Ordering::Acquire)
    }
}

async fn run_loop(mut simulator: Simulator, mut rx: mpsc::Receiver<SimulatorCommand>) {
    tracing::debug!("Simulator loop running");

    loop {
        let wait = simulator.time_until_next_tick();
        tokio::select! {
            command = rx.recv() => match command {
                Some(SimulatorCommand::Shutdown) | None => break,
                Some(command) => dispatch(&mut simulator, command),
            },
            _ = tokio::time::sleep(wait) => {
                if let TickOutcome::Skipped { line } = simulator.poll() {
                    tracing::debug!(line, "Tick skipped");
                }
            }
        }
    }

    simulator.shutdown();
}

fn dispatch(simulator: &mut Simulator, command: SimulatorCommand) {
    match command {
        SimulatorCommand::LoadTrack { path, reply } => {
            let _ = reply.send(simulator.load_track(&path));
        }
        SimulatorCommand::ReloadTrack { reply } => {
            let _ = reply.send(simulator.reload_track());
        }
        SimulatorCommand::Start { reply } => {
            let _ = reply.send(simulator.start());
        }
        SimulatorCommand::Stop { reply } => {
            simulator.stop();
            let _ = reply.send(());
        }
        SimulatorCommand::Toggle { reply } => {
            let _ = reply.send(simulator.toggle());
        }
        SimulatorCommand::SetOutputConfig { gpio, usb, reply } => {
            let _ = reply.send(simulator.set_output_config(gpio, usb));
        }
        SimulatorCommand::SwitchMode {
            target,
            guard,
            reply,
        } => {
            let result = simulator.switch_mode(target);
            drop(guard);
            let _ = reply.send(result);
        }
        SimulatorCommand::RequestSync {
            force,
            guard,
            reply,
        } => {
            let result = simulator.request_sync(force);
            drop(guard);
            let _ = reply.send(result);
        }
        SimulatorCommand::GetStatus { reply } => {
            let _ = reply.send(simulator.status_snapshot());
        }
        SimulatorCommand::RecentBursts { count, reply } => {
            let _ = reply.send(simulator.recent_bursts(count));
        }
        SimulatorCommand::Shutdown => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Channel, MemorySink, OutputRouter};
    use crate::time::source::tests::FakeFetcher;
    use crate::time::{
        ManualClock, PreferenceStore, StaticBackend, SystemClock, TimeSettings, TimeSource,
    };
    use crate::track::schema::tests::row;
    use std::io::Write;
    use std::time::Duration;

    fn simulator_with_sink() -> (Simulator, MemorySink) {
        let clock = Arc::new(SystemClock::new());
        let time = TimeSource::new(
            TimeSettings::default(),
            Box::new(StaticBackend::new()),
            Box::new(FakeFetcher {
                answers: vec![Some(1_753_187_719)],
                clock: ManualClock::new(),
            }),
            clock.clone(),
            PreferenceStore::in_memory(),
        );
        let sink = MemorySink::new();
        let mut router = OutputRouter::new();
        router.attach(Channel::Usb, Box::new(sink.clone()));
        let simulator = Simulator::with_timing(
            time,
            router,
            clock,
            Duration::from_millis(20),
            Duration::ZERO,
        );
        (simulator, sink)
    }

    fn spawn_with_sink() -> (SimulatorHandle, MemorySink) {
        let (simulator, sink) = simulator_with_sink();
        (SimulatorHandle::spawn(simulator).unwrap(), sink)
    }

    fn track() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "header").unwrap();
        writeln!(file, "{}", row("000000", "\"[51.5, -0.1]\"", "0", "0", "1", "8")).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_handle_plays_track() {
        let (handle, sink) = spawn_with_sink();
        let file = track();

        handle.load_track(file.path()).await.unwrap();
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.stop().await.unwrap();

        let status = handle.status().await.unwrap();
        assert!(status.track_loaded);
        assert!(!status.active);
        assert!(status.counters.bursts_sent >= 2);
        assert_eq!(sink.sentences().len() as u64, status.counters.sentences_sent);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_handle_reports_errors() {
        let (handle, _) = spawn_with_sink();
        assert!(matches!(
            handle.start().await,
            Err(ControlError::Playback(PlaybackError::NoTrackLoaded))
        ));
        assert!(matches!(
            handle.set_output_config(false, false).await,
            Err(ControlError::Validation(ValidationError::AllOutputsDisabled))
        ));
        assert!(matches!(
            handle.load_track("/no/such.csv").await,
            Err(ControlError::Track(TrackError::NotFound(_)))
        ));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_transition_rejected_while_busy() {
        let (handle, _) = spawn_with_sink();
        let held = TransitionGuard::acquire(&handle.transition).unwrap();
        assert!(handle.transition_in_progress());
        assert!(matches!(
            handle.switch_mode(NetworkMode::AccessPoint).await,
            Err(ControlError::Mode(ModeError::AlreadyInProgress))
        ));
        assert!(matches!(
            handle.request_sync(true).await,
            Err(ControlError::Sync(SyncError::Busy))
        ));
        drop(held);
        assert!(!handle.transition_in_progress());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_abandoned_switch_stays_busy_until_dispatched() {
        // Handle over a channel nobody drains yet
        let (tx, mut rx) = mpsc::channel(4);
        let handle = SimulatorHandle {
            tx,
            transition: Arc::new(AtomicBool::new(false)),
        };

        let waited = tokio::time::timeout(
            Duration::from_millis(20),
            handle.switch_mode(NetworkMode::AccessPoint),
        )
        .await;
        assert!(waited.is_err());

        // The caller gave up but the switch is still queued
        assert!(handle.transition_in_progress());
        assert!(matches!(
            handle.request_sync(false).await,
            Err(ControlError::Sync(SyncError::Busy))
        ));

        let command = rx.recv().await.unwrap();
        assert!(matches!(command, SimulatorCommand::SwitchMode { .. }));
        assert!(handle.transition_in_progress());

        let (mut simulator, _) = simulator_with_sink();
        dispatch(&mut simulator, command);
        assert!(!handle.transition_in_progress());
    }

    #[tokio::test]
    async fn test_transition_released_after_reply() {
        let (handle, _) = spawn_with_sink();
        let _ = handle.request_sync(true).await;
        assert!(!handle.transition_in_progress());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_commands_fail_after_shutdown() {
        let (handle, _) = spawn_with_sink();
        handle.shutdown().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(handle.status().await, Err(ControlError::EngineStopped)));
    }
}
