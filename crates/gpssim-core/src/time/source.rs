//! Authoritative UTC time and the client / access point mode machine
//!
//! ## Time resolution
//!
//! [`TimeSource::now`] picks, in order:
//! 1. Client mode with connectivity: network time, refreshed at most once per
//!    `refresh_interval` and extrapolated in between
//! 2. Any earlier successful sync: `epoch + (now_ms - sync_ms) / 1000`
//! 3. Never synchronized: a fixed anchor epoch plus monotonic uptime
//!
//! ## Modes
//!
//! Client mode joins one of an ordered list of networks; access point mode
//! hosts a fixed local network and has no route to time servers. A sync
//! requested in access point mode borrows a client connection and always puts
//! the access point back before returning.

use super::clock::MonotonicClock;
use super::network::{AccessPointConfig, NetworkBackend, NetworkCandidate};
use super::ntp::TimeFetcher;
use super::preference::PreferenceStore;
use super::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 2024-01-01T00:00:00Z, reported before any sync has succeeded
pub const DEFAULT_FALLBACK_EPOCH: i64 = 1_704_067_200;

/// Minimum spacing between unforced sync attempts
pub const SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Budget for one sync attempt, retries included
pub const SYNC_DEADLINE: Duration = Duration::from_secs(10);

/// Pause between network time requests within a sync attempt
pub const SYNC_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Network mode (mutually exclusive postures)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    /// Joined to an existing network; network time is reachable
    #[default]
    Client,
    /// Hosting a local network; no route to time servers
    AccessPoint,
}

impl NetworkMode {
    /// Token written to the preference file
    pub fn as_token(self) -> &'static str {
        match self {
            NetworkMode::Client => "client",
            NetworkMode::AccessPoint => "access_point",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "client" => Some(NetworkMode::Client),
            "access_point" => Some(NetworkMode::AccessPoint),
            _ => None,
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Whether network time has ever been obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    NeverSynchronized,
    Synchronized {
        /// Unix seconds reported by the server
        epoch_seconds: i64,
        /// Monotonic clock reading when the reply arrived
        monotonic_ms: u64,
    },
}

/// Mutable state owned by the time source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeSourceState {
    pub mode: NetworkMode,
    pub sync: SyncStatus,
    /// Monotonic time of the last sync attempt (successful or not)
    pub last_sync_attempt_ms: Option<u64>,
    /// Monotonic time of the last background refresh in client mode
    pub last_refresh_ms: Option<u64>,
}

/// Tunables for the time source
#[derive(Debug, Clone)]
pub struct TimeSettings {
    /// Client networks in the order they are tried
    pub candidates: Vec<NetworkCandidate>,
    pub access_point: AccessPointConfig,
    pub sync_interval: Duration,
    /// Deadline and retry interval for one sync attempt
    pub sync_policy: RetryPolicy,
    /// How often client mode re-reads network time
    pub refresh_interval: Duration,
    /// Cap on a single network time request
    pub request_timeout: Duration,
    /// Poll interval while waiting for a client association
    pub connect_poll_interval: Duration,
    /// Epoch reported at zero uptime when never synchronized
    pub fallback_epoch: i64,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            access_point: AccessPointConfig::default(),
            sync_interval: SYNC_INTERVAL,
            sync_policy: RetryPolicy::new(SYNC_DEADLINE, SYNC_RETRY_INTERVAL),
            refresh_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(2),
            connect_poll_interval: Duration::from_millis(100),
            fallback_epoch: DEFAULT_FALLBACK_EPOCH,
        }
    }
}

/// Errors from switching network mode
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModeError {
    #[error("A mode switch or sync is already in progress")]
    AlreadyInProgress,

    #[error("Could not join any of {tried} configured networks")]
    AllCandidatesFailed { tried: usize },

    #[error("Failed to apply network configuration: {0}")]
    ConfigApplyFailed(String),
}

/// Errors from a network time sync, by failing stage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Sync attempted too recently, retry in {}s", retry_in.as_secs())]
    RateLimited { retry_in: Duration },

    #[error("No network connectivity")]
    NoConnectivity,

    #[error("No network time after {attempts} attempts in {}ms", elapsed.as_millis())]
    Timeout { attempts: u32, elapsed: Duration },

    #[error("Access point could not be restored after sync: {0}")]
    RestoreFailed(String),

    #[error("A mode switch or sync is already in progress")]
    Busy,
}

/// Outcome of the borrowed client connection used by an access point sync
enum BorrowedClient {
    ConnectFailed(ModeError),
    FetchFailed(SyncError),
    Fetched { epoch_seconds: i64, at_ms: u64 },
}

/// Time source and network mode state machine
pub struct TimeSource {
    state: TimeSourceState,
    settings: TimeSettings,
    network: Box<dyn NetworkBackend>,
    fetcher: Box<dyn TimeFetcher>,
    clock: Arc<dyn MonotonicClock>,
    preference: PreferenceStore,
}

impl TimeSource {
    /// Create a time source in the persisted mode
    ///
    /// No network action is taken; call [`TimeSource::establish`] to bring the
    /// posture up.
    pub fn new(
        settings: TimeSettings,
        network: Box<dyn NetworkBackend>,
        fetcher: Box<dyn TimeFetcher>,
        clock: Arc<dyn MonotonicClock>,
        preference: PreferenceStore,
    ) -> Self {
        let state = TimeSourceState {
            mode: preference.load(),
            ..Default::default()
        };
        Self {
            state,
            settings,
            network,
            fetcher,
            clock,
            preference,
        }
    }

    pub fn state(&self) -> TimeSourceState {
        self.state
    }

    pub fn mode(&self) -> NetworkMode {
        self.state.mode
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.state.sync
    }

    pub fn settings(&self) -> &TimeSettings {
        &self.settings
    }

    /// Client connectivity (always false in access point mode)
    pub fn is_connected(&self) -> bool {
        self.state.mode == NetworkMode::Client && self.network.is_connected()
    }

    pub fn local_address(&self) -> Option<std::net::IpAddr> {
        self.network.local_address()
    }

    /// Time since network time was last obtained
    pub fn last_sync_age(&self) -> Option<Duration> {
        match self.state.sync {
            SyncStatus::Synchronized { monotonic_ms, .. } => Some(Duration::from_millis(
                self.clock.now_ms().saturating_sub(monotonic_ms),
            )),
            SyncStatus::NeverSynchronized => None,
        }
    }

    /// Bring up the posture for the current mode (used at startup)
    pub fn establish(&mut self) -> Result<(), ModeError> {
        let mode = self.state.mode;
        tracing::info!(%mode, "Establishing network mode");
        self.bring_up(mode)
    }

    /// Switch to `target` mode
    ///
    /// On failure the previous posture is re-established and the mode is unchanged.
    pub fn switch_mode(&mut self, target: NetworkMode) -> Result<(), ModeError> {
        let previous = self.state.mode;
        if previous == target {
            tracing::debug!(mode = %target, "Already in requested mode");
            return Ok(());
        }

        tracing::info!(from = %previous, to = %target, "Switching network mode");
        self.tear_down(previous);

        let applied = self.bring_up(target).and_then(|()| {
            self.preference
                .save(target)
                .map_err(|e| ModeError::ConfigApplyFailed(format!("saving preference: {}", e)))
        });

        if let Err(e) = applied {
            tracing::warn!(error = %e, from = %previous, to = %target, "Mode switch failed, restoring previous mode");
            self.tear_down(target);
            if let Err(restore) = self.bring_up(previous) {
                tracing::error!(error = %restore, mode = %previous, "Previous mode could not be restored");
            }
            return Err(e);
        }

        self.state.mode = target;
        // Client mode reads network time on the next tick
        self.state.last_refresh_ms = None;
        tracing::info!(mode = %target, "Network mode switched");
        Ok(())
    }

    /// Synchronize with network time
    ///
    /// Rate-limited to one attempt per `sync_interval` unless `force` is set.
    /// In access point mode the access point is restored on every path.
    pub fn sync(&mut self, force: bool) -> Result<(), SyncError> {
        let now_ms = self.clock.now_ms();

        if !force {
            if let Some(last) = self.state.last_sync_attempt_ms {
                let since = Duration::from_millis(now_ms.saturating_sub(last));
                if since < self.settings.sync_interval {
                    return Err(SyncError::RateLimited {
                        retry_in: self.settings.sync_interval - since,
                    });
                }
            }
        }
        self.state.last_sync_attempt_ms = Some(now_ms);

        let result = match self.state.mode {
            NetworkMode::Client => self.sync_direct(),
            NetworkMode::AccessPoint => self.sync_via_borrowed_client(),
        };

        match &result {
            Ok(()) => tracing::info!(mode = %self.state.mode, "Network time synchronized"),
            Err(e) => tracing::warn!(mode = %self.state.mode, error = %e, "Network time sync failed"),
        }
        result
    }

    /// Authoritative UTC time
    pub fn now(&mut self) -> DateTime<Utc> {
        if self.state.mode == NetworkMode::Client {
            self.refresh_if_due();
        }
        let ms = self.extrapolated_epoch_ms();
        DateTime::from_timestamp_millis(ms).unwrap_or_default()
    }

    /// Periodic housekeeping: refresh network time in client mode when due
    pub fn refresh(&mut self) {
        if self.state.mode == NetworkMode::Client {
            self.refresh_if_due();
        }
    }

    /// Epoch milliseconds without touching the network
    pub fn extrapolated_epoch_ms(&self) -> i64 {
        let mono = self.clock.now_ms();
        match self.state.sync {
            SyncStatus::Synchronized {
                epoch_seconds,
                monotonic_ms,
            } => epoch_seconds * 1000 + mono.saturating_sub(monotonic_ms) as i64,
            SyncStatus::NeverSynchronized => self.settings.fallback_epoch * 1000 + mono as i64,
        }
    }

    fn refresh_if_due(&mut self) {
        let now_ms = self.clock.now_ms();
        let due = self.state.last_refresh_ms.map_or(true, |last| {
            Duration::from_millis(now_ms.saturating_sub(last)) >= self.settings.refresh_interval
        });
        if !due || !self.network.is_connected() {
            return;
        }

        self.state.last_refresh_ms = Some(now_ms);
        match self.fetcher.fetch(self.settings.request_timeout) {
            Ok(epoch_seconds) => self.record_sync(epoch_seconds, self.clock.now_ms()),
            Err(e) => tracing::debug!(error = %e, "Network time refresh failed"),
        }
    }

    fn record_sync(&mut self, epoch_seconds: i64, at_ms: u64) {
        tracing::debug!(epoch_seconds, "Network time recorded");
        self.state.sync = SyncStatus::Synchronized {
            epoch_seconds,
            monotonic_ms: at_ms,
        };
    }

    fn sync_direct(&mut self) -> Result<(), SyncError> {
        if !self.network.is_connected() {
            return Err(SyncError::NoConnectivity);
        }
        let (epoch_seconds, at_ms) = self.fetch_with_retry()?;
        self.record_sync(epoch_seconds, at_ms);
        Ok(())
    }

    fn sync_via_borrowed_client(&mut self) -> Result<(), SyncError> {
        tracing::info!("Leaving access point temporarily for network time");

        let borrowed = self.borrow_client();
        let restored = self.restore_access_point();

        match (borrowed, restored) {
            (BorrowedClient::Fetched { epoch_seconds, at_ms }, Ok(())) => {
                self.record_sync(epoch_seconds, at_ms);
                Ok(())
            }
            (BorrowedClient::Fetched { epoch_seconds, at_ms }, Err(e)) => {
                // The time itself is good even though the access point is not back
                self.record_sync(epoch_seconds, at_ms);
                Err(e)
            }
            (BorrowedClient::ConnectFailed(e), Ok(())) => {
                tracing::debug!(error = %e, "Borrowed client connection failed");
                Err(SyncError::NoConnectivity)
            }
            (BorrowedClient::FetchFailed(e), Ok(())) => Err(e),
            (_, Err(e)) => Err(e),
        }
    }

    /// Connect as a client and fetch time, without touching the mode or preference
    fn borrow_client(&mut self) -> BorrowedClient {
        self.tear_down(NetworkMode::AccessPoint);
        if let Err(e) = self.connect_client() {
            return BorrowedClient::ConnectFailed(e);
        }
        match self.fetch_with_retry() {
            Ok((epoch_seconds, at_ms)) => BorrowedClient::Fetched {
                epoch_seconds,
                at_ms,
            },
            Err(e) => BorrowedClient::FetchFailed(e),
        }
    }

    fn restore_access_point(&mut self) -> Result<(), SyncError> {
        self.tear_down(NetworkMode::Client);
        self.bring_up(NetworkMode::AccessPoint)
            .map_err(|e| SyncError::RestoreFailed(e.to_string()))?;
        tracing::info!("Access point restored");
        Ok(())
    }

    fn fetch_with_retry(&mut self) -> Result<(i64, u64), SyncError> {
        let clock = Arc::clone(&self.clock);
        let request_cap = self.settings.request_timeout;
        let fetcher = &mut self.fetcher;

        self.settings
            .sync_policy
            .run(clock.as_ref(), |remaining| {
                fetcher
                    .fetch(remaining.min(request_cap))
                    .map(|epoch| (epoch, clock.now_ms()))
            })
            .map_err(|exhausted| {
                if let Some(e) = &exhausted.last_error {
                    tracing::debug!(error = %e, attempts = exhausted.attempts, "Network time retries exhausted");
                }
                SyncError::Timeout {
                    attempts: exhausted.attempts,
                    elapsed: exhausted.elapsed,
                }
            })
    }

    fn bring_up(&mut self, mode: NetworkMode) -> Result<(), ModeError> {
        match mode {
            NetworkMode::Client => self.connect_client().map(|_| ()),
            NetworkMode::AccessPoint => {
                let config = self.settings.access_point.clone();
                self.network
                    .start_access_point(&config)
                    .map_err(|e| ModeError::ConfigApplyFailed(e.to_string()))?;
                tracing::info!(ssid = %config.ssid, address = %config.address, "Access point up");
                Ok(())
            }
        }
    }

    fn tear_down(&mut self, mode: NetworkMode) {
        let result = match mode {
            NetworkMode::Client => self.network.disconnect(),
            NetworkMode::AccessPoint => self.network.stop_access_point(),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, %mode, "Tear-down reported an error");
        }
    }

    /// Try each candidate in order; returns the label of the joined network
    fn connect_client(&mut self) -> Result<String, ModeError> {
        let candidates = self.settings.candidates.clone();
        let clock = Arc::clone(&self.clock);

        for candidate in &candidates {
            tracing::info!(network = %candidate.label, "Connecting");
            if let Err(e) = self.network.connect(candidate) {
                tracing::warn!(network = %candidate.label, error = %e, "Connect failed");
                continue;
            }

            let wait = RetryPolicy::new(
                Duration::from_millis(candidate.timeout_ms),
                self.settings.connect_poll_interval,
            );
            let network = &self.network;
            if wait.wait_until(clock.as_ref(), || network.is_connected()) {
                tracing::info!(network = %candidate.label, "Connected");
                return Ok(candidate.label.clone());
            }
            tracing::warn!(network = %candidate.label, timeout_ms = candidate.timeout_ms, "Connection timed out");
        }

        Err(ModeError::AllCandidatesFailed {
            tried: candidates.len(),
        })
    }
}
