//! Time source and network mode state machine
//!
//! Decides which UTC value is authoritative and arbitrates between the two
//! mutually exclusive network postures:
//! - Monotonic clocks, real and manual ([`clock`])
//! - Deadline/interval retry policy ([`retry`])
//! - Network posture backends ([`network`])
//! - SNTP network time client ([`ntp`])
//! - Persisted mode preference ([`preference`])
//! - The [`TimeSource`] state machine itself ([`source`])

pub mod clock;
pub mod network;
pub mod ntp;
pub mod preference;
pub mod retry;
pub mod source;

pub use clock::{ManualClock, MonotonicClock, SystemClock};
pub use network::{
    AccessPointConfig, NetworkBackend, NetworkCandidate, NetworkError, NmcliBackend, StaticBackend,
};
pub use ntp::{NtpError, SntpClient, TimeFetcher, DEFAULT_NTP_SERVER};
pub use preference::PreferenceStore;
pub use retry::RetryPolicy;
pub use source::{
    ModeError, NetworkMode, SyncError, SyncStatus, TimeSettings, TimeSource, TimeSourceState,
};
