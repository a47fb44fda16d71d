//! Persistent application configuration
//!
//! Stores the track location, output ports, and network settings in a JSON
//! file at `<data_dir>/gpssim/config.json`. Command line flags override
//! individual values for one run without touching the file.

use gpssim_core::output::{OutputConfig, ValidationError};
use gpssim_core::time::{
    AccessPointConfig, NetworkBackend, NetworkCandidate, NmcliBackend, PreferenceStore,
    SntpClient, StaticBackend, TimeFetcher, TimeSettings, DEFAULT_NTP_SERVER,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where a loaded config came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Missing,
    /// File present but unreadable as config; holds the parse error
    Invalid(String),
}

impl ConfigSource {
    pub fn log(&self, path: &Path) {
        match self {
            Self::File => tracing::info!(path = %path.display(), "Loaded config from disk"),
            Self::Missing => {
                tracing::info!(path = %path.display(), "No config file found, using defaults")
            }
            Self::Invalid(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults")
            }
        }
    }
}

fn default_usb_port() -> Option<String> {
    Some("-".to_string())
}

fn default_baud_rate() -> u32 {
    gpssim_core::DEFAULT_BAUD_RATE
}

fn default_true() -> bool {
    true
}

fn default_interface() -> String {
    "wlan0".to_string()
}

fn default_ntp_server() -> String {
    DEFAULT_NTP_SERVER.to_string()
}

fn default_fallback_epoch() -> i64 {
    gpssim_core::time::source::DEFAULT_FALLBACK_EPOCH
}

/// How network postures are applied on this host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Host networking is managed elsewhere; access point mode unavailable
    #[default]
    Static,
    /// NetworkManager via `nmcli`
    Nmcli,
}

/// Persistent application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Track file loaded at startup (None = wait for `load`)
    #[serde(default)]
    pub track: Option<PathBuf>,
    /// Begin playback as soon as the track is loaded
    #[serde(default)]
    pub autostart: bool,
    /// GPIO UART device path (None = channel has no sink)
    #[serde(default)]
    pub gpio_port: Option<String>,
    /// USB serial device path, `-` for stdout
    #[serde(default = "default_usb_port")]
    pub usb_port: Option<String>,
    /// Line rate the serial devices are expected to run at
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_true")]
    pub gpio_enabled: bool,
    #[serde(default = "default_true")]
    pub usb_enabled: bool,
    #[serde(default)]
    pub network_backend: BackendKind,
    /// Wireless interface for the nmcli backend
    #[serde(default = "default_interface")]
    pub wifi_interface: String,
    /// Client networks, tried in order
    #[serde(default)]
    pub networks: Vec<NetworkCandidate>,
    #[serde(default)]
    pub access_point: AccessPointConfig,
    #[serde(default = "default_ntp_server")]
    pub ntp_server: String,
    /// Network mode preference file (None = next to the config file)
    #[serde(default)]
    pub preference_path: Option<PathBuf>,
    /// Epoch reported at zero uptime before the first sync
    #[serde(default = "default_fallback_epoch")]
    pub fallback_epoch: i64,
    /// Directory for daily rolling log files (None = console only)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            track: None,
            autostart: false,
            gpio_port: None,
            usb_port: default_usb_port(),
            baud_rate: default_baud_rate(),
            gpio_enabled: true,
            usb_enabled: true,
            network_backend: BackendKind::default(),
            wifi_interface: default_interface(),
            networks: Vec::new(),
            access_point: AccessPointConfig::default(),
            ntp_server: default_ntp_server(),
            preference_path: None,
            fallback_epoch: default_fallback_epoch(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Directory holding the config and the mode preference
    pub fn dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gpssim")
    }

    /// Config file path: `<data_dir>/gpssim/config.json`
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from disk, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        let (config, source) = Self::read_from(path);
        source.log(path);
        config
    }

    /// Read config without logging; the caller reports the source once logging is up
    pub fn read_from(path: &Path) -> (Self, ConfigSource) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => (config, ConfigSource::File),
                Err(e) => (Self::default(), ConfigSource::Invalid(e.to_string())),
            },
            Err(_) => (Self::default(), ConfigSource::Missing),
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    /// Initial output enables, validated
    pub fn output_config(&self) -> Result<OutputConfig, ValidationError> {
        OutputConfig::new(self.gpio_enabled, self.usb_enabled)
    }

    pub fn time_settings(&self) -> TimeSettings {
        TimeSettings {
            candidates: self.networks.clone(),
            access_point: self.access_point.clone(),
            fallback_epoch: self.fallback_epoch,
            ..Default::default()
        }
    }

    pub fn preference_store(&self) -> PreferenceStore {
        let path = self
            .preference_path
            .clone()
            .unwrap_or_else(|| Self::dir().join("network_mode"));
        PreferenceStore::new(path)
    }

    pub fn time_fetcher(&self) -> Box<dyn TimeFetcher> {
        Box::new(SntpClient::new(&self.ntp_server))
    }

    pub fn network_backend(&self) -> Box<dyn NetworkBackend> {
        match self.network_backend {
            BackendKind::Static => Box::new(StaticBackend::new()),
            BackendKind::Nmcli => Box::new(NmcliBackend::new(&self.wifi_interface)),
        }
    }
}
