//! Network posture backends
//!
//! A backend can join an existing network as a client or host its own access
//! point, never both. The [`super::TimeSource`] state machine decides which one
//! is active; backends only execute the individual steps.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::process::Command;
use thiserror::Error;

fn default_connect_timeout_ms() -> u64 {
    10_000
}

/// A network to try in client mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCandidate {
    /// Human readable name used in logs and status
    pub label: String,
    pub ssid: String,
    #[serde(default)]
    pub password: String,
    /// How long to wait for the association before moving on
    #[serde(default = "default_connect_timeout_ms")]
    pub timeout_ms: u64,
}

/// Fixed local parameters for access point mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPointConfig {
    pub ssid: String,
    pub password: String,
    /// Address the simulator serves on while hosting
    pub address: String,
    pub gateway: String,
    pub netmask: String,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid: "GPS-Simulator".to_string(),
            password: "gpssim123".to_string(),
            address: "192.168.4.1".to_string(),
            gateway: "192.168.4.1".to_string(),
            netmask: "255.255.255.0".to_string(),
        }
    }
}

/// Errors reported by a network backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Failed to join network {ssid}: {reason}")]
    ConnectFailed { ssid: String, reason: String },

    #[error("Access point could not be started: {0}")]
    AccessPointFailed(String),

    #[error("Access point mode is not supported by this backend")]
    AccessPointUnsupported,

    #[error("Network command failed: {0}")]
    Command(String),
}

/// Steps for bringing network postures up and down
pub trait NetworkBackend: Send {
    /// Begin joining a network; completion is observed through [`NetworkBackend::is_connected`]
    fn connect(&mut self, candidate: &NetworkCandidate) -> Result<(), NetworkError>;

    /// Whether client-mode connectivity is currently established
    fn is_connected(&self) -> bool;

    /// Leave the current client network
    fn disconnect(&mut self) -> Result<(), NetworkError>;

    fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<(), NetworkError>;

    fn stop_access_point(&mut self) -> Result<(), NetworkError>;

    /// Local address for status display
    fn local_address(&self) -> Option<IpAddr> {
        None
    }
}

/// Host networking managed outside the simulator
///
/// Client mode is assumed to be up whenever the host is; access point mode
/// cannot be entered.
#[derive(Debug, Clone)]
pub struct StaticBackend {
    connected: bool,
}

impl StaticBackend {
    pub fn new() -> Self {
        Self { connected: true }
    }
}

impl Default for StaticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkBackend for StaticBackend {
    fn connect(&mut self, candidate: &NetworkCandidate) -> Result<(), NetworkError> {
        tracing::debug!(network = %candidate.label, "Static backend: host network assumed up");
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) -> Result<(), NetworkError> {
        Ok(())
    }

    fn start_access_point(&mut self, _config: &AccessPointConfig) -> Result<(), NetworkError> {
        Err(NetworkError::AccessPointUnsupported)
    }

    fn stop_access_point(&mut self) -> Result<(), NetworkError> {
        Ok(())
    }
}

/// NetworkManager backend driven through `nmcli`
#[derive(Debug, Clone)]
pub struct NmcliBackend {
    /// Wireless interface, e.g. `wlan0`
    interface: String,
    /// Connection name used for the hotspot profile
    hotspot_name: String,
}

impl NmcliBackend {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            hotspot_name: "gpssim-hotspot".to_string(),
        }
    }

    fn nmcli(&self, args: &[&str]) -> Result<String, NetworkError> {
        tracing::trace!(?args, "nmcli");
        let output = Command::new("nmcli")
            .args(args)
            .output()
            .map_err(|e| NetworkError::Command(format!("nmcli: {}", e)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(NetworkError::Command(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

impl NetworkBackend for NmcliBackend {
    fn connect(&mut self, candidate: &NetworkCandidate) -> Result<(), NetworkError> {
        let mut args = vec!["device", "wifi", "connect", candidate.ssid.as_str()];
        if !candidate.password.is_empty() {
            args.extend(["password", candidate.password.as_str()]);
        }
        args.extend(["ifname", self.interface.as_str()]);

        self.nmcli(&args)
            .map(|_| ())
            .map_err(|e| NetworkError::ConnectFailed {
                ssid: candidate.ssid.clone(),
                reason: e.to_string(),
            })
    }

    fn is_connected(&self) -> bool {
        self.nmcli(&["-t", "-f", "STATE", "general"])
            .map(|state| state.trim() == "connected")
            .unwrap_or(false)
    }

    fn disconnect(&mut self) -> Result<(), NetworkError> {
        self.nmcli(&["device", "disconnect", self.interface.as_str()])
            .map(|_| ())
    }

    fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<(), NetworkError> {
        self.nmcli(&[
            "device",
            "wifi",
            "hotspot",
            "ifname",
            self.interface.as_str(),
            "con-name",
            self.hotspot_name.as_str(),
            "ssid",
            config.ssid.as_str(),
            "password",
            config.password.as_str(),
        ])
        .map_err(|e| NetworkError::AccessPointFailed(e.to_string()))?;

        let address = format!("{}/{}", config.address, prefix_len(&config.netmask));
        self.nmcli(&[
            "connection",
            "modify",
            self.hotspot_name.as_str(),
            "ipv4.addresses",
            address.as_str(),
            "ipv4.gateway",
            config.gateway.as_str(),
        ])
        .map_err(|e| NetworkError::AccessPointFailed(e.to_string()))?;

        self.nmcli(&["connection", "up", self.hotspot_name.as_str()])
            .map(|_| ())
            .map_err(|e| NetworkError::AccessPointFailed(e.to_string()))
    }

    fn stop_access_point(&mut self) -> Result<(), NetworkError> {
        // Not an error if the hotspot was never up
        if let Err(e) = self.nmcli(&["connection", "down", self.hotspot_name.as_str()]) {
            tracing::debug!(error = %e, "Hotspot was not active");
        }
        Ok(())
    }

    fn local_address(&self) -> Option<IpAddr> {
        let out = self
            .nmcli(&["-g", "IP4.ADDRESS", "device", "show", self.interface.as_str()])
            .ok()?;
        out.lines()
            .next()
            .and_then(|l| l.split('/').next())
            .and_then(|a| a.trim().parse().ok())
    }
}

/// Prefix length of a dotted netmask (`255.255.255.0` -> 24)
fn prefix_len(netmask: &str) -> u32 {
    netmask
        .parse::<std::net::Ipv4Addr>()
        .map(|m| u32::from(m).count_ones())
        .unwrap_or(24)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_defaults() {
        let json = r#"{"label": "Home", "ssid": "home-net"}"#;
        let candidate: NetworkCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.password, "");
        assert_eq!(candidate.timeout_ms, 10_000);
    }

    #[test]
    fn test_prefix_len() {
        assert_eq!(prefix_len("255.255.255.0"), 24);
        assert_eq!(prefix_len("255.255.0.0"), 16);
        assert_eq!(prefix_len("garbage"), 24);
    }

    #[test]
    fn test_static_backend_refuses_access_point() {
        let mut backend = StaticBackend::new();
        assert!(backend.is_connected());
        assert_eq!(
            backend.start_access_point(&AccessPointConfig::default()),
            Err(NetworkError::AccessPointUnsupported)
        );
    }
}
