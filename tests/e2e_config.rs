//! E2E tests for persistent configuration
//!
//! Tests config round-trip, defaults for older files, and assembling a
//! simulator from a config.

use gpssim::config::{AppConfig, BackendKind};
use gpssim::output::Channel;
use gpssim::time::{NetworkCandidate, NetworkMode};
use gpssim::build_simulator;
use std::path::PathBuf;

#[test]
fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let config = AppConfig {
        track: Some(PathBuf::from("/data/track.csv")),
        autostart: true,
        gpio_port: Some("/dev/serial0".to_string()),
        usb_port: Some("/dev/ttyGS0".to_string()),
        usb_enabled: false,
        network_backend: BackendKind::Nmcli,
        networks: vec![NetworkCandidate {
            label: "Office".to_string(),
            ssid: "office".to_string(),
            password: "hunter2".to_string(),
            timeout_ms: 8000,
        }],
        ..Default::default()
    };
    config.save(&path).unwrap();

    assert_eq!(AppConfig::load_from(&path), config);
}

#[test]
fn test_old_config_gets_new_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"track": "walk.csv", "gpio_port": "/dev/serial0"}"#).unwrap();

    let config = AppConfig::load_from(&path);
    assert_eq!(config.track, Some(PathBuf::from("walk.csv")));
    assert_eq!(config.usb_port.as_deref(), Some("-"));
    assert_eq!(config.baud_rate, 9600);
    assert!(config.gpio_enabled && config.usb_enabled);
    assert!(!config.autostart);
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load_from(&dir.path().join("absent.json"));
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_build_simulator_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let gpio_path = dir.path().join("uart");
    let config = AppConfig {
        gpio_port: Some(gpio_path.display().to_string()),
        usb_port: None,
        usb_enabled: false,
        preference_path: Some(dir.path().join("network_mode")),
        ..Default::default()
    };

    let simulator = build_simulator(&config).unwrap();
    let status = simulator.status_snapshot();
    assert!(status.gpio_enabled);
    assert!(!status.usb_enabled);
    assert!(!status.track_loaded);
    assert!(!status.active);
    assert_eq!(status.mode, NetworkMode::Client);
    // Ports open lazily
    assert!(!gpio_path.exists());
}

#[test]
fn test_build_simulator_rejects_all_outputs_off() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        gpio_enabled: false,
        usb_enabled: false,
        preference_path: Some(dir.path().join("network_mode")),
        ..Default::default()
    };
    assert!(build_simulator(&config).is_err());
}

#[test]
fn test_preference_file_selects_startup_mode() {
    let dir = tempfile::tempdir().unwrap();
    let preference = dir.path().join("network_mode");
    std::fs::write(&preference, "access_point\n").unwrap();

    let config = AppConfig {
        preference_path: Some(preference),
        ..Default::default()
    };
    let simulator = build_simulator(&config).unwrap();
    assert_eq!(simulator.status_snapshot().mode, NetworkMode::AccessPoint);
}

#[test]
fn test_baud_rate_reaches_serial_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        gpio_port: Some("/dev/ttyAMA0".to_string()),
        usb_port: Some("-".to_string()),
        baud_rate: 4800,
        preference_path: Some(dir.path().join("network_mode")),
        ..Default::default()
    };

    let mut simulator = build_simulator(&config).unwrap();
    let router = simulator.router_mut();
    assert_eq!(
        router.sink_name(Channel::Gpio).as_deref(),
        Some("/dev/ttyAMA0 (4800 8N1)")
    );
    assert_eq!(router.sink_name(Channel::Usb).as_deref(), Some("stdout"));
}
