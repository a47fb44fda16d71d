//! Interactive console commands
//!
//! One command per line on stdin, standing in for the device's buttons and
//! web routes.

use gpssim_core::stats::BurstRecord;
use gpssim_core::time::{NetworkMode, SyncStatus};
use gpssim_core::StatusSnapshot;
use std::path::PathBuf;
use thiserror::Error;

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    /// Start/stop toggle (button A)
    Toggle,
    /// Stop and reopen the track (button B)
    Reload,
    Load(PathBuf),
    Output { gpio: bool, usb: bool },
    Mode(NetworkMode),
    Sync { force: bool },
    Status,
    /// Show the most recent bursts
    Tail(usize),
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Unknown command: {0} (type 'help')")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Parse one line; `Ok(None)` for a blank line
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("start", []) => ConsoleCommand::Start,
        ("stop", []) => ConsoleCommand::Stop,
        ("toggle" | "a", []) => ConsoleCommand::Toggle,
        ("reload" | "b", []) => ConsoleCommand::Reload,
        ("load", []) => return Err(ConsoleError::Usage("load <path>")),
        ("load", _) => ConsoleCommand::Load(PathBuf::from(args.join(" "))),
        ("output", [gpio, usb]) => ConsoleCommand::Output {
            gpio: parse_switch(gpio).ok_or(ConsoleError::Usage(OUTPUT_USAGE))?,
            usb: parse_switch(usb).ok_or(ConsoleError::Usage(OUTPUT_USAGE))?,
        },
        ("output", _) => return Err(ConsoleError::Usage(OUTPUT_USAGE)),
        ("mode", ["client"]) => ConsoleCommand::Mode(NetworkMode::Client),
        ("mode", ["ap" | "access_point"]) => ConsoleCommand::Mode(NetworkMode::AccessPoint),
        ("mode", _) => return Err(ConsoleError::Usage("mode client|ap")),
        ("sync", []) => ConsoleCommand::Sync { force: false },
        ("sync", ["force"]) => ConsoleCommand::Sync { force: true },
        ("sync", _) => return Err(ConsoleError::Usage("sync [force]")),
        ("status", []) => ConsoleCommand::Status,
        ("tail", []) => ConsoleCommand::Tail(DEFAULT_TAIL),
        ("tail", [n]) => ConsoleCommand::Tail(
            n.parse()
                .map_err(|_| ConsoleError::Usage("tail [count]"))?,
        ),
        ("tail", _) => return Err(ConsoleError::Usage("tail [count]")),
        ("help" | "?", _) => ConsoleCommand::Help,
        ("quit" | "exit" | "q", _) => ConsoleCommand::Quit,
        _ => return Err(ConsoleError::Unknown(line.trim().to_string())),
    };
    Ok(Some(command))
}

/// Bursts shown by a bare `tail`
const DEFAULT_TAIL: usize = 10;

const OUTPUT_USAGE: &str = "output <gpio on|off> <usb on|off>";

fn parse_switch(word: &str) -> Option<bool> {
    match word.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Some(true),
        "off" | "0" | "false" => Some(false),
        _ => None,
    }
}

pub fn help_text() -> &'static str {
    "Commands:
  start | stop            Start or stop sentence output
  toggle                  Start/stop toggle
  reload                  Stop and reopen the current track
  load <path>             Load a track file
  output <gpio> <usb>     Enable channels (on|off each, at least one on)
  mode client|ap          Switch network mode
  sync [force]            Synchronize network time
  status                  Show full status
  tail [count]            Show the last bursts sent (default 10)
  quit                    Exit"
}

/// One-line summary for the periodic status display
pub fn status_line(status: &StatusSnapshot) -> String {
    let sync = match (status.sync_status, status.last_sync_age_secs) {
        (SyncStatus::Synchronized { .. }, Some(age)) => format!("synced {}s ago", age),
        _ => "never synced".to_string(),
    };
    format!(
        "{} | GPS: {} | line {} | {} | {} | GPIO:{} USB:{} | bursts {}",
        status.utc_time.format("%H:%M:%S"),
        if status.active { "Active" } else { "Stopped" },
        status.current_line,
        status.mode,
        sync,
        on_off(status.gpio_enabled),
        on_off(status.usb_enabled),
        status.counters.bursts_sent,
    )
}

/// One burst from the history, e.g. `12:35:19 #42 51.459595,-0.547948`
pub fn burst_line(record: &BurstRecord) -> String {
    format!(
        "{} #{} {:.6},{:.6}",
        record.timestamp.format("%H:%M:%S"),
        record.line,
        record.latitude,
        record.longitude
    )
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gpssim_core::stats::PlaybackStats;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("start"), Ok(Some(ConsoleCommand::Start)));
        assert_eq!(parse_command("  STOP "), Ok(Some(ConsoleCommand::Stop)));
        assert_eq!(parse_command("a"), Ok(Some(ConsoleCommand::Toggle)));
        assert_eq!(parse_command("b"), Ok(Some(ConsoleCommand::Reload)));
        assert_eq!(parse_command(""), Ok(None));
        assert_eq!(parse_command("q"), Ok(Some(ConsoleCommand::Quit)));
    }

    #[test]
    fn test_parse_load_keeps_spaces() {
        assert_eq!(
            parse_command("load /data/my track.csv"),
            Ok(Some(ConsoleCommand::Load(PathBuf::from("/data/my track.csv"))))
        );
        assert!(matches!(parse_command("load"), Err(ConsoleError::Usage(_))));
    }

    #[test]
    fn test_parse_output() {
        assert_eq!(
            parse_command("output off on"),
            Ok(Some(ConsoleCommand::Output { gpio: false, usb: true }))
        );
        assert!(matches!(parse_command("output maybe on"), Err(ConsoleError::Usage(_))));
        assert!(matches!(parse_command("output on"), Err(ConsoleError::Usage(_))));
    }

    #[test]
    fn test_parse_mode_and_sync() {
        assert_eq!(
            parse_command("mode ap"),
            Ok(Some(ConsoleCommand::Mode(NetworkMode::AccessPoint)))
        );
        assert_eq!(
            parse_command("mode client"),
            Ok(Some(ConsoleCommand::Mode(NetworkMode::Client)))
        );
        assert_eq!(parse_command("sync"), Ok(Some(ConsoleCommand::Sync { force: false })));
        assert_eq!(
            parse_command("sync force"),
            Ok(Some(ConsoleCommand::Sync { force: true }))
        );
        assert!(matches!(parse_command("mode mesh"), Err(ConsoleError::Usage(_))));
    }

    #[test]
    fn test_parse_tail() {
        assert_eq!(parse_command("tail"), Ok(Some(ConsoleCommand::Tail(10))));
        assert_eq!(parse_command("tail 3"), Ok(Some(ConsoleCommand::Tail(3))));
        assert!(matches!(parse_command("tail lots"), Err(ConsoleError::Usage(_))));
    }

    #[test]
    fn test_burst_line() {
        let record = BurstRecord {
            timestamp: chrono::Utc.with_ymd_and_hms(2025, 7, 22, 12, 35, 19).unwrap(),
            line: 42,
            latitude: 51.459595,
            longitude: -0.547948,
        };
        assert_eq!(burst_line(&record), "12:35:19 #42 51.459595,-0.547948");
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_command("fly"),
            Err(ConsoleError::Unknown("fly".to_string()))
        );
    }

    #[test]
    fn test_status_line() {
        let status = StatusSnapshot {
            mode: NetworkMode::AccessPoint,
            connected: false,
            sync_status: SyncStatus::Synchronized {
                epoch_seconds: 1_753_187_719,
                monotonic_ms: 0,
            },
            last_sync_age_secs: Some(42),
            track_loaded: true,
            track_path: None,
            active: true,
            current_line: 17,
            gpio_enabled: true,
            usb_enabled: false,
            utc_time: chrono::Utc.with_ymd_and_hms(2025, 7, 22, 12, 36, 1).unwrap(),
            counters: PlaybackStats {
                bursts_sent: 5,
                ..Default::default()
            },
        };
        assert_eq!(
            status_line(&status),
            "12:36:01 | GPS: Active | line 17 | access_point | synced 42s ago | GPIO:ON USB:OFF | bursts 5"
        );
    }
}
