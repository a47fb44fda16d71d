//! gpssim - GPS receiver simulator
//!
//! Entry point for the console application. Sentences may go to stdout, so
//! everything meant for the operator is written to stderr.

use anyhow::Result;
use gpssim::config::AppConfig;
use gpssim::console::{self, ConsoleCommand};
use gpssim::playback::PlaybackState;
use gpssim::{build_simulator, ControlError, SimulatorHandle};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Display refresh period for the status line
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Command line options layered over the config file
#[derive(Debug, Default)]
struct Options {
    config_path: Option<PathBuf>,
    track: Option<PathBuf>,
    gpio_port: Option<String>,
    usb_port: Option<String>,
    start: bool,
    quiet: bool,
    save_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(options) = parse_args(&args) else {
        return Ok(());
    };

    let config_path = options.config_path.clone().unwrap_or_else(AppConfig::path);
    let (mut config, source) = AppConfig::read_from(&config_path);
    apply_overrides(&mut config, &options);

    let _log_guard = init_logging(config.log_dir.as_deref())?;
    source.log(&config_path);

    eprintln!("╔════════════════════════════════════════════════════════════╗");
    eprintln!(
        "║         gpssim v{} - NMEA GPS Simulator ({})        ║",
        gpssim::VERSION,
        gpssim::BUILD_DATE
    );
    eprintln!("╚════════════════════════════════════════════════════════════╝");
    eprintln!();
    info!(path = %config_path.display(), "Configuration");

    if options.save_config {
        config.save(&config_path)?;
        eprintln!("Configuration written to {}", config_path.display());
        return Ok(());
    }

    run(config, options).await
}

fn parse_args(args: &[String]) -> Option<Options> {
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        let value = |flag: &str| -> Option<String> {
            let v = args.get(i + 1).cloned();
            if v.is_none() {
                eprintln!("Error: {} requires a value", flag);
            }
            v
        };

        match args[i].as_str() {
            "--version" | "-v" => {
                println!("gpssim {} ({})", gpssim::VERSION, gpssim::BUILD_DATE);
                return None;
            }
            "--help" | "-h" => {
                print_help();
                return None;
            }
            "--config" | "-c" => {
                options.config_path = Some(PathBuf::from(value("--config")?));
                i += 2;
                continue;
            }
            "--track" | "-t" => {
                options.track = Some(PathBuf::from(value("--track")?));
                i += 2;
                continue;
            }
            "--gpio" => {
                options.gpio_port = Some(value("--gpio")?);
                i += 2;
                continue;
            }
            "--usb" => {
                options.usb_port = Some(value("--usb")?);
                i += 2;
                continue;
            }
            "--start" | "-s" => options.start = true,
            "--quiet" | "-q" => options.quiet = true,
            "--save-config" => options.save_config = true,
            arg if arg.starts_with('-') && arg != "-" => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                return None;
            }
            _ => {
                // Positional argument - treat as track path if not set
                if options.track.is_none() {
                    options.track = Some(PathBuf::from(&args[i]));
                }
            }
        }
        i += 1;
    }

    Some(options)
}

fn print_help() {
    println!("Usage: gpssim [OPTIONS] [TRACK]");
    println!();
    println!("Options:");
    println!("  -c, --config PATH   Config file (default: {})", AppConfig::path().display());
    println!("  -t, --track PATH    Track CSV to load at startup");
    println!("      --gpio PORT     GPIO UART device (e.g. /dev/serial0)");
    println!("      --usb PORT      USB serial device, '-' for stdout");
    println!("  -s, --start         Start output as soon as the track is loaded");
    println!("  -q, --quiet         No periodic status line");
    println!("      --save-config   Write the effective config and exit");
    println!("  -v, --version       Show version");
    println!("  -h, --help          Show this help");
    println!();
    println!("Examples:");
    println!("  gpssim -s --gpio /dev/serial0 --usb /dev/ttyGS0 track.csv");
    println!("  gpssim --usb - track.csv | nmea-viewer");
    println!();
    println!("Type 'help' at the prompt for console commands.");
}

fn apply_overrides(config: &mut AppConfig, options: &Options) {
    if let Some(track) = &options.track {
        config.track = Some(track.clone());
    }
    if let Some(port) = &options.gpio_port {
        config.gpio_port = Some(port.clone());
    }
    if let Some(port) = &options.usb_port {
        config.usb_port = Some(port.clone());
    }
    if options.start {
        config.autostart = true;
    }
}

/// Console logging to stderr, plus a daily rolling file when `log_dir` is set
fn init_logging(
    log_dir: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::from_default_env()
        .add_directive("gpssim=info".parse()?)
        .add_directive("gpssim_core=info".parse()?);

    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "gpssim.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    Ok(guard)
}

async fn run(config: AppConfig, options: Options) -> Result<()> {
    let mut simulator = build_simulator(&config)?;
    info!(
        baud = config.baud_rate,
        gpio = ?config.gpio_port,
        usb = ?config.usb_port,
        "Serial outputs run at {} baud 8N1",
        config.baud_rate
    );

    if let Err(e) = simulator.establish_network() {
        warn!(error = %e, "Network mode could not be established");
    }

    if let Some(track) = &config.track {
        match simulator.load_track(track) {
            Ok(()) if config.autostart => {
                if let Err(e) = simulator.start() {
                    warn!(error = %e, "Autostart failed");
                }
            }
            Ok(()) => {}
            Err(e) => error!(error = %e, "Startup track not loaded"),
        }
    }

    let handle = SimulatorHandle::spawn(simulator)?;

    eprintln!("Ready. Type 'help' for commands, Ctrl+C to exit.");
    eprintln!("────────────────────────────────────────");

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .ok();

    let mut lines = spawn_stdin_reader();
    let mut stdin_open = true;
    let mut status_timer = tokio::time::interval(STATUS_INTERVAL);
    let mut signal_poll = tokio::time::interval(Duration::from_millis(200));

    while running.load(Ordering::SeqCst) {
        tokio::select! {
            line = lines.recv(), if stdin_open => match line {
                Some(line) => match console::parse_command(&line) {
                    Ok(Some(command)) => {
                        if !execute(&handle, command).await {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => eprintln!("{}", e),
                },
                None => {
                    debug!("stdin closed, console input disabled");
                    stdin_open = false;
                }
            },
            _ = status_timer.tick(), if !options.quiet => {
                match handle.status().await {
                    Ok(status) => eprintln!("{}", console::status_line(&status)),
                    Err(ControlError::EngineStopped) => break,
                    Err(e) => debug!(error = %e, "Status unavailable"),
                }
            }
            _ = signal_poll.tick() => {}
        }
    }

    eprintln!();
    eprintln!("Stopping...");
    handle.shutdown().await;
    eprintln!("Done.");
    Ok(())
}

/// Read stdin on its own thread; blocking reads would otherwise hold up runtime shutdown
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Run one console command; returns false when the console should exit
async fn execute(handle: &SimulatorHandle, command: ConsoleCommand) -> bool {
    let result: Result<String, ControlError> = match command {
        ConsoleCommand::Start => handle
            .start()
            .await
            .map(|()| "GPS simulation started".to_string()),
        ConsoleCommand::Stop => handle
            .stop()
            .await
            .map(|()| "GPS simulation stopped".to_string()),
        ConsoleCommand::Toggle => handle.toggle().await.map(|state| match state {
            PlaybackState::Active => "GPS started".to_string(),
            PlaybackState::Stopped => "GPS stopped".to_string(),
        }),
        ConsoleCommand::Reload => handle
            .reload_track()
            .await
            .map(|()| "Track reloaded".to_string()),
        ConsoleCommand::Load(path) => handle
            .load_track(path.clone())
            .await
            .map(|()| format!("Loaded {}", path.display())),
        ConsoleCommand::Output { gpio, usb } => handle
            .set_output_config(gpio, usb)
            .await
            .map(|()| format!("Outputs: GPIO {} USB {}", on_off(gpio), on_off(usb))),
        ConsoleCommand::Mode(target) => {
            eprintln!("Switching to {} mode...", target);
            handle
                .switch_mode(target)
                .await
                .map(|()| format!("Mode: {}", target))
        }
        ConsoleCommand::Sync { force } => {
            eprintln!("Synchronizing time...");
            handle
                .request_sync(force)
                .await
                .map(|()| "Time synchronized".to_string())
        }
        ConsoleCommand::Status => handle.status().await.map(|status| {
            serde_json::to_string_pretty(&status).unwrap_or_else(|e| e.to_string())
        }),
        ConsoleCommand::Tail(count) => handle.recent_bursts(count).await.map(|bursts| {
            if bursts.is_empty() {
                "No bursts sent yet".to_string()
            } else {
                bursts
                    .iter()
                    .map(console::burst_line)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }),
        ConsoleCommand::Help => Ok(console::help_text().to_string()),
        ConsoleCommand::Quit => return false,
    };

    match result {
        Ok(message) => eprintln!("{}", message),
        Err(ControlError::EngineStopped) => {
            error!("Simulator thread stopped");
            return false;
        }
        Err(e) => eprintln!("Error: {}", e),
    }
    true
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
