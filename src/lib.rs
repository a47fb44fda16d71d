//! gpssim - GPS receiver simulator
//!
//! Replays recorded track logs as a live NMEA-0183 stream on serial outputs.
//! This library re-exports the engine from `gpssim-core` and adds the
//! persisted application config and the console control surface used by the
//! binary.

pub mod config;
pub mod console;

pub use gpssim_core::{nmea, output, playback, simulator, stats, time, track};

pub use gpssim_core::{
    ControlError, NavigationFix, NetworkMode, OutputConfig, Simulator, SimulatorHandle,
    StatusSnapshot,
};
pub use gpssim_core::{BUILD_DATE, DEFAULT_BAUD_RATE, VERSION};

use config::AppConfig;
use gpssim_core::output::{open_sink, Channel, OutputRouter};
use gpssim_core::time::{SystemClock, TimeSource};
use std::sync::Arc;

/// Assemble a simulator from configuration
///
/// Output ports are attached but not opened until the first sentence. The
/// network is not touched; call [`Simulator::establish_network`] afterwards.
pub fn build_simulator(config: &AppConfig) -> anyhow::Result<Simulator> {
    let clock = Arc::new(SystemClock::new());

    let time = TimeSource::new(
        config.time_settings(),
        config.network_backend(),
        config.time_fetcher(),
        clock.clone(),
        config.preference_store(),
    );

    let mut router = OutputRouter::new();
    router.set_config(config.output_config()?)?;
    if let Some(port) = &config.gpio_port {
        router.attach(Channel::Gpio, open_sink(port, config.baud_rate));
    }
    if let Some(port) = &config.usb_port {
        router.attach(Channel::Usb, open_sink(port, config.baud_rate));
    }

    Ok(Simulator::new(time, router, clock))
}
