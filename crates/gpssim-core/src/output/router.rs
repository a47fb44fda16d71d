//! Fan-out of framed sentences to the enabled channels

use super::config::{OutputConfig, ValidationError};
use super::sink::ByteSink;
use serde::Serialize;
use std::fmt;

/// Physical output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// UART on the GPIO header
    Gpio,
    /// USB serial
    Usb,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Gpio => f.write_str("gpio"),
            Channel::Usb => f.write_str("usb"),
        }
    }
}

/// Outcome of sending one sentence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Channels that accepted the bytes
    pub delivered: u8,
    /// Enabled channels whose write failed
    pub failed: u8,
}

struct Port {
    channel: Channel,
    sink: Option<Box<dyn ByteSink>>,
}

impl Port {
    fn write(&mut self, bytes: &[u8]) -> Option<bool> {
        let sink = self.sink.as_mut()?;
        match sink.write_all(bytes) {
            Ok(()) => Some(true),
            Err(e) => {
                tracing::warn!(channel = %self.channel, sink = %sink.describe(), error = %e, "Output write failed");
                Some(false)
            }
        }
    }
}

/// Writes each sentence, CRLF-terminated, to every enabled channel
pub struct OutputRouter {
    config: OutputConfig,
    gpio: Port,
    usb: Port,
}

impl OutputRouter {
    /// Router with both channels enabled and no sinks attached
    pub fn new() -> Self {
        Self {
            config: OutputConfig::default(),
            gpio: Port {
                channel: Channel::Gpio,
                sink: None,
            },
            usb: Port {
                channel: Channel::Usb,
                sink: None,
            },
        }
    }

    /// Attach or replace the sink behind a channel
    pub fn attach(&mut self, channel: Channel, sink: Box<dyn ByteSink>) {
        tracing::info!(%channel, sink = %sink.describe(), "Output attached");
        self.port_mut(channel).sink = Some(sink);
    }

    pub fn detach(&mut self, channel: Channel) {
        self.port_mut(channel).sink = None;
    }

    pub fn is_attached(&self, channel: Channel) -> bool {
        match channel {
            Channel::Gpio => self.gpio.sink.is_some(),
            Channel::Usb => self.usb.sink.is_some(),
        }
    }

    /// Description of the sink behind a channel, if one is attached
    pub fn sink_name(&self, channel: Channel) -> Option<String> {
        let port = match channel {
            Channel::Gpio => &self.gpio,
            Channel::Usb => &self.usb,
        };
        port.sink.as_ref().map(|sink| sink.describe())
    }

    pub fn config(&self) -> OutputConfig {
        self.config
    }

    /// Replace the channel enables; the invalid all-off case leaves the router unchanged
    pub fn set_config(&mut self, config: OutputConfig) -> Result<(), ValidationError> {
        config.validate()?;
        if config != self.config {
            tracing::info!(
                gpio = config.gpio_enabled,
                usb = config.usb_enabled,
                "Output configuration changed"
            );
        }
        self.config = config;
        Ok(())
    }

    /// Send one finalized sentence
    ///
    /// A failing channel never prevents delivery on the other.
    pub fn send(&mut self, sentence: &str) -> SendReport {
        let mut framed = Vec::with_capacity(sentence.len() + 2);
        framed.extend_from_slice(sentence.as_bytes());
        framed.extend_from_slice(b"\r\n");

        let mut report = SendReport::default();
        let enabled = [
            (self.config.gpio_enabled, &mut self.gpio),
            (self.config.usb_enabled, &mut self.usb),
        ];
        for (on, port) in enabled {
            if !on {
                continue;
            }
            match port.write(&framed) {
                Some(true) => report.delivered += 1,
                Some(false) => report.failed += 1,
                None => {}
            }
        }
        report
    }

    fn port_mut(&mut self, channel: Channel) -> &mut Port {
        match channel {
            Channel::Gpio => &mut self.gpio,
            Channel::Usb => &mut self.usb,
        }
    }
}

impl Default for OutputRouter {
    fn default() -> Self {
        Self::new()
    }
}
