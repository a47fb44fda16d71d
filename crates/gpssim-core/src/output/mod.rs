//! Sentence output
//!
//! Two independently switchable channels (GPIO serial and USB serial) fed
//! from one burst:
//! - Channel enable flags and their validation ([`config`])
//! - Byte sinks a channel can write to ([`sink`])
//! - Fan-out of framed sentences to the enabled channels ([`router`])

pub mod config;
pub mod router;
pub mod sink;

pub use config::{OutputConfig, ValidationError};
pub use router::{Channel, OutputRouter, SendReport};
pub use sink::{open_sink, ByteSink, DeviceSink, MemorySink, StdoutSink};
