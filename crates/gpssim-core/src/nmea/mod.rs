//! NMEA-0183 sentence encoding
//!
//! Stateless helpers that turn a [`crate::track::NavigationFix`] into the
//! sentence burst a u-blox style receiver emits once per second:
//! - XOR checksums and sentence framing ([`checksum`])
//! - Coordinate conversion and the per-fix burst ([`sentence`])

pub mod checksum;
pub mod sentence;

pub use checksum::{checksum, finalize, verify};
pub use sentence::{format_utc_time, render_burst, CodecError, BURST_LEN};
