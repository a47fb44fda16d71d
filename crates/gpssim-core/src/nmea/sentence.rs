//! Per-fix sentence burst
//!
//! Only the RMC and GGA sentences depend on the fix. The GSA, GSV and TXT
//! sentences are fixed content that a NEO-6M style receiver prints every
//! second; emitting them keeps downstream parsers that expect the full burst happy.

use super::checksum::finalize;
use crate::track::NavigationFix;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Sentences emitted per valid fix
pub const BURST_LEN: usize = 8;

/// Date field reported in RMC (ddmmyy)
pub const RMC_DATE: &str = "220725";

/// Fix quality reported in GGA (1 = autonomous GNSS fix)
pub const GGA_FIX_QUALITY: u8 = 1;

/// Altitude and geoid separation tail of GGA
const GGA_ALTITUDE_TAIL: &str = "56.3,M,46.9,M,,";

/// Fixed sentences that follow RMC and GGA, in transmit order
pub const SCAFFOLD_SENTENCES: [&str; 6] = [
    "GNGSA,A,3,01,02,04,31,,,,,,,,,6.27,4.89,3.92,1",
    "GNGSA,A,3,,,,,,,,,,,,,6.27,4.89,3.92,4",
    "GPGSV,2,1,05,01,57,120,12,02,28,127,27,04,43,173,23,17,,,21",
    "GPGSV,2,2,05,31,17,085,30",
    "BDGSV,1,1,00",
    "GNTXT,1,1,01,ANTENNA OK",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Fix is not valid and cannot be rendered")]
    InvalidFix,
}

/// Which coordinate a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn degree_width(self) -> usize {
        match self {
            Axis::Latitude => 2,
            Axis::Longitude => 3,
        }
    }

    fn hemisphere(self, value: f64) -> char {
        match (self, value >= 0.0) {
            (Axis::Latitude, true) => 'N',
            (Axis::Latitude, false) => 'S',
            (Axis::Longitude, true) => 'E',
            (Axis::Longitude, false) => 'W',
        }
    }
}

/// A coordinate split into whole degrees and decimal minutes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegreesMinutes {
    pub axis: Axis,
    pub degrees: u32,
    pub minutes: f64,
    pub hemisphere: char,
}

impl DegreesMinutes {
    /// Convert signed decimal degrees
    pub fn from_decimal(value: f64, axis: Axis) -> Self {
        let magnitude = value.abs();
        let mut degrees = magnitude.trunc() as u32;
        let mut minutes = (magnitude - magnitude.trunc()) * 60.0;

        // 59.999996 would print as 60.00000
        if (minutes * 1e5).round() >= 60.0 * 1e5 {
            degrees += 1;
            minutes = 0.0;
        }

        Self {
            axis,
            degrees,
            minutes,
            hemisphere: axis.hemisphere(value),
        }
    }

    /// `DDMM.MMMMM` or `DDDMM.MMMMM`
    pub fn to_nmea(&self) -> String {
        format!(
            "{:0width$}{:08.5}",
            self.degrees,
            self.minutes,
            width = self.axis.degree_width()
        )
    }
}

/// `<DDMM.MMMMM>,<N|S>,<DDDMM.MMMMM>,<E|W>`
fn position_fields(fix: &NavigationFix) -> String {
    let lat = DegreesMinutes::from_decimal(fix.latitude, Axis::Latitude);
    let lon = DegreesMinutes::from_decimal(fix.longitude, Axis::Longitude);
    format!(
        "{},{},{},{}",
        lat.to_nmea(),
        lat.hemisphere,
        lon.to_nmea(),
        lon.hemisphere
    )
}

/// Recommended minimum navigation sentence
pub fn rmc(fix: &NavigationFix) -> Result<String, CodecError> {
    if !fix.is_valid() {
        return Err(CodecError::InvalidFix);
    }
    Ok(finalize(&format!(
        "GNRMC,{}.00,A,{},{:.3},{:.1},{},,,A,V",
        fix.utc_time,
        position_fields(fix),
        fix.speed_knots,
        fix.course,
        RMC_DATE
    )))
}

/// Fix data sentence
pub fn gga(fix: &NavigationFix) -> Result<String, CodecError> {
    if !fix.is_valid() {
        return Err(CodecError::InvalidFix);
    }
    Ok(finalize(&format!(
        "GNGGA,{}.00,{},{},{},{:.2},{}",
        fix.utc_time,
        position_fields(fix),
        GGA_FIX_QUALITY,
        fix.satellites,
        fix.hdop,
        GGA_ALTITUDE_TAIL
    )))
}

/// Render the full burst for one fix, in transmit order
pub fn render_burst(fix: &NavigationFix) -> Result<Vec<String>, CodecError> {
    let mut burst = Vec::with_capacity(BURST_LEN);
    burst.push(rmc(fix)?);
    burst.push(gga(fix)?);
    burst.extend(SCAFFOLD_SENTENCES.iter().map(|body| finalize(body)));
    Ok(burst)
}

/// Time of day as `HHMMSS`
pub fn format_utc_time(now: DateTime<Utc>) -> String {
    now.format("%H%M%S").to_string()
}
