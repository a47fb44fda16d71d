//! Navigation fix value type

use serde::Serialize;

/// Satellite count reported when the recording has none
pub const DEFAULT_SATELLITES: u32 = 4;

/// One parsed track record
///
/// A fix is created once per track line and never mutated afterwards.
/// Attaching the playback time produces a new value via [`NavigationFix::with_utc_time`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationFix {
    /// UTC time of day as `HHMMSS` (fractional seconds are added at render time)
    pub utc_time: String,
    /// Latitude in decimal degrees (positive = North)
    pub latitude: f64,
    /// Longitude in decimal degrees (positive = East)
    pub longitude: f64,
    /// Number of satellites used in the fix
    pub satellites: u32,
    /// Horizontal dilution of precision
    pub hdop: f64,
    /// Course over ground in degrees (0-359)
    pub course: f64,
    /// Speed over ground in knots
    pub speed_knots: f64,
    /// Whether the coordinate pair was extracted; other fields are meaningless when false
    pub valid: bool,
}

impl NavigationFix {
    /// An invalid fix with every field zeroed
    pub fn invalid() -> Self {
        Self {
            utc_time: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            satellites: DEFAULT_SATELLITES,
            hdop: 0.0,
            course: 0.0,
            speed_knots: 0.0,
            valid: false,
        }
    }

    /// Copy of this fix stamped with a new time of day
    pub fn with_utc_time(&self, utc_time: impl Into<String>) -> Self {
        Self {
            utc_time: utc_time.into(),
            ..self.clone()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Default for NavigationFix {
    fn default() -> Self {
        Self::invalid()
    }
}
