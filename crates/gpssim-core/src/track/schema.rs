//! Position-addressed track schema
//!
//! Track exports are wide comma-separated rows (61+ fields) where only a handful
//! of columns matter. Columns are addressed by index, not header name, so the
//! table below is the whole contract between the recorder and the simulator.
//!
//! Rows are split on every comma, including the one inside the quoted
//! `"[lat, lon]"` pair, so the coordinate pair spans raw fields 6 and 7 and the
//! later indices account for that.

use super::fix::{NavigationFix, DEFAULT_SATELLITES};
use super::store::TrackError;

/// Minimum number of raw fields in a complete data row
pub const MIN_FIELDS: usize = 61;

/// Meaning of a track column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTC time string, copied verbatim
    UtcTime,
    /// Bracketed `[lat, lon]` pair in decimal degrees
    Coordinates,
    /// Course over ground in degrees
    Course,
    /// Speed over ground in knots
    SpeedKnots,
    /// Horizontal dilution of precision
    Hdop,
    /// Satellites in use (0 means "not recorded")
    Satellites,
}

/// One column of the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub index: usize,
    pub kind: FieldKind,
}

/// Columns read from each row; every other column is ignored
pub const TRACK_SCHEMA: &[FieldSpec] = &[
    FieldSpec {
        index: 3,
        kind: FieldKind::UtcTime,
    },
    FieldSpec {
        index: 6,
        kind: FieldKind::Coordinates,
    },
    FieldSpec {
        index: 16,
        kind: FieldKind::Course,
    },
    FieldSpec {
        index: 17,
        kind: FieldKind::SpeedKnots,
    },
    FieldSpec {
        index: 18,
        kind: FieldKind::Hdop,
    },
    FieldSpec {
        index: 60,
        kind: FieldKind::Satellites,
    },
];

/// Look up the column index for a field kind
pub fn index_of(kind: FieldKind) -> Option<usize> {
    TRACK_SCHEMA
        .iter()
        .find(|spec| spec.kind == kind)
        .map(|spec| spec.index)
}

/// Parse one data row into a fix
///
/// Never fails: a row without a usable coordinate pair yields a fix with
/// `valid == false`. The remaining fields are still filled in but carry no meaning.
pub fn parse_line(line: &str) -> NavigationFix {
    let line = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = line.split(',').collect();
    let mut fix = NavigationFix::invalid();

    if fields.len() < MIN_FIELDS {
        tracing::trace!(fields = fields.len(), "Short track row");
    }

    for spec in TRACK_SCHEMA {
        let Some(raw) = fields.get(spec.index) else {
            continue;
        };

        match spec.kind {
            FieldKind::UtcTime => fix.utc_time = (*raw).to_string(),
            FieldKind::Coordinates => {
                let pair_end = (spec.index + 2).min(fields.len());
                match extract_coordinates(&fields[spec.index..pair_end].join(",")) {
                    Ok((latitude, longitude)) => {
                        fix.latitude = latitude;
                        fix.longitude = longitude;
                        fix.valid = true;
                    }
                    Err(e) => tracing::debug!(error = %e, "Row has no usable coordinates"),
                }
            }
            FieldKind::Course => fix.course = lenient_f64(raw),
            FieldKind::SpeedKnots => fix.speed_knots = lenient_f64(raw),
            FieldKind::Hdop => fix.hdop = lenient_f64(raw),
            FieldKind::Satellites => fix.satellites = satellites(raw),
        }
    }

    fix
}

/// Extract `(lat, lon)` from text containing `[lat, lon]`
pub fn extract_coordinates(text: &str) -> Result<(f64, f64), TrackError> {
    let malformed = |reason: &str| TrackError::MalformedLine(format!("{reason}: {text:?}"));

    if text.trim().len() <= 4 {
        return Err(malformed("coordinate field too short"));
    }

    let open = text.find('[').ok_or_else(|| malformed("missing '['"))?;
    let comma = text[open..]
        .find(',')
        .map(|i| open + i)
        .ok_or_else(|| malformed("missing separator"))?;
    let close = text[comma..]
        .find(']')
        .map(|i| comma + i)
        .ok_or_else(|| malformed("missing ']'"))?;

    let latitude = text[open + 1..comma]
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| malformed("bad latitude"))?;
    let longitude = text[comma + 1..close]
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| malformed("bad longitude"))?;

    Ok((latitude, longitude))
}

fn lenient_f64(raw: &str) -> f64 {
    raw.trim()
        .trim_matches('"')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn satellites(raw: &str) -> u32 {
    let raw = raw.trim().trim_matches('"');
    let count = raw
        .parse::<u32>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u32)
        })
        .unwrap_or(0);

    if count == 0 {
        DEFAULT_SATELLITES
    } else {
        count
    }
}
