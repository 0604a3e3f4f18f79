//! Feature record assembly and wire format.
//!
//! A [`FeatureRecord`] combines a coarse orientation label, derived from the
//! time-domain axis averages, with the spectral features of the window and
//! the ratios between the per-axis peak magnitudes.
//!
//! Ratios are plain divisions. A zero magnitude yields an infinite or NaN
//! ratio that is carried into the serialized record unchanged; consumers must
//! accept non-finite fields. They are written as `Infinity`, `-Infinity` and
//! `NaN`, the spelling Java's `Double.toString` uses and `parseDouble` reads.

use crate::core::spectral::WindowSpectrum;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Minimum absolute average on the axis the device is resting on.
pub const DOMINANT_AXIS_MIN: f64 = 6.0;

/// Maximum absolute average on the remaining axes.
pub const OFF_AXIS_MAX: f64 = 4.0;

/// Number of comma-separated fields in the wire format.
pub const RECORD_FIELD_COUNT: usize = 10;

/// Coarse device pose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Unknown,
    /// Gravity along x
    Front,
    /// Gravity along z
    Top,
}

impl Orientation {
    /// Numeric code used on the wire.
    pub fn code(self) -> u8 {
        match self {
            Orientation::Unknown => 0,
            Orientation::Front => 1,
            Orientation::Top => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Orientation::Unknown),
            1 => Some(Orientation::Front),
            2 => Some(Orientation::Top),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Orientation::Unknown => "unknown",
            Orientation::Front => "front",
            Orientation::Top => "top",
        }
    }
}

/// Classify the device pose from per-axis time-domain averages.
pub fn classify_orientation(avg_x: f64, avg_y: f64, avg_z: f64) -> Orientation {
    let (x, y, z) = (avg_x.abs(), avg_y.abs(), avg_z.abs());

    if x > DOMINANT_AXIS_MIN && y < OFF_AXIS_MAX && z < OFF_AXIS_MAX {
        Orientation::Front
    } else if x < OFF_AXIS_MAX && y < OFF_AXIS_MAX && z > DOMINANT_AXIS_MIN {
        Orientation::Top
    } else {
        Orientation::Unknown
    }
}

/// The unit sent to the peer for each completed window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub orientation: Orientation,
    pub freq_x: f64,
    pub freq_y: f64,
    pub freq_z: f64,
    pub mag_x: f64,
    pub mag_y: f64,
    pub mag_z: f64,
    pub ratio_xy: f64,
    pub ratio_yz: f64,
    pub ratio_zx: f64,
}

/// Build the record for one window from its axis means and spectrum.
pub fn compute_record(axis_means: [f64; 3], spectrum: &WindowSpectrum) -> FeatureRecord {
    let [avg_x, avg_y, avg_z] = axis_means;
    let (mag_x, mag_y, mag_z) = (
        spectrum.x.peak_magnitude,
        spectrum.y.peak_magnitude,
        spectrum.z.peak_magnitude,
    );

    FeatureRecord {
        orientation: classify_orientation(avg_x, avg_y, avg_z),
        freq_x: spectrum.x.dominant_frequency,
        freq_y: spectrum.y.dominant_frequency,
        freq_z: spectrum.z.dominant_frequency,
        mag_x,
        mag_y,
        mag_z,
        ratio_xy: mag_x / mag_y,
        ratio_yz: mag_y / mag_z,
        ratio_zx: mag_z / mag_x,
    }
}

impl FeatureRecord {
    /// Numeric fields in wire order (everything after the orientation code).
    pub fn values(&self) -> [f64; RECORD_FIELD_COUNT - 1] {
        [
            self.freq_x,
            self.freq_y,
            self.freq_z,
            self.mag_x,
            self.mag_y,
            self.mag_z,
            self.ratio_xy,
            self.ratio_yz,
            self.ratio_zx,
        ]
    }

    /// Whether every numeric field is finite.
    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|v| v.is_finite())
    }

    /// Wire payload as bytes.
    pub fn to_wire(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

/// Comma-joined wire format:
/// `orientationCode,freqX,freqY,freqZ,magX,magY,magZ,ratioXY,ratioYZ,ratioZX`.
impl fmt::Display for FeatureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.orientation.code())?;
        for value in self.values() {
            write!(f, ",")?;
            write_value(f, value)?;
        }
        Ok(())
    }
}

/// Finite values use the shortest round-trip form.
fn write_value(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value == f64::INFINITY {
        f.write_str("Infinity")
    } else if value == f64::NEG_INFINITY {
        f.write_str("-Infinity")
    } else {
        write!(f, "{value}")
    }
}

/// Errors from parsing a wire record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseRecordError {
    FieldCount(usize),
    InvalidOrientation(String),
    InvalidNumber { field: usize, value: String },
}

impl fmt::Display for ParseRecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseRecordError::FieldCount(n) => {
                write!(f, "Expected {RECORD_FIELD_COUNT} fields, got {n}")
            }
            ParseRecordError::InvalidOrientation(v) => write!(f, "Invalid orientation code '{v}'"),
            ParseRecordError::InvalidNumber { field, value } => {
                write!(f, "Invalid number '{value}' in field {field}")
            }
        }
    }
}

impl std::error::Error for ParseRecordError {}

impl FromStr for FeatureRecord {
    type Err = ParseRecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim_end_matches(['\r', '\n']).split(',').collect();
        if fields.len() != RECORD_FIELD_COUNT {
            return Err(ParseRecordError::FieldCount(fields.len()));
        }

        let orientation = fields[0]
            .parse::<u8>()
            .ok()
            .and_then(Orientation::from_code)
            .ok_or_else(|| ParseRecordError::InvalidOrientation(fields[0].to_string()))?;

        let mut values = [0.0f64; RECORD_FIELD_COUNT - 1];
        for (i, raw) in fields[1..].iter().enumerate() {
            values[i] = raw.parse().map_err(|_| ParseRecordError::InvalidNumber {
                field: i + 1,
                value: raw.to_string(),
            })?;
        }

        let [freq_x, freq_y, freq_z, mag_x, mag_y, mag_z, ratio_xy, ratio_yz, ratio_zx] = values;
        Ok(FeatureRecord {
            orientation,
            freq_x,
            freq_y,
            freq_z,
            mag_x,
            mag_y,
            mag_z,
            ratio_xy,
            ratio_yz,
            ratio_zx,
        })
    }
}
