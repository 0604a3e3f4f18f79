//! Sample types produced by motion sensor sources.

use serde::{Deserialize, Serialize};

/// One tri-axial reading from the motion sensor.
///
/// The timestamp is in sensor-clock ticks, not wall time. Ticks are strictly
/// increasing within a session; the gap between them is not fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Sensor-clock timestamp in ticks
    pub timestamp: i64,
}

impl Sample {
    pub fn new(x: f64, y: f64, z: f64, timestamp: i64) -> Self {
        Self { x, y, z, timestamp }
    }

    /// Reading for a single axis.
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// Sensor axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in wire order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Parse an axis name (`x`, `y` or `z`, case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_accessor() {
        let sample = Sample::new(1.0, 2.0, 3.0, 42);
        assert_eq!(sample.axis(Axis::X), 1.0);
        assert_eq!(sample.axis(Axis::Y), 2.0);
        assert_eq!(sample.axis(Axis::Z), 3.0);
    }

    #[test]
    fn test_axis_from_name() {
        assert_eq!(Axis::from_name("X"), Some(Axis::X));
        assert_eq!(Axis::from_name(" z "), Some(Axis::Z));
        assert_eq!(Axis::from_name("w"), None);
    }
}
