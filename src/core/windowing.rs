//! Fixed-capacity sample window.
//!
//! Samples are accumulated into a window of `N` slots. When the last slot is
//! filled the window reports [`WindowStatus::Complete`]; the owner consumes it
//! and calls [`SampleWindow::reset`]. Slot storage is allocated once and
//! overwritten on every pass, so steady-state sampling does not allocate.

use crate::collector::types::{Axis, Sample};
use statrs::statistics::Statistics;

/// Result of pushing a sample into the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    /// More samples are needed before the window is full
    Filling,
    /// The push filled the last slot
    Complete,
}

/// Errors from misusing a sample window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// A sample was pushed into a full window that was never reset.
    Overflow { capacity: usize },
}

impl std::fmt::Display for WindowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowError::Overflow { capacity } => {
                write!(f, "Sample window overflow: all {capacity} slots are in use")
            }
        }
    }
}

impl std::error::Error for WindowError {}

/// A fixed-capacity accumulator of samples.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    /// Slot storage, always `capacity` long
    samples: Vec<Sample>,
    /// Number of valid slots, `[0, capacity]`
    count: usize,
}

impl SampleWindow {
    /// Create an empty window with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![Sample::default(); capacity],
            count: 0,
        }
    }

    /// Append a sample.
    ///
    /// Returns [`WindowStatus::Complete`] on the push that fills the last slot.
    /// Pushing into a complete window that has not been reset is a contract
    /// violation and fails with [`WindowError::Overflow`].
    pub fn push(&mut self, sample: Sample) -> Result<WindowStatus, WindowError> {
        if self.count == self.samples.len() {
            return Err(WindowError::Overflow {
                capacity: self.samples.len(),
            });
        }

        self.samples[self.count] = sample;
        self.count += 1;

        if self.count == self.samples.len() {
            Ok(WindowStatus::Complete)
        } else {
            Ok(WindowStatus::Filling)
        }
    }

    /// Mark the window empty. Slot storage is kept for reuse.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Number of valid samples.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Whether every slot holds a valid sample.
    pub fn is_complete(&self) -> bool {
        self.count == self.samples.len()
    }

    /// The valid samples, in arrival order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples[..self.count]
    }

    /// Timestamp of the first valid sample.
    pub fn first_timestamp(&self) -> Option<i64> {
        self.samples().first().map(|s| s.timestamp)
    }

    /// Timestamp of the last valid sample.
    pub fn last_timestamp(&self) -> Option<i64> {
        self.samples().last().map(|s| s.timestamp)
    }

    /// Time-domain mean of one axis over the valid samples (NaN when empty).
    pub fn axis_mean(&self, axis: Axis) -> f64 {
        self.samples().iter().map(|s| s.axis(axis)).mean()
    }

    /// Time-domain means of all three axes, in x, y, z order.
    pub fn axis_means(&self) -> [f64; 3] {
        Axis::ALL.map(|axis| self.axis_mean(axis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: i64) -> Sample {
        Sample::new(i as f64, 0.0, 0.0, i)
    }

    #[test]
    fn test_complete_on_last_push() {
        let mut window = SampleWindow::new(128);
        window.reset();

        for i in 0..127 {
            assert_eq!(window.push(sample(i)).unwrap(), WindowStatus::Filling);
        }
        assert_eq!(window.push(sample(127)).unwrap(), WindowStatus::Complete);
        assert!(window.is_complete());
        assert_eq!(window.len(), 128);
    }

    #[test]
    fn test_overflow_without_reset() {
        let mut window = SampleWindow::new(4);
        for i in 0..4 {
            window.push(sample(i)).unwrap();
        }

        assert_eq!(
            window.push(sample(4)),
            Err(WindowError::Overflow { capacity: 4 })
        );
        assert_eq!(window.len(), 4);
    }

    #[test]
    fn test_reset_reuses_storage() {
        let mut window = SampleWindow::new(4);
        for i in 0..4 {
            window.push(sample(i)).unwrap();
        }
        window.reset();

        assert!(window.is_empty());
        assert_eq!(window.capacity(), 4);
        assert!(window.samples().is_empty());

        // Second pass: exactly one Complete, on the fourth push
        let statuses: Vec<WindowStatus> =
            (10..14).map(|i| window.push(sample(i)).unwrap()).collect();
        assert_eq!(
            statuses,
            vec![
                WindowStatus::Filling,
                WindowStatus::Filling,
                WindowStatus::Filling,
                WindowStatus::Complete
            ]
        );
        assert_eq!(window.first_timestamp(), Some(10));
        assert_eq!(window.last_timestamp(), Some(13));
    }

    #[test]
    fn test_axis_means() {
        let mut window = SampleWindow::new(4);
        for i in 0..4 {
            window.push(Sample::new(i as f64, 2.0, -1.0, i)).unwrap();
        }

        let [x, y, z] = window.axis_means();
        assert!((x - 1.5).abs() < 1e-12);
        assert!((y - 2.0).abs() < 1e-12);
        assert!((z + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_window_exposes_valid_prefix() {
        let mut window = SampleWindow::new(8);
        window.push(sample(1)).unwrap();
        window.push(sample(2)).unwrap();

        assert_eq!(window.samples().len(), 2);
        assert!(!window.is_complete());
        assert_eq!(window.first_timestamp(), Some(1));
        assert_eq!(window.last_timestamp(), Some(2));
    }
}
