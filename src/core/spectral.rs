//! Per-axis spectral analysis of a completed sample window.
//!
//! Each axis is transformed with a forward FFT planned once per analyzer. The
//! dominant bin is searched over `[1, N/2]` (DC and the mirrored upper half are
//! excluded) and converted to a frequency using the effective sample rate
//! implied by the window's boundary timestamps.
//!
//! The reported peak magnitude is `|re[k]|` at the dominant bin, the real
//! component only. Ratio features downstream are computed from the same
//! quantity, so it is kept as-is rather than replaced by the complex modulus.
//!
//! Per-axis buffers and the transform scratch are allocated once per analyzer
//! and reused for every window.

use crate::collector::types::Axis;
use crate::core::windowing::SampleWindow;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Errors raised by the spectral analyzer.
#[derive(Debug, Clone, PartialEq)]
pub enum SpectralError {
    /// Transform length is not a power of two (or is smaller than 2).
    InvalidLength(usize),
    /// The window is not full.
    IncompleteWindow { expected: usize, actual: usize },
    /// The window spans no time, so no sample rate can be derived.
    DegenerateWindow { first: i64, last: i64 },
}

impl std::fmt::Display for SpectralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpectralError::InvalidLength(n) => {
                write!(f, "Transform length {n} is not a power of two")
            }
            SpectralError::IncompleteWindow { expected, actual } => {
                write!(f, "Window holds {actual} of {expected} samples")
            }
            SpectralError::DegenerateWindow { first, last } => {
                write!(f, "Degenerate window: first timestamp {first}, last timestamp {last}")
            }
        }
    }
}

impl std::error::Error for SpectralError {}

/// Spectral features of a single axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralFeatures {
    /// Frequency of the dominant bin, in Hz
    pub dominant_frequency: f64,
    /// `|re|` at the dominant bin
    pub peak_magnitude: f64,
    /// Index of the dominant bin, in `[1, N/2]`
    pub dominant_bin: usize,
}

/// Spectral features of all three axes of a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSpectrum {
    pub x: SpectralFeatures,
    pub y: SpectralFeatures,
    pub z: SpectralFeatures,
    /// Effective sample rate derived from the window timestamps, in Hz
    pub sample_rate: f64,
}

impl WindowSpectrum {
    pub fn axis(&self, axis: Axis) -> &SpectralFeatures {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }
}

/// Computes per-axis dominant frequency and peak magnitude for full windows.
#[derive(Clone)]
pub struct SpectralAnalyzer {
    size: usize,
    fft: Arc<dyn Fft<f64>>,
    /// Seconds per sensor-clock tick
    timestamp_unit_secs: f64,
    buffers: [Vec<Complex<f64>>; 3],
    scratch: Vec<Complex<f64>>,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("size", &self.size)
            .field("timestamp_unit_secs", &self.timestamp_unit_secs)
            .finish_non_exhaustive()
    }
}

impl SpectralAnalyzer {
    /// Create an analyzer for windows of `size` samples.
    ///
    /// `timestamp_unit_secs` converts sensor ticks to seconds (1e-9 for
    /// nanosecond clocks).
    pub fn new(size: usize, timestamp_unit_secs: f64) -> Result<Self, SpectralError> {
        if size < 2 || !size.is_power_of_two() {
            return Err(SpectralError::InvalidLength(size));
        }

        let fft = FftPlanner::new().plan_fft_forward(size);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        let zeroed = vec![Complex::default(); size];

        Ok(Self {
            size,
            fft,
            timestamp_unit_secs,
            buffers: [zeroed.clone(), zeroed.clone(), zeroed],
            scratch,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Effective sample rate in Hz: `N / (duration_ticks * unit)`.
    pub fn sample_rate(&self, window: &SampleWindow) -> Result<f64, SpectralError> {
        let n = self.size;
        if window.len() != n {
            return Err(SpectralError::IncompleteWindow {
                expected: n,
                actual: window.len(),
            });
        }

        let samples = window.samples();
        let first = samples[0].timestamp;
        let last = samples[n - 1].timestamp;

        // Widened so that clocks spanning the whole i64 range cannot overflow
        let span = i128::from(last) - i128::from(first);
        if span <= 0 {
            return Err(SpectralError::DegenerateWindow { first, last });
        }

        let duration_secs = span as f64 * self.timestamp_unit_secs;
        Ok(n as f64 / duration_secs)
    }

    /// Analyze a full window.
    pub fn analyze(&mut self, window: &SampleWindow) -> Result<WindowSpectrum, SpectralError> {
        let sample_rate = self.sample_rate(window)?;
        let n = self.size;

        let mut features = [SpectralFeatures::default(); 3];
        for (slot, axis) in Axis::ALL.into_iter().enumerate() {
            let buffer = &mut self.buffers[slot];
            for (bin, sample) in buffer.iter_mut().zip(window.samples()) {
                *bin = Complex::new(sample.axis(axis), 0.0);
            }

            self.fft.process_with_scratch(buffer, &mut self.scratch);

            let bin = dominant_bin(buffer);
            features[slot] = SpectralFeatures {
                dominant_frequency: bin as f64 * sample_rate / n as f64,
                peak_magnitude: buffer[bin].re.abs(),
                dominant_bin: bin,
            };
        }

        let [x, y, z] = features;
        Ok(WindowSpectrum {
            x,
            y,
            z,
            sample_rate,
        })
    }

    /// Spectrum of the most recent window on `axis`.
    pub fn spectrum(&self, axis: Axis) -> &[Complex<f64>] {
        let slot = match axis {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        };
        &self.buffers[slot]
    }
}

/// Index of the largest-modulus bin in `[1, N/2]`; ties keep the lowest bin.
fn dominant_bin(spectrum: &[Complex<f64>]) -> usize {
    let upper = spectrum.len() / 2;
    let mut best = 1;
    let mut best_magnitude = spectrum[1].norm();

    for (k, value) in spectrum.iter().enumerate().take(upper + 1).skip(2) {
        let magnitude = value.norm();
        if magnitude > best_magnitude {
            best = k;
            best_magnitude = magnitude;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::Sample;
    use std::f64::consts::PI;

    const N: usize = 128;
    const NANOS: f64 = 1e-9;

    /// Window with `f(t)` on x, zeros elsewhere, evenly spaced at `dt_ns`.
    fn window_from(f: impl Fn(f64) -> f64, dt_ns: i64) -> SampleWindow {
        let mut window = SampleWindow::new(N);
        for i in 0..N as i64 {
            let t = (i * dt_ns) as f64 * NANOS;
            window.push(Sample::new(f(t), 0.0, 0.0, i * dt_ns)).unwrap();
        }
        window
    }

    /// Window with `values` on x and zeros elsewhere, one tick apart.
    fn window_of(values: &[f64]) -> SampleWindow {
        let mut window = SampleWindow::new(values.len());
        for (i, &v) in values.iter().enumerate() {
            window.push(Sample::new(v, 0.0, 0.0, i as i64)).unwrap();
        }
        window
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        assert_eq!(
            SpectralAnalyzer::new(100, NANOS).unwrap_err(),
            SpectralError::InvalidLength(100)
        );
        assert!(SpectralAnalyzer::new(0, NANOS).is_err());
        assert!(SpectralAnalyzer::new(1, NANOS).is_err());
        assert!(SpectralAnalyzer::new(64, NANOS).is_ok());
    }

    #[test]
    fn test_fft_impulse_is_flat() {
        let mut analyzer = SpectralAnalyzer::new(8, 1.0).unwrap();
        analyzer
            .analyze(&window_of(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]))
            .unwrap();

        for value in analyzer.spectrum(Axis::X) {
            assert!((value.re - 1.0).abs() < 1e-12);
            assert!(value.im.abs() < 1e-12);
        }
    }

    #[test]
    fn test_fft_matches_direct_dft() {
        let input: Vec<f64> = (0..16).map(|i| ((i * 7 % 5) as f64) - 1.5).collect();
        let mut analyzer = SpectralAnalyzer::new(16, 1.0).unwrap();
        analyzer.analyze(&window_of(&input)).unwrap();

        for (k, value) in analyzer.spectrum(Axis::X).iter().enumerate() {
            let (mut dr, mut di) = (0.0, 0.0);
            for (t, &v) in input.iter().enumerate() {
                let angle = -2.0 * PI * (k * t) as f64 / 16.0;
                dr += v * angle.cos();
                di += v * angle.sin();
            }
            assert!((value.re - dr).abs() < 1e-9, "re[{k}]");
            assert!((value.im - di).abs() < 1e-9, "im[{k}]");
        }
    }

    #[test]
    fn test_sample_rate_over_full_clock_range() {
        let analyzer = SpectralAnalyzer::new(4, NANOS).unwrap();
        let mut window = SampleWindow::new(4);
        for ts in [i64::MIN, 0, 1, i64::MAX] {
            window.push(Sample::new(0.0, 0.0, 0.0, ts)).unwrap();
        }

        let rate = analyzer.sample_rate(&window).unwrap();
        assert!(rate.is_finite() && rate > 0.0);

        // Reversed extremes are degenerate, not an overflow
        let mut window = SampleWindow::new(4);
        for ts in [i64::MAX, 0, 1, i64::MIN] {
            window.push(Sample::new(0.0, 0.0, 0.0, ts)).unwrap();
        }
        assert_eq!(
            analyzer.sample_rate(&window),
            Err(SpectralError::DegenerateWindow {
                first: i64::MAX,
                last: i64::MIN
            })
        );
    }

    #[test]
    fn test_dominant_frequency_of_sinusoid() {
        let dt_ns = 10_000_000; // 100 Hz sampling
        let mut analyzer = SpectralAnalyzer::new(N, NANOS).unwrap();

        for f in [2.0, 5.0, 6.25, 12.5, 31.0] {
            let window = window_from(|t| (2.0 * PI * f * t).sin(), dt_ns);
            let spectrum = analyzer.analyze(&window).unwrap();
            let resolution = spectrum.sample_rate / N as f64;

            assert!(
                (spectrum.x.dominant_frequency - f).abs() <= resolution,
                "f={f} got {} (resolution {resolution})",
                spectrum.x.dominant_frequency
            );
        }
    }

    #[test]
    fn test_peak_magnitude_is_real_component() {
        // 6.25 Hz at 100 Hz sampling lands exactly on bin 8
        let dt_ns = 10_000_000;
        let mut analyzer = SpectralAnalyzer::new(N, NANOS).unwrap();

        let cosine = window_from(|t| 3.0 * (2.0 * PI * 6.25 * t).cos(), dt_ns);
        let spectrum = analyzer.analyze(&cosine).unwrap();
        assert_eq!(spectrum.x.dominant_bin, 8);
        assert!((spectrum.x.peak_magnitude - 3.0 * N as f64 / 2.0).abs() < 1e-6);

        // A sine at the same bin puts its energy in the imaginary part
        let sine = window_from(|t| 3.0 * (2.0 * PI * 6.25 * t).sin(), dt_ns);
        let spectrum = analyzer.analyze(&sine).unwrap();
        assert_eq!(spectrum.x.dominant_bin, 8);
        assert!(spectrum.x.peak_magnitude < 1e-6);
    }

    #[test]
    fn test_effective_sample_rate_uses_boundary_timestamps() {
        let dt_ns = 10_000_000;
        let mut analyzer = SpectralAnalyzer::new(N, NANOS).unwrap();
        let window = window_from(|_| 0.0, dt_ns);

        let expected = N as f64 / ((N as f64 - 1.0) * 0.01);
        let spectrum = analyzer.analyze(&window).unwrap();
        assert!((spectrum.sample_rate - expected).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_window() {
        let mut analyzer = SpectralAnalyzer::new(N, NANOS).unwrap();
        let mut window = SampleWindow::new(N);
        for _ in 0..N {
            window.push(Sample::new(10.0, 0.0, 0.0, 500)).unwrap();
        }

        assert_eq!(
            analyzer.analyze(&window),
            Err(SpectralError::DegenerateWindow {
                first: 500,
                last: 500
            })
        );
    }

    #[test]
    fn test_incomplete_window() {
        let mut analyzer = SpectralAnalyzer::new(N, NANOS).unwrap();
        let mut window = SampleWindow::new(N);
        window.push(Sample::new(0.0, 0.0, 0.0, 1)).unwrap();

        assert_eq!(
            analyzer.analyze(&window),
            Err(SpectralError::IncompleteWindow {
                expected: N,
                actual: 1
            })
        );
    }

    #[test]
    fn test_dc_is_excluded_from_search() {
        // Large DC offset plus a small tone on bin 4
        let dt_ns = 10_000_000;
        let mut analyzer = SpectralAnalyzer::new(N, NANOS).unwrap();
        let tone = 4.0 / (N as f64 * 0.01);
        let window = window_from(|t| 9.81 + 0.1 * (2.0 * PI * tone * t).cos(), dt_ns);

        let spectrum = analyzer.analyze(&window).unwrap();
        assert_eq!(spectrum.x.dominant_bin, 4);
    }

    #[test]
    fn test_silent_axis_reports_first_bin() {
        let mut analyzer = SpectralAnalyzer::new(N, NANOS).unwrap();
        let window = window_from(|_| 1.0, 10_000_000);
        let spectrum = analyzer.analyze(&window).unwrap();

        assert_eq!(spectrum.y.dominant_bin, 1);
        assert_eq!(spectrum.y.peak_magnitude, 0.0);
    }
}
