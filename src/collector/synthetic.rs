//! Synthetic tri-axial motion source.
//!
//! Produces a sinusoid on one axis on top of a constant bias (gravity on Z by
//! default) at a fixed tick interval. Timestamps are nanosecond ticks from the
//! start of the run. Samples are pushed onto the notification queue from a
//! background thread until the collector is stopped or the queue is cancelled.

use crate::collector::types::{Axis, Sample};
use crate::collector::CollectorError;
use crate::events::Notifier;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Shape of the generated signal.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Frequency of the sinusoid in Hz
    pub signal_hz: f64,
    /// Peak amplitude of the sinusoid
    pub amplitude: f64,
    /// Axis carrying the sinusoid
    pub axis: Axis,
    /// Constant offset added to each axis
    pub bias: [f64; 3],
    /// Time between ticks
    pub sample_interval: Duration,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            signal_hz: 5.0,
            amplitude: 1.0,
            axis: Axis::X,
            bias: [0.0, 0.0, 9.81],
            sample_interval: Duration::from_millis(10),
        }
    }
}

impl SyntheticConfig {
    /// The sample for tick `index`.
    pub fn sample_at(&self, index: u64) -> Sample {
        let tick_ns = self.sample_interval.as_nanos() as i64;
        let timestamp = index as i64 * tick_ns;
        let t = timestamp as f64 * 1e-9;
        let wave = self.amplitude * (2.0 * PI * self.signal_hz * t).sin();

        let mut values = self.bias;
        let slot = match self.axis {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        };
        values[slot] += wave;

        Sample::new(values[0], values[1], values[2], timestamp)
    }

    /// `count` consecutive samples starting at tick `start`.
    pub fn samples(&self, start: u64, count: usize) -> impl Iterator<Item = Sample> + '_ {
        (start..start + count as u64).map(move |i| self.sample_at(i))
    }

    /// Ticks per second.
    pub fn sample_rate(&self) -> f64 {
        1.0 / self.sample_interval.as_secs_f64()
    }
}

/// Background generator feeding the notification queue.
pub struct SyntheticCollector {
    config: SyntheticConfig,
    notifier: Notifier,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SyntheticCollector {
    pub fn new(config: SyntheticConfig, notifier: Notifier) -> Self {
        Self {
            config,
            notifier,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Start generating samples in a background thread.
    ///
    /// # Errors
    /// Returns an error if the collector is already running.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let notifier = self.notifier.clone();
        let config = self.config.clone();

        info!(
            "Synthetic source: {} Hz on {:?} at {:.1} samples/s",
            config.signal_hz,
            config.axis,
            config.sample_rate()
        );

        let handle = thread::spawn(move || {
            let mut index = 0u64;
            while running.load(Ordering::SeqCst) {
                if !notifier.sample(config.sample_at(index)) {
                    debug!("Notification queue closed, stopping synthetic source");
                    break;
                }
                index += 1;
                thread::sleep(config.sample_interval);
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop generating samples. Safe to call more than once.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for SyntheticCollector {
    fn drop(&mut self) {
        self.stop();
    }
}
