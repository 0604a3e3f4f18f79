//! Motion sample sources.
//!
//! A source turns sensor ticks into [`Sample`]s and pushes them onto the
//! notification queue. The synthetic source stands in for hardware on hosts
//! without an accelerometer.

pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use synthetic::{SyntheticCollector, SyntheticConfig};
pub use types::{Axis, Sample};

/// Errors that can occur while starting a source.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyRunning,
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Collector is already running"),
        }
    }
}

impl std::error::Error for CollectorError {}
