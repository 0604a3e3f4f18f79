//! Motion Link - windowed spectral features from a tri-axial motion sensor,
//! streamed to a paired peer.
//!
//! Samples are collected into fixed-size windows. Each completed window is
//! transformed per axis, reduced to a dominant frequency and peak magnitude,
//! labelled with a coarse orientation and sent to the peer as one text record.
//! Records produced while the link is down are dropped; sampling never waits
//! on the link.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Motion Link                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │  Collector  │──▶│Notification │──▶│  Sampling   │        │
//! │  │ (synthetic) │   │    Queue    │   │ Controller  │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                          ▲            │     │     │         │
//! │                          │            ▼     ▼     ▼         │
//! │  ┌─────────────┐         │     Window  Spectral  Features   │
//! │  │  Transport  │─────────┘                  │               │
//! │  │    (TCP)    │◀────────── LinkSession ◀───┘               │
//! │  └─────────────┘                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use motion_link::{
//!     collector::SyntheticConfig,
//!     core::{SamplingController, WindowOutcome},
//!     link::{LinkSession, RecordingTransport},
//! };
//!
//! let session = LinkSession::new(RecordingTransport::new());
//! let mut controller = SamplingController::new(128, 1e-9, session).unwrap();
//!
//! let source = SyntheticConfig::default();
//! let mut last = WindowOutcome::Filling;
//! for sample in source.samples(0, 128) {
//!     last = controller.on_sample(sample).unwrap();
//! }
//!
//! // Not connected, so the record is dropped
//! assert!(last.record().is_some());
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod events;
pub mod link;
pub mod stats;

// Re-export key types at crate root for convenience
pub use collector::{Axis, CollectorError, Sample, SyntheticCollector, SyntheticConfig};
pub use config::{Config, ConfigError, LinkConfig};
pub use core::{
    ExportBuilder, FeatureRecord, Orientation, SamplingController, SampleWindow,
    SpectralAnalyzer, WindowOutcome,
};
pub use events::{Notification, NotificationQueue, Notifier};
pub use link::{LinkSession, LinkState, TcpTransport, Transport, TransportEvent};
pub use stats::{SessionStats, SharedSessionStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
