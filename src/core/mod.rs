//! Core functionality for the motion link pipeline.
//!
//! This module contains:
//! - The fixed-capacity sample window
//! - Spectral analysis of completed windows
//! - Feature record assembly and wire format
//! - The sampling controller that ties them to the link
//! - Session export of produced records

pub mod controller;
pub mod export;
pub mod features;
pub mod spectral;
pub mod windowing;

// Re-export commonly used types
pub use controller::{DropReason, SamplingController, WindowOutcome};
pub use export::{ExportBuilder, RecordExport, EXPORT_VERSION, PRODUCER_NAME};
pub use features::{
    classify_orientation, compute_record, FeatureRecord, Orientation, ParseRecordError,
};
pub use spectral::{SpectralAnalyzer, SpectralError, SpectralFeatures, WindowSpectrum};
pub use windowing::{SampleWindow, WindowError, WindowStatus};
