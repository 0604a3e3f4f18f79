//! Session statistics for the motion link pipeline.
//!
//! This module counts what the pipeline did with the data it sampled:
//! how many windows were analyzed, delivered, or dropped and why.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_stats, create_shared_stats_with_persistence, SessionStats, SessionStatsSnapshot,
    SharedSessionStats,
};
