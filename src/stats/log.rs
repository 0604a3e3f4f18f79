//! Counters describing a sampling session.
//!
//! Counters are atomics so the pipeline thread can update them while another
//! thread reads a snapshot. Totals can be persisted to JSON and are added to
//! on the next run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Pipeline counters for the current session.
#[derive(Debug)]
pub struct SessionStats {
    /// Samples pushed into the window
    samples_received: AtomicU64,
    /// Windows that reached full capacity
    windows_completed: AtomicU64,
    /// Records handed to the link
    records_sent: AtomicU64,
    /// Records dropped because the link was not connected
    records_dropped: AtomicU64,
    /// Windows skipped because they spanned no time
    degenerate_windows: AtomicU64,
    /// Bytes received from the peer
    bytes_received: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            samples_received: AtomicU64::new(0),
            windows_completed: AtomicU64::new(0),
            records_sent: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            degenerate_windows: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats that load from and save to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            warn!("Could not load previous session stats: {}", e);
        }

        stats
    }

    pub fn record_sample(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_completed(&self) {
        self.windows_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.records_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degenerate_window(&self) {
        self.degenerate_windows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_received(&self, count: u64) {
        self.bytes_received.fetch_add(count, Ordering::Relaxed);
    }

    /// Current values.
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            windows_completed: self.windows_completed.load(Ordering::Relaxed),
            records_sent: self.records_sent.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            degenerate_windows: self.degenerate_windows.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Multi-line summary for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Samples received: {}\n\
             - Windows completed: {}\n\
             - Records sent: {}\n\
             - Records dropped (not connected): {}\n\
             - Degenerate windows skipped: {}\n\
             - Bytes received from peer: {}\n\
             - Session duration: {} seconds",
            stats.samples_received,
            stats.windows_completed,
            stats.records_sent,
            stats.records_dropped,
            stats.degenerate_windows,
            stats.bytes_received,
            stats.session_duration_secs
        )
    }

    /// Save totals to disk, if a path was configured.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.snapshot();
            let persisted = PersistedStats {
                samples_received: stats.samples_received,
                windows_completed: stats.windows_completed,
                records_sent: stats.records_sent,
                records_dropped: stats.records_dropped,
                degenerate_windows: stats.degenerate_windows,
                bytes_received: stats.bytes_received,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.samples_received
                    .store(persisted.samples_received, Ordering::Relaxed);
                self.windows_completed
                    .store(persisted.windows_completed, Ordering::Relaxed);
                self.records_sent
                    .store(persisted.records_sent, Ordering::Relaxed);
                self.records_dropped
                    .store(persisted.records_dropped, Ordering::Relaxed);
                self.degenerate_windows
                    .store(persisted.degenerate_windows, Ordering::Relaxed);
                self.bytes_received
                    .store(persisted.bytes_received, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.samples_received.store(0, Ordering::Relaxed);
        self.windows_completed.store(0, Ordering::Relaxed);
        self.records_sent.store(0, Ordering::Relaxed);
        self.records_dropped.store(0, Ordering::Relaxed);
        self.degenerate_windows.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatsSnapshot {
    pub samples_received: u64,
    pub windows_completed: u64,
    pub records_sent: u64,
    pub records_dropped: u64,
    pub degenerate_windows: u64,
    pub bytes_received: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    samples_received: u64,
    windows_completed: u64,
    records_sent: u64,
    records_dropped: u64,
    degenerate_windows: u64,
    bytes_received: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared session stats.
pub type SharedSessionStats = Arc<SessionStats>;

pub fn create_shared_stats() -> SharedSessionStats {
    Arc::new(SessionStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedSessionStats {
    Arc::new(SessionStats::with_persistence(path))
}
