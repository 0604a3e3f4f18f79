//! Session export of feature records.
//!
//! Every completed window that produced a record is kept with its wire line
//! and whether it reached the peer, then written as one JSON document at the
//! end of the session. Non-finite feature values are exported as `null`; the
//! wire line keeps their textual form.

use crate::core::controller::WindowOutcome;
use crate::core::features::FeatureRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

/// The current export format version.
pub const EXPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "motion-link";

/// Producer metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ExportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
    /// Host name of the sampling device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

/// One exported window.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedWindow {
    /// Position of the window within the session
    pub index: u64,
    /// When the window completed (RFC3339)
    pub completed_at: String,
    /// Wire payload as sent (or as it would have been sent)
    pub line: String,
    pub record: FeatureRecord,
    /// Whether the record was handed to a connected link
    pub delivered: bool,
}

/// A session's worth of exported records.
#[derive(Debug, Clone, Serialize)]
pub struct RecordExport {
    pub export_version: String,
    pub session_id: String,
    pub producer: ExportProducer,
    pub started_at: String,
    pub exported_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
    pub windows: Vec<ExportedWindow>,
}

/// Collects records during a session.
pub struct ExportBuilder {
    instance_id: Uuid,
    session_id: String,
    device: Option<String>,
    started_at: DateTime<Utc>,
    windows: Vec<ExportedWindow>,
    next_index: u64,
}

impl ExportBuilder {
    pub fn new() -> Self {
        let started_at = Utc::now();
        Self {
            instance_id: Uuid::new_v4(),
            session_id: format!("SESS-{}", started_at.timestamp_millis()),
            device: hostname::get().ok().and_then(|h| h.into_string().ok()),
            started_at,
            windows: Vec::new(),
            next_index: 0,
        }
    }

    pub fn with_session_id(mut self, session_id: String) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Record the outcome of a sample. Only completed windows are counted.
    pub fn push(&mut self, outcome: &WindowOutcome) {
        if !outcome.is_window_end() {
            return;
        }

        let index = self.next_index;
        self.next_index += 1;

        if let Some(record) = outcome.record() {
            self.windows.push(ExportedWindow {
                index,
                completed_at: Utc::now().to_rfc3339(),
                line: record.to_string(),
                record: *record,
                delivered: matches!(outcome, WindowOutcome::Sent(_)),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Assemble the export document.
    pub fn build(&self, peer: Option<&str>) -> RecordExport {
        RecordExport {
            export_version: EXPORT_VERSION.to_string(),
            session_id: self.session_id.clone(),
            producer: ExportProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: self.instance_id.to_string(),
                device: self.device.clone(),
            },
            started_at: self.started_at.to_rfc3339(),
            exported_at: Utc::now().to_rfc3339(),
            peer: peer.map(str::to_string),
            windows: self.windows.clone(),
        }
    }

    /// Write the export document to `path` as pretty JSON.
    pub fn write_json(&self, path: &Path, peer: Option<&str>) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json =
            serde_json::to_string_pretty(&self.build(peer)).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl Default for ExportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
