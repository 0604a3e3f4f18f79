//! Sampling controller: drives the window, analysis and link send.
//!
//! The controller owns the sample window, the spectral analyzer and the link
//! session. Each sample is pushed into the window; the push that completes it
//! runs analysis, classification and the send inline, then resets the window.
//! Link state never blocks sampling: a record produced while disconnected is
//! dropped and the next window starts immediately.

use crate::collector::types::Sample;
use crate::core::features::{compute_record, FeatureRecord};
use crate::core::spectral::{SpectralAnalyzer, SpectralError};
use crate::core::windowing::{SampleWindow, WindowError, WindowStatus};
use crate::events::Notification;
use crate::link::{LinkError, LinkEvent, LinkSession, Transport, TransportEvent};
use crate::stats::{create_shared_stats, SharedSessionStats};
use tracing::{debug, error, warn};

/// Why a completed window did not reach the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// The link was not connected
    NotConnected,
    /// The window spanned no time
    DegenerateWindow,
    /// The transport rejected the write
    Transport(String),
    /// Analysis failed on a full window of the planned size
    Analysis(String),
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::NotConnected => write!(f, "link not connected"),
            DropReason::DegenerateWindow => write!(f, "window spans no time"),
            DropReason::Transport(e) => write!(f, "{e}"),
            DropReason::Analysis(e) => write!(f, "analysis failed: {e}"),
        }
    }
}

/// What happened to a sample.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    /// The window is still filling
    Filling,
    /// The window completed and its record was handed to the link
    Sent(FeatureRecord),
    /// The window completed but nothing was delivered
    Dropped {
        record: Option<FeatureRecord>,
        reason: DropReason,
    },
}

impl WindowOutcome {
    /// The record produced by a completed window, if any.
    pub fn record(&self) -> Option<&FeatureRecord> {
        match self {
            WindowOutcome::Sent(record) => Some(record),
            WindowOutcome::Dropped { record, .. } => record.as_ref(),
            WindowOutcome::Filling => None,
        }
    }

    /// Whether this sample completed a window.
    pub fn is_window_end(&self) -> bool {
        !matches!(self, WindowOutcome::Filling)
    }
}

/// Orchestrates the sampling pipeline and forwards records to the link.
pub struct SamplingController<T: Transport> {
    window: SampleWindow,
    analyzer: SpectralAnalyzer,
    session: LinkSession<T>,
    stats: SharedSessionStats,
    /// Index of the window currently filling
    window_index: u64,
}

impl<T: Transport> SamplingController<T> {
    /// Create a controller for windows of `window_size` samples.
    ///
    /// Fails with [`SpectralError::InvalidLength`] unless `window_size` is a
    /// power of two.
    pub fn new(
        window_size: usize,
        timestamp_unit_secs: f64,
        session: LinkSession<T>,
    ) -> Result<Self, SpectralError> {
        let analyzer = SpectralAnalyzer::new(window_size, timestamp_unit_secs)?;
        Ok(Self {
            window: SampleWindow::new(window_size),
            analyzer,
            session,
            stats: create_shared_stats(),
            window_index: 0,
        })
    }

    /// Use `stats` instead of a private counter set.
    pub fn with_stats(mut self, stats: SharedSessionStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn session(&self) -> &LinkSession<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut LinkSession<T> {
        &mut self.session
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    pub fn stats(&self) -> &SharedSessionStats {
        &self.stats
    }

    /// Number of windows completed so far.
    pub fn windows_completed(&self) -> u64 {
        self.window_index
    }

    /// Handle one item from the notification queue.
    ///
    /// Returns the window outcome for samples and `None` for link events.
    pub fn handle(
        &mut self,
        notification: Notification,
    ) -> Result<Option<WindowOutcome>, WindowError> {
        match notification {
            Notification::Sample(sample) => self.on_sample(sample).map(Some),
            Notification::Link(event) => {
                self.on_transport_event(event);
                Ok(None)
            }
        }
    }

    /// Push one sample through the pipeline.
    pub fn on_sample(&mut self, sample: Sample) -> Result<WindowOutcome, WindowError> {
        let status = self.window.push(sample)?;
        self.stats.record_sample();
        if status == WindowStatus::Filling {
            return Ok(WindowOutcome::Filling);
        }

        let outcome = self.consume_window();
        self.window.reset();
        self.window_index += 1;
        Ok(outcome)
    }

    /// Apply a transport outcome to the link session.
    pub fn on_transport_event(&mut self, event: LinkEvent) {
        if let TransportEvent::Received(ref bytes) = event.event {
            self.stats.record_bytes_received(bytes.len() as u64);
        }
        self.session.handle_transport(event);
    }

    /// Analyze, classify and send the completed window.
    fn consume_window(&mut self) -> WindowOutcome {
        self.stats.record_window_completed();

        let spectrum = match self.analyzer.analyze(&self.window) {
            Ok(spectrum) => spectrum,
            Err(e @ SpectralError::DegenerateWindow { .. }) => {
                warn!("Skipping window {}: {}", self.window_index, e);
                self.stats.record_degenerate_window();
                return WindowOutcome::Dropped {
                    record: None,
                    reason: DropReason::DegenerateWindow,
                };
            }
            Err(e) => {
                // The window is full and sized for the analyzer, so this is a bug
                error!("Analysis of window {} failed: {}", self.window_index, e);
                self.stats.record_dropped();
                return WindowOutcome::Dropped {
                    record: None,
                    reason: DropReason::Analysis(e.to_string()),
                };
            }
        };

        let record = compute_record(self.window.axis_means(), &spectrum);

        match self.session.send(&record.to_wire()) {
            Ok(()) => {
                self.stats.record_sent();
                WindowOutcome::Sent(record)
            }
            Err(LinkError::NotConnected) => {
                debug!("Link not connected, dropping window {}", self.window_index);
                self.stats.record_dropped();
                WindowOutcome::Dropped {
                    record: Some(record),
                    reason: DropReason::NotConnected,
                }
            }
            Err(e) => {
                self.stats.record_dropped();
                WindowOutcome::Dropped {
                    record: Some(record),
                    reason: DropReason::Transport(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::Orientation;
    use crate::link::{LinkState, RecordingTransport};
    use std::f64::consts::PI;

    const N: usize = 128;
    const DT_NS: i64 = 10_000_000;

    fn controller() -> SamplingController<RecordingTransport> {
        SamplingController::new(N, 1e-9, LinkSession::new(RecordingTransport::new())).unwrap()
    }

    fn connect(controller: &mut SamplingController<RecordingTransport>) {
        controller.session_mut().connect("peer").unwrap();
        let request = controller.session().transport().last_request();
        controller.on_transport_event(LinkEvent::new(
            request,
            TransportEvent::Connected {
                peer_name: "peer".to_string(),
            },
        ));
        assert_eq!(controller.session().state(), LinkState::Connected);
    }

    /// Feed one full window; returns the outcome of the last push.
    fn feed_window(
        controller: &mut SamplingController<RecordingTransport>,
        start_tick: i64,
        f: impl Fn(i64) -> Sample,
    ) -> WindowOutcome {
        let mut last = WindowOutcome::Filling;
        for i in 0..N as i64 {
            last = controller.on_sample(f(start_tick + i)).unwrap();
        }
        last
    }

    fn resting_on_top(i: i64) -> Sample {
        let t = (i * DT_NS) as f64 * 1e-9;
        Sample::new(
            0.2 * (2.0 * PI * 6.25 * t).cos(),
            0.1 * (2.0 * PI * 12.5 * t).cos(),
            9.81 + 0.5 * (2.0 * PI * 3.125 * t).cos(),
            i * DT_NS,
        )
    }

    #[test]
    fn test_rejects_invalid_window_size() {
        let session = LinkSession::new(RecordingTransport::new());
        let result = SamplingController::new(100, 1e-9, session);
        assert!(matches!(result, Err(SpectralError::InvalidLength(100))));
    }

    #[test]
    fn test_sends_one_record_per_window_when_connected() {
        let mut controller = controller();
        connect(&mut controller);

        let outcome = feed_window(&mut controller, 0, resting_on_top);
        let record = match outcome {
            WindowOutcome::Sent(record) => record,
            other => panic!("expected Sent, got {other:?}"),
        };

        assert_eq!(record.orientation, Orientation::Top);
        assert_eq!(controller.window().len(), 0);

        let lines = controller.session().transport().written_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], record.to_string());
    }

    #[test]
    fn test_drops_record_when_not_connected() {
        let mut controller = controller();
        controller.session_mut().start().unwrap();

        let outcome = feed_window(&mut controller, 0, resting_on_top);
        assert!(matches!(
            outcome,
            WindowOutcome::Dropped {
                record: Some(_),
                reason: DropReason::NotConnected
            }
        ));
        assert!(controller.session().transport().writes().is_empty());
        assert_eq!(controller.session().state(), LinkState::Listening);

        // Sampling continues unaffected
        assert_eq!(
            controller.on_sample(resting_on_top(N as i64)).unwrap(),
            WindowOutcome::Filling
        );
        assert_eq!(controller.window().len(), 1);
    }

    #[test]
    fn test_degenerate_window_is_skipped() {
        let mut controller = controller();
        connect(&mut controller);

        let outcome = feed_window(&mut controller, 0, |_| Sample::new(10.0, 0.0, 0.0, 0));
        assert_eq!(
            outcome,
            WindowOutcome::Dropped {
                record: None,
                reason: DropReason::DegenerateWindow
            }
        );
        assert_eq!(controller.window().len(), 0);
        assert!(controller.session().transport().writes().is_empty());
        assert_eq!(controller.stats().snapshot().degenerate_windows, 1);
        assert_eq!(controller.stats().snapshot().records_dropped, 0);

        // Next window goes through
        let outcome = feed_window(&mut controller, N as i64, resting_on_top);
        assert!(matches!(outcome, WindowOutcome::Sent(_)));
    }

    #[test]
    fn test_drop_reasons_display() {
        assert_eq!(DropReason::DegenerateWindow.to_string(), "window spans no time");
        let analysis = DropReason::Analysis(
            SpectralError::IncompleteWindow {
                expected: N,
                actual: 3,
            }
            .to_string(),
        );
        assert_eq!(
            analysis.to_string(),
            "analysis failed: Window holds 3 of 128 samples"
        );
    }

    #[test]
    fn test_handles_queue_notifications_in_order() {
        let mut controller = controller();
        controller.session_mut().connect("peer").unwrap();
        let request = controller.session().transport().last_request();

        let mut outcomes = Vec::new();
        for i in 0..N as i64 {
            if i == 10 {
                let connected = TransportEvent::Connected {
                    peer_name: "peer".to_string(),
                };
                let handled = controller
                    .handle(Notification::Link(LinkEvent::new(request, connected)))
                    .unwrap();
                assert!(handled.is_none());
            }
            let sample = Notification::Sample(resting_on_top(i));
            if let Some(outcome) = controller.handle(sample).unwrap() {
                outcomes.push(outcome);
            }
        }

        assert!(matches!(outcomes.last(), Some(WindowOutcome::Sent(_))));
        assert_eq!(controller.windows_completed(), 1);
    }

    #[test]
    fn test_stop_does_not_break_sampling() {
        let mut controller = controller();
        connect(&mut controller);
        controller.session_mut().stop();

        let outcome = feed_window(&mut controller, 0, resting_on_top);
        assert!(matches!(
            outcome,
            WindowOutcome::Dropped {
                reason: DropReason::NotConnected,
                ..
            }
        ));
    }

    #[test]
    fn test_stats_track_pipeline() {
        let mut controller = controller();
        connect(&mut controller);
        feed_window(&mut controller, 0, resting_on_top);
        let request = controller.session().transport().last_request();
        let received = TransportEvent::Received(b"ok".to_vec());
        controller.on_transport_event(LinkEvent::new(request, received));

        let stats = controller.stats().snapshot();
        assert_eq!(stats.samples_received, N as u64);
        assert_eq!(stats.windows_completed, 1);
        assert_eq!(stats.records_sent, 1);
        assert_eq!(stats.bytes_received, 2);
    }
}
