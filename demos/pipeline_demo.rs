//! Demonstration of the motion link pipeline without a network.
//!
//! This example shows how to:
//! 1. Start a synthetic motion source on the notification queue
//! 2. Drive a sampling controller from the queue
//! 3. Watch records get dropped until the link connects
//! 4. Decode the records the peer received
//!
//! Run with: cargo run --example pipeline_demo

use std::time::{Duration, Instant};

use motion_link::{
    collector::{Axis, SyntheticCollector, SyntheticConfig},
    core::{FeatureRecord, SamplingController, WindowOutcome},
    events::{NotificationQueue, QueueError},
    link::{LinkSession, RecordingTransport, TransportEvent},
};

const WINDOW_SIZE: usize = 128;

fn main() {
    println!("Motion Link - Pipeline Demo");
    println!("===========================");
    println!();

    let queue = NotificationQueue::new();
    let link_events = queue.notifier();

    let session = LinkSession::new(RecordingTransport::new());
    let mut controller = match SamplingController::new(WINDOW_SIZE, 1e-9, session) {
        Ok(controller) => controller,
        Err(e) => {
            eprintln!("Failed to create controller: {e}");
            return;
        }
    };

    if let Err(e) = controller.session_mut().connect("demo-peer") {
        eprintln!("Failed to request connection: {e}");
        return;
    }

    // 8 Hz on y while lying flat, sampled at 500 Hz
    let source = SyntheticConfig {
        signal_hz: 8.0,
        amplitude: 0.5,
        axis: Axis::Y,
        bias: [0.0, 0.0, 9.81],
        sample_interval: Duration::from_millis(2),
    };
    println!(
        "Source: {} Hz on {:?} at {:.0} samples/s",
        source.signal_hz,
        source.axis,
        source.sample_rate()
    );
    println!("Window: {WINDOW_SIZE} samples");
    println!();

    let mut collector = SyntheticCollector::new(source, queue.notifier());
    if let Err(e) = collector.start() {
        eprintln!("Error starting collector: {e}");
        return;
    }

    let started = Instant::now();
    let mut connected = false;
    let mut windows = 0;

    while windows < 4 {
        // The peer answers after the first window has already been dropped
        if !connected && windows >= 1 {
            let request = controller.session().current_request().unwrap_or_default();
            link_events.link(request, TransportEvent::Connected {
                peer_name: "demo-peer".to_string(),
            });
            connected = true;
        }

        match queue.recv_timeout(Duration::from_millis(100)) {
            Ok(notification) => match controller.handle(notification) {
                Ok(Some(outcome)) if outcome.is_window_end() => {
                    windows += 1;
                    match outcome {
                        WindowOutcome::Sent(record) => {
                            println!("Window {windows}: sent    {record}")
                        }
                        WindowOutcome::Dropped { reason, .. } => {
                            println!("Window {windows}: dropped ({reason})")
                        }
                        WindowOutcome::Filling => {}
                    }
                }
                Ok(_) => {}
                Err(e) => eprintln!("Sample rejected: {e}"),
            },
            Err(QueueError::Timeout) | Err(QueueError::Empty) => {}
            Err(QueueError::Cancelled) => break,
        }

        if started.elapsed() > Duration::from_secs(10) {
            eprintln!("Timed out waiting for windows");
            break;
        }
    }

    collector.stop();
    queue.cancel();
    controller.session_mut().stop();

    println!();
    println!("Dialed: {}", controller.session().transport().connects().join(", "));
    println!("Peer received:");
    for line in controller.session().transport().written_lines() {
        match line.parse::<FeatureRecord>() {
            Ok(record) => println!(
                "  {} | dominant y = {:.2} Hz | peak y = {:.2}",
                record.orientation.label(),
                record.freq_y,
                record.mag_y
            ),
            Err(e) => println!("  undecodable record {line:?}: {e}"),
        }
    }

    println!();
    println!("{}", controller.stats().summary());
}
