//! Motion Link CLI
//!
//! Samples a motion source, extracts per-window spectral features and
//! streams them to a paired peer over TCP.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use motion_link::{
    collector::{Axis, SyntheticCollector, SyntheticConfig},
    config::Config,
    core::{ExportBuilder, FeatureRecord, SamplingController, WindowOutcome},
    events::{NotificationQueue, QueueError},
    link::{LinkNotification, LinkSession, TcpTransport, Transport},
    stats::{create_shared_stats_with_persistence, SessionStats},
    VERSION,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "motion-link")]
#[command(version = VERSION)]
#[command(about = "Stream spectral motion features to a paired peer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start sampling and serve the link
    Start {
        /// Address to listen on for a peer (overrides config)
        #[arg(long)]
        listen: Option<String>,

        /// Connect to this peer instead of listening
        #[arg(long)]
        connect: Option<String>,

        /// Frequency of the synthetic signal in Hz
        #[arg(long, default_value = "5.0")]
        signal_hz: f64,

        /// Axis carrying the synthetic signal (x, y or z)
        #[arg(long, default_value = "x")]
        axis: String,

        /// Sampling rate in Hz (overrides config)
        #[arg(long)]
        rate_hz: Option<f64>,

        /// Export produced records when stopping
        #[arg(long)]
        export: bool,
    },

    /// Show configuration and cumulative statistics
    Status,

    /// Decode a wire record
    Decode {
        /// Comma-separated record line
        line: String,
    },

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("motion_link=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            listen,
            connect,
            signal_hz,
            axis,
            rate_hz,
            export,
        } => cmd_start(listen, connect, signal_hz, &axis, rate_hz, export),
        Commands::Status => cmd_status(),
        Commands::Decode { line } => cmd_decode(&line),
        Commands::Config { save } => cmd_config(save),
    }
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {e}; using defaults");
        Config::default()
    })
}

fn cmd_start(
    listen: Option<String>,
    connect: Option<String>,
    signal_hz: f64,
    axis: &str,
    rate_hz: Option<f64>,
    export: bool,
) -> Result<()> {
    let Some(axis) = Axis::from_name(axis) else {
        bail!("--axis must be x, y or z, got {axis:?}");
    };

    println!("Motion Link v{VERSION}");
    println!();

    let mut config = load_config();
    if let Some(addr) = listen {
        config.link.listen_addr = addr;
    }
    if connect.is_some() {
        config.link.peer_addr = connect;
    }
    if let Some(rate) = rate_hz {
        config.set_sample_rate(rate).context("invalid --rate-hz")?;
    }
    config.validate().context("invalid configuration")?;

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let stats = create_shared_stats_with_persistence(config.stats_path());
    let queue = NotificationQueue::new();

    let transport = TcpTransport::new(config.link.transport_config(), queue.notifier())
        .context("failed to create link transport")?;
    let mut session = LinkSession::new(transport);

    match config.link.peer_addr.as_deref() {
        Some(peer) => {
            println!("Connecting to {peer}...");
            session.connect(peer).context("failed to request connection")?;
        }
        None => {
            println!("Listening on {}...", config.link.listen_addr);
            session.start().context("failed to start listening")?;
        }
    }

    let mut controller =
        SamplingController::new(config.window_size, config.timestamp_unit_secs, session)
            .context("failed to create sampling controller")?
            .with_stats(stats.clone());

    let source = SyntheticConfig {
        signal_hz,
        axis,
        sample_interval: config.sample_interval,
        ..SyntheticConfig::default()
    };
    println!(
        "  Window: {} samples at {:.1} Hz",
        config.window_size,
        source.sample_rate()
    );
    println!("  Signal: {} Hz on {:?}", source.signal_hz, source.axis);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let mut collector = SyntheticCollector::new(source, queue.notifier());
    let mut export_builder = ExportBuilder::new();
    if export {
        println!("Instance ID: {}", export_builder.instance_id());
        println!();
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    collector.start().context("failed to start collector")?;

    while running.load(Ordering::SeqCst) {
        match queue.recv_timeout(Duration::from_millis(100)) {
            Ok(notification) => match controller.handle(notification) {
                Ok(Some(outcome)) => {
                    if outcome.is_window_end() {
                        report_window(controller.windows_completed(), &outcome);
                    }
                    if export {
                        export_builder.push(&outcome);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Sample rejected: {}", e),
            },
            Err(QueueError::Timeout) | Err(QueueError::Empty) => {}
            Err(QueueError::Cancelled) => break,
        }

        report_link(controller.session());
    }

    println!();
    println!("Stopping...");
    collector.stop();
    queue.cancel();

    let peer = controller.session().peer_name().map(str::to_string);
    controller.session_mut().stop();
    report_link(controller.session());

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save session stats: {e}");
    }

    if export && !export_builder.is_empty() {
        let export_path = config.export_path.join(format!(
            "session_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        match export_builder.write_json(&export_path, peer.as_deref()) {
            Ok(()) => println!(
                "Exported {} records to {:?}",
                export_builder.len(),
                export_path
            ),
            Err(e) => eprintln!("Error writing export: {e}"),
        }
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn report_window(index: u64, outcome: &WindowOutcome) {
    let now = Utc::now().format("%H:%M:%S");
    match outcome {
        WindowOutcome::Sent(record) => {
            println!(
                "[{now}] Window {index}: {} | sent {record}",
                record.orientation.label()
            );
        }
        WindowOutcome::Dropped {
            record: Some(record),
            reason,
        } => {
            println!(
                "[{now}] Window {index}: {} | dropped ({reason})",
                record.orientation.label()
            );
        }
        WindowOutcome::Dropped { record: None, reason } => {
            println!("[{now}] Window {index}: skipped ({reason})");
        }
        WindowOutcome::Filling => {}
    }
}

fn report_link<T: Transport>(session: &LinkSession<T>) {
    for notification in session.notifications().try_iter() {
        match notification {
            LinkNotification::StateChanged { from, to } => println!("[Link] {from} -> {to}"),
            LinkNotification::Toast(message) => println!("[Link] {message}"),
            LinkNotification::Received { len, .. } => {
                println!("[Link] Received {len} bytes from peer")
            }
            LinkNotification::PeerConnected { .. } | LinkNotification::Written { .. } => {}
        }
    }
}

fn cmd_status() -> Result<()> {
    let config = load_config();

    println!("Motion Link Status");
    println!("==================");
    println!();
    println!("Configuration:");
    println!("  Window size: {} samples", config.window_size);
    println!(
        "  Sample interval: {}ms",
        config.sample_interval.as_millis()
    );
    match config.link.peer_addr {
        Some(ref peer) => println!("  Link: connect to {peer}"),
        None => println!("  Link: listen on {}", config.link.listen_addr),
    }
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        let stats = SessionStats::with_persistence(stats_path).snapshot();
        println!("Cumulative Statistics:");
        println!("  Samples received: {}", stats.samples_received);
        println!("  Windows completed: {}", stats.windows_completed);
        println!("  Records sent: {}", stats.records_sent);
        println!("  Records dropped: {}", stats.records_dropped);
        println!("  Degenerate windows: {}", stats.degenerate_windows);
        println!("  Bytes received: {}", stats.bytes_received);
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_decode(line: &str) -> Result<()> {
    let record: FeatureRecord = line
        .parse()
        .with_context(|| format!("could not decode {line:?}"))?;

    println!(
        "Orientation: {} ({})",
        record.orientation.label(),
        record.orientation.code()
    );
    println!(
        "Dominant frequency (Hz): x={} y={} z={}",
        record.freq_x, record.freq_y, record.freq_z
    );
    println!(
        "Peak magnitude:          x={} y={} z={}",
        record.mag_x, record.mag_y, record.mag_z
    );
    println!(
        "Magnitude ratios:        x/y={} y/z={} z/x={}",
        record.ratio_xy, record.ratio_yz, record.ratio_zx
    );
    if !record.is_finite() {
        println!("Note: record contains non-finite values");
    }
    Ok(())
}

fn cmd_config(save: bool) -> Result<()> {
    let config = load_config();
    if save {
        config.save().context("failed to save configuration")?;
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    if save {
        println!();
        println!("Saved.");
    }
    Ok(())
}
