//! TCP transport running on a private tokio runtime.
//!
//! Requests return immediately; connection work runs as tokio tasks that
//! report outcomes on the owner's notification queue. Each connection gets a
//! writer task fed through an unbounded channel, so writes are delivered in
//! the order they were queued. The peer display name is the remote socket
//! address.

use crate::events::Notifier;
use crate::link::transport::{RequestId, Transport, TransportError, TransportEvent};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Settings for the TCP transport.
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// Address the listener binds to
    pub listen_addr: String,
    /// Size of the inbound read buffer
    pub read_buffer_size: usize,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:7878".to_string(),
            read_buffer_size: 1024,
        }
    }
}

/// A point-to-point TCP transport.
pub struct TcpTransport {
    config: TcpTransportConfig,
    events: Notifier,
    runtime: Runtime,
    listener_task: Option<JoinHandle<()>>,
    connection_task: Option<JoinHandle<()>>,
    writer: Option<UnboundedSender<Vec<u8>>>,
    last_request: RequestId,
}

impl TcpTransport {
    /// Create a transport that reports outcomes through `events`.
    pub fn new(config: TcpTransportConfig, events: Notifier) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("motion-link-tcp")
            .enable_all()
            .build()
            .map_err(|e| TransportError::Io(e.to_string()))?;

        Ok(Self {
            config,
            events,
            runtime,
            listener_task: None,
            connection_task: None,
            writer: None,
            last_request: 0,
        })
    }

    fn next_request(&mut self) -> RequestId {
        self.last_request += 1;
        self.last_request
    }

    fn abort_listener(&mut self) {
        if let Some(task) = self.listener_task.take() {
            task.abort();
        }
    }

    fn abort_connection(&mut self) {
        self.writer = None;
        if let Some(task) = self.connection_task.take() {
            task.abort();
        }
    }
}

impl Transport for TcpTransport {
    fn listen(&mut self) -> Result<RequestId, TransportError> {
        self.abort_listener();
        self.abort_connection();
        let request = self.next_request();

        let (writer, writes) = unbounded_channel();
        self.writer = Some(writer);

        let addr = self.config.listen_addr.clone();
        let buffer_size = self.config.read_buffer_size;
        let events = self.events.clone();

        self.listener_task = Some(self.runtime.spawn(async move {
            let listener = match TcpListener::bind(&addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    events.link(request, TransportEvent::ListenFailed {
                        reason: format!("bind {addr}: {e}"),
                    });
                    return;
                }
            };

            let local = listener
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or(addr);
            events.link(request, TransportEvent::Listening { address: local });

            match listener.accept().await {
                Ok((stream, peer)) => {
                    // One peer at a time; stop accepting once connected.
                    drop(listener);
                    run_connection(request, stream, peer, writes, events, buffer_size).await;
                }
                Err(e) => {
                    events.link(request, TransportEvent::ListenFailed {
                        reason: format!("accept: {e}"),
                    });
                }
            }
        }));

        Ok(request)
    }

    fn connect(&mut self, peer: &str) -> Result<RequestId, TransportError> {
        let addr = validate_peer(peer)?;

        // Free the listening port so a later fall back can bind it again.
        self.abort_listener();
        self.abort_connection();
        let request = self.next_request();

        let (writer, writes) = unbounded_channel();
        self.writer = Some(writer);

        let buffer_size = self.config.read_buffer_size;
        let events = self.events.clone();

        self.connection_task = Some(self.runtime.spawn(async move {
            let connected = TcpStream::connect(addr.as_str())
                .await
                .and_then(|stream| stream.peer_addr().map(|peer| (stream, peer)));
            match connected {
                Ok((stream, peer)) => {
                    run_connection(request, stream, peer, writes, events, buffer_size).await
                }
                Err(e) => {
                    events.link(request, TransportEvent::ConnectFailed {
                        reason: format!("{addr}: {e}"),
                    });
                }
            }
        }));

        Ok(request)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let writer = self.writer.as_ref().ok_or(TransportError::NotOpen)?;
        writer
            .send(bytes.to_vec())
            .map_err(|_| TransportError::NotOpen)
    }

    fn shutdown(&mut self) {
        self.abort_listener();
        self.abort_connection();
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Accept `ip:port` or `host:port`; returns the dial string.
fn validate_peer(peer: &str) -> Result<String, TransportError> {
    if peer.parse::<SocketAddr>().is_ok() {
        return Ok(peer.to_string());
    }

    match peer.rsplit_once(':') {
        Some((host, port))
            if !host.is_empty()
                && !host.contains(char::is_whitespace)
                && port.parse::<u16>().is_ok() =>
        {
            Ok(peer.to_string())
        }
        _ => Err(TransportError::InvalidAddress(peer.to_string())),
    }
}

/// Drive one established connection until it closes.
async fn run_connection(
    request: RequestId,
    stream: TcpStream,
    peer: SocketAddr,
    mut writes: UnboundedReceiver<Vec<u8>>,
    events: Notifier,
    buffer_size: usize,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", peer, e);
    }

    events.link(request, TransportEvent::Connected {
        peer_name: peer.to_string(),
    });

    let (mut reader, mut writer) = stream.into_split();

    let write_events = events.clone();
    let write_task = tokio::spawn(async move {
        while let Some(bytes) = writes.recv().await {
            match writer.write_all(&bytes).await {
                Ok(()) => {
                    write_events.link(request, TransportEvent::Written(bytes.len()));
                }
                Err(e) => {
                    write_events.link(request, TransportEvent::WriteFailed {
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }
    });

    let mut buffer = vec![0u8; buffer_size.max(1)];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                events.link(request, TransportEvent::LinkLost {
                    reason: format!("{peer} closed the connection"),
                });
                break;
            }
            Ok(n) => {
                events.link(request, TransportEvent::Received(buffer[..n].to_vec()));
            }
            Err(e) => {
                warn!("Read from {} failed: {}", peer, e);
                events.link(request, TransportEvent::LinkLost {
                    reason: e.to_string(),
                });
                break;
            }
        }
    }

    write_task.abort();
}
