//! Byte-level transport behind a link session.
//!
//! The session only decides *whether* it may talk to the peer. Moving bytes,
//! framing and socket error handling belong to a [`Transport`]. Transport
//! calls return as soon as the request is accepted; the outcome arrives later
//! as a [`LinkEvent`] on the owner's notification queue.
//!
//! Every `listen` and `connect` returns a fresh [`RequestId`], and every event
//! produced on behalf of that request carries it. Outcomes of a request that
//! has since been superseded can then be told apart from current ones.

use serde::{Deserialize, Serialize};

/// Asynchronous outcome reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportEvent {
    /// The listener is bound and waiting for a peer
    Listening { address: String },
    /// The listener could not be set up
    ListenFailed { reason: String },
    /// A connection (outbound or accepted) completed its handshake
    Connected { peer_name: String },
    /// An outbound connection attempt failed
    ConnectFailed { reason: String },
    /// An established connection dropped
    LinkLost { reason: String },
    /// Inbound bytes from the peer
    Received(Vec<u8>),
    /// A write was flushed to the peer
    Written(usize),
    /// A write could not be delivered
    WriteFailed { reason: String },
}

/// Identifies one `listen` or `connect` request of a transport.
pub type RequestId = u64;

/// A transport outcome tagged with the request it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEvent {
    pub request: RequestId,
    pub event: TransportEvent,
}

impl LinkEvent {
    pub fn new(request: RequestId, event: TransportEvent) -> Self {
        Self { request, event }
    }
}

/// Errors a transport reports synchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer address could not be used
    InvalidAddress(String),
    /// No connection is available for writing
    NotOpen,
    /// Any other I/O failure
    Io(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::InvalidAddress(addr) => write!(f, "Invalid peer address: {addr}"),
            TransportError::NotOpen => write!(f, "Transport has no open connection"),
            TransportError::Io(e) => write!(f, "Transport I/O error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// The byte-level collaborator of a [`LinkSession`](crate::link::LinkSession).
pub trait Transport {
    /// Start accepting an inbound connection, superseding any earlier request.
    fn listen(&mut self) -> Result<RequestId, TransportError>;

    /// Start connecting to `peer`, superseding any earlier request.
    fn connect(&mut self, peer: &str) -> Result<RequestId, TransportError>;

    /// Queue `bytes` for delivery to the connected peer.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Close every listener and connection. Must be safe to call repeatedly.
    fn shutdown(&mut self);
}

/// In-memory transport that records every request.
///
/// Outcomes are not generated; the caller feeds [`LinkEvent`]s to the
/// session itself.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    last_request: RequestId,
    listens: usize,
    connects: Vec<String>,
    writes: Vec<Vec<u8>>,
    shutdowns: usize,
    fail_writes: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later write fail synchronously.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn listen_count(&self) -> usize {
        self.listens
    }

    pub fn connects(&self) -> &[String] {
        &self.connects
    }

    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Writes decoded as UTF-8 text.
    pub fn written_lines(&self) -> Vec<String> {
        self.writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns
    }

    /// Id handed out by the most recent `listen` or `connect`.
    pub fn last_request(&self) -> RequestId {
        self.last_request
    }

    fn next_request(&mut self) -> RequestId {
        self.last_request += 1;
        self.last_request
    }
}

impl Transport for RecordingTransport {
    fn listen(&mut self) -> Result<RequestId, TransportError> {
        self.listens += 1;
        Ok(self.next_request())
    }

    fn connect(&mut self, peer: &str) -> Result<RequestId, TransportError> {
        if peer.trim().is_empty() {
            return Err(TransportError::InvalidAddress(peer.to_string()));
        }
        self.connects.push(peer.to_string());
        Ok(self.next_request())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.fail_writes {
            return Err(TransportError::Io("write rejected".to_string()));
        }
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    fn shutdown(&mut self) {
        self.shutdowns += 1;
    }
}
