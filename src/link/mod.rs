//! Reliable point-to-point link to the paired peer.
//!
//! This module provides the [`LinkSession`] state machine and the
//! [`Transport`] seam it drives, with an in-memory transport for tests and
//! demos and a TCP transport for real use.

pub mod session;
pub mod tcp;
pub mod transport;

// Re-export commonly used types
pub use session::{
    LinkError, LinkNotification, LinkRequest, LinkSession, LinkState, NOTIFICATION_CAPACITY,
};
pub use tcp::{TcpTransport, TcpTransportConfig};
pub use transport::{
    LinkEvent, RecordingTransport, RequestId, Transport, TransportError, TransportEvent,
};
