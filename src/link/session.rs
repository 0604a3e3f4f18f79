//! Link session state machine.
//!
//! ```text
//!            start()                 connect(peer)
//!   None ─────────────▶ Listening ─────────────────▶ Connecting
//!    │  ▲                 ▲   │ inbound accept          │
//!    │  │  fall back      │   └──────────┐              │ handshake ok
//!    │  └─────────────────┤              ▼              ▼
//!    │                    └─────────── Connected ◀──────┘
//!    │        connect failed / link lost
//!    └──▶ Connecting (connect(peer) from None)
//!
//!   stop(): any state ─▶ None (terminal)
//! ```
//!
//! After a failed connect or a lost link the session falls back to
//! `Listening` when it was started as a listener, otherwise to `None`.
//! Reconnecting is always an explicit request.
//!
//! All transitions happen through `&mut self`, so they are serialized by the
//! owner. Transport outcomes are only applied when they belong to the most
//! recent `listen`/`connect` request; anything from a superseded request is
//! ignored.
//!
//! State changes, inbound data and informational messages are published on a
//! bounded notification channel that the owner is expected to drain. When the
//! owner falls behind, further notifications are dropped and counted.

use crate::link::transport::{LinkEvent, RequestId, Transport, TransportError, TransportEvent};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Connection state of a link session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Idle, neither listening nor connected
    #[default]
    None,
    /// Waiting for an inbound peer
    Listening,
    /// Outbound connection attempt in progress
    Connecting,
    /// Connected to a peer; sends are allowed
    Connected,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LinkState::None => "none",
            LinkState::Listening => "listening",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// An explicit request made to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRequest {
    Start,
    Connect,
}

/// Errors returned by session requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// A send was attempted while not connected. The data was dropped.
    NotConnected,
    /// The session was stopped and cannot be restarted.
    Stopped,
    /// The request is not valid in the current state.
    InvalidTransition { from: LinkState, request: LinkRequest },
    /// The transport rejected the request.
    Transport(TransportError),
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkError::NotConnected => write!(f, "Link is not connected"),
            LinkError::Stopped => write!(f, "Link session was stopped"),
            LinkError::InvalidTransition { from, request } => {
                write!(f, "Cannot {request:?} while {from}")
            }
            LinkError::Transport(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LinkError {}

impl From<TransportError> for LinkError {
    fn from(e: TransportError) -> Self {
        LinkError::Transport(e)
    }
}

/// Notification published to the session owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkNotification {
    StateChanged { from: LinkState, to: LinkState },
    /// The connected peer's display name, sent once per connection
    PeerConnected { name: String },
    /// Inbound chunk from the peer
    Received { bytes: Vec<u8>, len: usize },
    Written { len: usize },
    /// Short informational message for a UI
    Toast(String),
}

/// Capacity of the session notification channel.
pub const NOTIFICATION_CAPACITY: usize = 1024;

/// Point-to-point link session over a [`Transport`].
///
/// The owner must drain [`LinkSession::notifications`]; once
/// [`NOTIFICATION_CAPACITY`] notifications are pending, new ones are dropped.
pub struct LinkSession<T: Transport> {
    transport: T,
    state: LinkState,
    /// The request whose outcomes are currently applied
    request: Option<RequestId>,
    /// Whether to fall back to `Listening` after a failure
    listen_on_fallback: bool,
    stopped: bool,
    peer_name: Option<String>,
    local_address: Option<String>,
    sender: Sender<LinkNotification>,
    receiver: Receiver<LinkNotification>,
    dropped_notifications: u64,
}

impl<T: Transport> LinkSession<T> {
    /// Create an idle session over `transport`.
    pub fn new(transport: T) -> Self {
        let (sender, receiver) = bounded(NOTIFICATION_CAPACITY);
        Self {
            transport,
            state: LinkState::None,
            request: None,
            listen_on_fallback: false,
            stopped: false,
            peer_name: None,
            local_address: None,
            sender,
            receiver,
            dropped_notifications: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Display name of the connected peer.
    pub fn peer_name(&self) -> Option<&str> {
        self.peer_name.as_deref()
    }

    /// Address the listener is bound to, once the transport confirms it.
    pub fn local_address(&self) -> Option<&str> {
        self.local_address.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Receiver for state changes, inbound data and messages.
    pub fn notifications(&self) -> &Receiver<LinkNotification> {
        &self.receiver
    }

    /// Notifications dropped because the channel was full.
    pub fn dropped_notifications(&self) -> u64 {
        self.dropped_notifications
    }

    /// The request whose transport outcomes are currently accepted.
    pub fn current_request(&self) -> Option<RequestId> {
        self.request
    }

    /// Start listening for a peer (`None → Listening`).
    ///
    /// Calling `start` while already listening is a no-op.
    pub fn start(&mut self) -> Result<(), LinkError> {
        if self.stopped {
            return Err(LinkError::Stopped);
        }

        match self.state {
            LinkState::None => {
                let request = self.transport.listen().map_err(|e| {
                    warn!("Listen request rejected: {}", e);
                    self.toast("Unable to listen for connections");
                    LinkError::from(e)
                })?;
                self.request = Some(request);
                self.listen_on_fallback = true;
                self.set_state(LinkState::Listening);
                Ok(())
            }
            LinkState::Listening => Ok(()),
            from => Err(LinkError::InvalidTransition {
                from,
                request: LinkRequest::Start,
            }),
        }
    }

    /// Connect to a named peer (`None | Listening → Connecting`).
    pub fn connect(&mut self, peer: &str) -> Result<(), LinkError> {
        if self.stopped {
            return Err(LinkError::Stopped);
        }

        match self.state {
            LinkState::None | LinkState::Listening => {}
            from => {
                return Err(LinkError::InvalidTransition {
                    from,
                    request: LinkRequest::Connect,
                })
            }
        }

        self.set_state(LinkState::Connecting);
        info!("Connecting to {}", peer);

        match self.transport.connect(peer) {
            Ok(request) => {
                self.request = Some(request);
                Ok(())
            }
            Err(e) => {
                warn!("Connect request rejected: {}", e);
                self.toast("Unable to connect device");
                self.fall_back();
                Err(e.into())
            }
        }
    }

    /// Send bytes to the peer.
    ///
    /// Fails immediately with [`LinkError::NotConnected`] unless connected.
    /// Nothing is queued for later delivery.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if self.state != LinkState::Connected {
            return Err(LinkError::NotConnected);
        }

        if let Err(e) = self.transport.write(bytes) {
            warn!("Write failed, dropping link: {}", e);
            self.toast("Device connection was lost");
            self.fall_back();
            return Err(e.into());
        }

        Ok(())
    }

    /// Stop the session (`any → None`). The session cannot be reused.
    pub fn stop(&mut self) {
        self.transport.shutdown();
        self.stopped = true;
        self.request = None;
        self.listen_on_fallback = false;
        self.peer_name = None;
        self.local_address = None;
        self.set_state(LinkState::None);
    }

    /// Apply an asynchronous transport outcome.
    pub fn handle_transport(&mut self, event: LinkEvent) {
        if self.request != Some(event.request) {
            debug!(
                "Ignoring event from superseded request {}: {:?}",
                event.request, event.event
            );
            return;
        }

        match (self.state, event.event) {
            (LinkState::Listening, TransportEvent::Listening { address }) => {
                info!("Listening on {}", address);
                self.local_address = Some(address);
            }
            (LinkState::Listening, TransportEvent::ListenFailed { reason }) => {
                warn!("Listener failed: {}", reason);
                self.listen_on_fallback = false;
                self.local_address = None;
                self.request = None;
                self.toast("Unable to listen for connections");
                self.set_state(LinkState::None);
            }
            (
                LinkState::Listening | LinkState::Connecting,
                TransportEvent::Connected { peer_name },
            ) => {
                self.peer_name = Some(peer_name.clone());
                self.set_state(LinkState::Connected);
                self.publish(LinkNotification::PeerConnected {
                    name: peer_name.clone(),
                });
                self.toast(&format!("Connected to {peer_name}"));
            }
            (LinkState::Connecting, TransportEvent::ConnectFailed { reason }) => {
                warn!("Connect failed: {}", reason);
                self.toast("Unable to connect device");
                self.fall_back();
            }
            (LinkState::Connected, TransportEvent::LinkLost { reason })
            | (LinkState::Connected, TransportEvent::WriteFailed { reason }) => {
                warn!("Link lost: {}", reason);
                self.toast("Device connection was lost");
                self.fall_back();
            }
            (LinkState::Connected, TransportEvent::Received(bytes)) => {
                let len = bytes.len();
                self.publish(LinkNotification::Received { bytes, len });
            }
            (LinkState::Connected, TransportEvent::Written(len)) => {
                self.publish(LinkNotification::Written { len });
            }
            (state, event) => {
                debug!("Ignoring stale transport event in state {}: {:?}", state, event);
            }
        }
    }

    /// Return to `Listening` or `None` after a failure.
    fn fall_back(&mut self) {
        self.peer_name = None;
        self.local_address = None;
        self.request = None;

        if self.listen_on_fallback && !self.stopped {
            match self.transport.listen() {
                Ok(request) => {
                    self.request = Some(request);
                    self.set_state(LinkState::Listening);
                    return;
                }
                Err(e) => {
                    warn!("Could not resume listening: {}", e);
                    self.listen_on_fallback = false;
                }
            }
        }

        self.set_state(LinkState::None);
    }

    fn set_state(&mut self, to: LinkState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        info!("Link state {} -> {}", from, to);
        self.publish(LinkNotification::StateChanged { from, to });
    }

    fn toast(&mut self, message: &str) {
        self.publish(LinkNotification::Toast(message.to_string()));
    }

    fn publish(&mut self, notification: LinkNotification) {
        // The session holds a receiver itself, so the channel never disconnects.
        if let Err(TrySendError::Full(dropped)) = self.sender.try_send(notification) {
            self.dropped_notifications += 1;
            debug!("Notification channel full, dropping {:?}", dropped);
        }
    }
}
