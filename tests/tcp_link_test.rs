//! Loopback tests for the TCP link transport.

use motion_link::core::{FeatureRecord, Orientation};
use motion_link::events::{Notification, NotificationQueue, QueueError};
use motion_link::link::{
    LinkSession, LinkState, TcpTransport, TcpTransportConfig, TransportEvent,
};
use std::time::{Duration, Instant};

fn loopback_config() -> TcpTransportConfig {
    TcpTransportConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        read_buffer_size: 1024,
    }
}

/// Feed link events from `queue` into `session` until `done` holds.
fn pump_until(
    queue: &NotificationQueue,
    session: &mut LinkSession<TcpTransport>,
    mut done: impl FnMut(&LinkSession<TcpTransport>, &TransportEvent) -> bool,
) -> Option<TransportEvent> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        match queue.recv_timeout(Duration::from_millis(50)) {
            Ok(Notification::Link(event)) => {
                session.handle_transport(event.clone());
                if done(session, &event.event) {
                    return Some(event.event);
                }
            }
            Ok(Notification::Sample(_)) => {}
            Err(QueueError::Timeout) | Err(QueueError::Empty) => {}
            Err(QueueError::Cancelled) => return None,
        }
    }
    None
}

#[test]
fn records_travel_between_listener_and_connector() {
    let server_queue = NotificationQueue::new();
    let client_queue = NotificationQueue::new();

    let server_transport = TcpTransport::new(loopback_config(), server_queue.notifier()).unwrap();
    let client_transport = TcpTransport::new(loopback_config(), client_queue.notifier()).unwrap();

    let mut server = LinkSession::new(server_transport);
    let mut client = LinkSession::new(client_transport);

    server.start().unwrap();
    let listening = pump_until(&server_queue, &mut server, |_, e| {
        matches!(e, TransportEvent::Listening { .. })
    })
    .expect("listener bound");
    let address = match listening {
        TransportEvent::Listening { address } => address,
        other => panic!("unexpected event {other:?}"),
    };
    assert_eq!(server.local_address(), Some(address.as_str()));

    client.connect(&address).unwrap();
    assert_eq!(client.state(), LinkState::Connecting);
    pump_until(&client_queue, &mut client, |s, _| s.is_connected()).expect("client connected");
    pump_until(&server_queue, &mut server, |s, _| s.is_connected()).expect("server accepted");

    assert_eq!(client.peer_name(), Some(address.as_str()));
    assert!(server.peer_name().is_some());

    let record = FeatureRecord {
        orientation: Orientation::Top,
        freq_x: 6.25,
        mag_x: 12.8,
        ratio_xy: 0.5,
        ..FeatureRecord::default()
    };
    client.send(&record.to_wire()).unwrap();

    let mut received = Vec::new();
    pump_until(&server_queue, &mut server, |_, e| {
        if let TransportEvent::Received(bytes) = e {
            received.extend_from_slice(bytes);
        }
        received.len() >= record.to_wire().len()
    })
    .expect("record received");

    let line = String::from_utf8(received).unwrap();
    let decoded: FeatureRecord = line.parse().unwrap();
    assert_eq!(decoded, record);

    // Closing the client drops the server back to listening
    client.stop();
    assert_eq!(client.state(), LinkState::None);
    pump_until(&server_queue, &mut server, |s, _| s.state() == LinkState::Listening)
        .expect("server fell back to listening");
}

#[test]
fn connect_to_closed_port_falls_back() {
    let queue = NotificationQueue::new();
    let transport = TcpTransport::new(loopback_config(), queue.notifier()).unwrap();
    let mut session = LinkSession::new(transport);

    // Bind then drop a listener to find a port nobody is serving
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .unwrap()
        .port();

    session.connect(&format!("127.0.0.1:{port}")).unwrap();
    pump_until(&queue, &mut session, |_, e| {
        matches!(e, TransportEvent::ConnectFailed { .. })
    })
    .expect("connect failure reported");

    assert_eq!(session.state(), LinkState::None);
    assert!(session.send(b"0,0,0,0,0,0,0,0,0,0").is_err());
}

#[test]
fn invalid_peer_address_is_rejected() {
    let queue = NotificationQueue::new();
    let transport = TcpTransport::new(loopback_config(), queue.notifier()).unwrap();
    let mut session = LinkSession::new(transport);

    assert!(session.connect("not an address").is_err());
    assert_eq!(session.state(), LinkState::None);
}
