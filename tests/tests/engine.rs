//! End-to-end exercises of the raw-socket engine over loopback.
//!
//! Everything that needs a live descriptor skips gracefully when the
//! OS denies raw sockets to an unprivileged process.

use std::time::Duration;

use rawsock_common::byteorder::{htonl, htons, ntohl, ntohs};
use rawsock_common::consts;
use rawsock_common::error::SocketError;
use rawsock_core::checksum;
use rawsock_core::{InterestSet, Lifecycle, Notification, OptionValue, RawSocket, Reactor};

use rawsock_integration_tests::open_icmp_or_skip;

const ECHO_REQUEST: [u8; 12] = [8, 0, 0, 0, 0x42, 0x42, 0, 1, 0xde, 0xad, 0xbe, 0xef];
const POLL_TIMEOUT: Duration = Duration::from_secs(2);

fn drain(socket: &mut RawSocket) -> Vec<Notification> {
    std::iter::from_fn(|| socket.next_notification()).collect()
}

/// Polls once and routes every event to the socket.
fn pump(reactor: &mut Reactor, socket: &mut RawSocket, timeout: Duration) {
    reactor.poll(Some(timeout)).expect("poll failed");
    for event in reactor.events() {
        socket.dispatch(event);
    }
}

#[test]
fn echo_round_trip_over_loopback() {
    let mut reactor = Reactor::new().unwrap();
    let Some(mut socket) = open_icmp_or_skip(&mut reactor) else {
        return;
    };
    socket.generate_checksums(true, 2);

    let mut request = ECHO_REQUEST;
    let sent = socket
        .send(&mut reactor, &mut request, 0, ECHO_REQUEST.len(), "127.0.0.1")
        .expect("send failed");
    assert_eq!(sent, ECHO_REQUEST.len());
    // the patched field was zeroed again after transmission
    assert_eq!(request, ECHO_REQUEST);

    // loopback answers quickly; a raw ICMP socket sees the reply
    let mut buf = [0u8; 4096];
    let mut answered = false;
    for _ in 0..10 {
        pump(&mut reactor, &mut socket, POLL_TIMEOUT);
        while let Some(notification) = socket.next_notification() {
            if notification != Notification::RecvReady {
                continue;
            }
            match socket.recv(&mut reactor, &mut buf) {
                Ok((bytes, source)) => {
                    assert!(bytes > 0);
                    assert_eq!(source, "127.0.0.1");
                    answered = true;
                }
                Err(err) if err.is_would_block() => {}
                Err(err) => panic!("receive failed: {err}"),
            }
        }
        if answered {
            break;
        }
    }
    assert!(answered, "no ICMP traffic observed on loopback");

    socket.close(&reactor);
}

#[test]
fn fully_paused_socket_produces_no_notifications() {
    let mut reactor = Reactor::new().unwrap();
    let Some(mut socket) = open_icmp_or_skip(&mut reactor) else {
        return;
    };
    socket.generate_checksums(true, 2);

    socket.pause(&mut reactor, true, true).unwrap();
    assert_eq!(socket.interest(), InterestSet::None);

    // generate loopback ICMP traffic that would normally wake us
    let mut request = ECHO_REQUEST;
    socket
        .send(&mut reactor, &mut request, 0, ECHO_REQUEST.len(), "127.0.0.1")
        .unwrap();

    pump(&mut reactor, &mut socket, Duration::from_millis(300));
    assert!(drain(&mut socket).is_empty());

    // resuming the read direction brings readiness back
    socket.pause(&mut reactor, false, true).unwrap();
    assert_eq!(socket.interest(), InterestSet::Read);
    pump(&mut reactor, &mut socket, POLL_TIMEOUT);
    assert!(
        drain(&mut socket).contains(&Notification::RecvReady),
        "expected read readiness after resume"
    );

    socket.close(&reactor);
}

#[test]
fn close_is_a_cancellation_boundary() {
    let mut reactor = Reactor::new().unwrap();
    let Some(mut socket) = open_icmp_or_skip(&mut reactor) else {
        return;
    };
    socket.generate_checksums(true, 2);

    // readiness is pending at the OS level when close runs
    let mut request = ECHO_REQUEST;
    socket
        .send(&mut reactor, &mut request, 0, ECHO_REQUEST.len(), "127.0.0.1")
        .unwrap();
    socket.close(&reactor);
    socket.close(&reactor);

    pump(&mut reactor, &mut socket, Duration::from_millis(300));

    let notifications = drain(&mut socket);
    assert_eq!(notifications, vec![Notification::Close]);
    assert_eq!(socket.state(), Lifecycle::Closed);
}

#[test]
fn broadcast_option_reads_back_nonzero() {
    let mut reactor = Reactor::new().unwrap();
    let Some(mut socket) = open_icmp_or_skip(&mut reactor) else {
        return;
    };

    socket
        .set_option(
            &mut reactor,
            consts::SOL_SOCKET,
            consts::SO_BROADCAST,
            OptionValue::Int(1),
        )
        .unwrap();

    let mut buf = [0u8; 4];
    let written = socket
        .get_option(&mut reactor, consts::SOL_SOCKET, consts::SO_BROADCAST, &mut buf)
        .unwrap();
    assert_eq!(written, 4);
    assert_ne!(i32::from_ne_bytes(buf), 0);

    socket.close(&reactor);
}

#[test]
fn send_validation_needs_no_privileges() {
    let mut reactor = Reactor::new().unwrap();
    let mut socket = RawSocket::new(
        rawsock_common::consts::Protocol::Icmp.into(),
        rawsock_common::consts::AddressFamily::Ipv4,
    );
    let mut buf = [0u8; 8];

    let err = socket
        .send(&mut reactor, &mut buf, 4, 8, "127.0.0.1")
        .unwrap_err();
    assert!(matches!(err, SocketError::Argument(_)));

    let err = socket
        .send(&mut reactor, &mut buf, 0, 8, "localhost")
        .unwrap_err();
    assert!(matches!(err, SocketError::Argument(_)));

    assert_eq!(socket.state(), Lifecycle::Uninitialized);
}

#[test]
fn checksum_engine_agrees_with_published_vector() {
    let mut header: [u8; 20] = [
        0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
        0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
    ];
    assert_eq!(checksum::compute(0, &header), 0xb861);

    let patched = checksum::patch(&mut header, 10).unwrap();
    assert_eq!(checksum::compute(0, patched.bytes()), 0);
}

#[test]
fn byte_order_helpers_swap_on_little_endian() {
    assert_eq!(ntohs(htons(0xbeef)), 0xbeef);
    assert_eq!(ntohl(htonl(0x1234_5678)), 0x1234_5678);
    if cfg!(target_endian = "little") {
        assert_eq!(htons(0x0102), 0x0201);
    }
}
