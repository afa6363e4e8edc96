//! Shared helpers for the integration tests.

use rawsock_common::consts::{AddressFamily, Protocol};
use rawsock_core::{RawSocket, Reactor};

/// Opens an ICMP socket, or returns `None` (after printing a notice)
/// when the OS refuses raw sockets to this process, so the suite
/// passes unprivileged.
pub fn open_icmp_or_skip(reactor: &mut Reactor) -> Option<RawSocket> {
    let mut socket = RawSocket::new(Protocol::Icmp.into(), AddressFamily::Ipv4);
    match socket.open(reactor) {
        Ok(()) => Some(socket),
        Err(err) if err.is_permission_denied() => {
            eprintln!("skipping: raw sockets not permitted here: {err}");
            None
        }
        Err(err) => panic!("unexpected open failure: {err}"),
    }
}
