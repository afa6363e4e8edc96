use anyhow::Context;
use tracing::info;

use rawsock_common::consts::{self, AddressFamily, Protocol};
use rawsock_core::{OptionValue, RawSocket, Reactor};

/// Reads a handful of well-known options from a fresh ICMP socket,
/// then bumps `IP_TTL` to show the set path.
pub fn show() -> anyhow::Result<()> {
    let mut reactor = Reactor::new().context("creating reactor")?;
    let mut socket = RawSocket::new(Protocol::Icmp.into(), AddressFamily::Ipv4);
    socket
        .open(&mut reactor)
        .context("opening raw socket (try again with elevated privileges)")?;

    let mut buf = [0u8; 4];
    for (name, level, option) in [
        ("SO_RCVBUF", consts::SOL_SOCKET, consts::SO_RCVBUF),
        ("SO_SNDBUF", consts::SOL_SOCKET, consts::SO_SNDBUF),
        ("SO_BROADCAST", consts::SOL_SOCKET, consts::SO_BROADCAST),
        ("IP_TTL", consts::IPPROTO_IP, consts::IP_TTL),
        ("IP_TOS", consts::IPPROTO_IP, consts::IP_TOS),
    ] {
        let written = socket
            .get_option(&mut reactor, level, option, &mut buf)
            .with_context(|| format!("reading {name}"))?;
        info!("{name} = {} ({written} bytes)", i32::from_ne_bytes(buf));
    }

    socket
        .set_option(
            &mut reactor,
            consts::IPPROTO_IP,
            consts::IP_TTL,
            OptionValue::Int(128),
        )
        .context("setting IP_TTL")?;
    socket
        .get_option(&mut reactor, consts::IPPROTO_IP, consts::IP_TTL, &mut buf)
        .context("re-reading IP_TTL")?;
    info!("IP_TTL after set = {}", i32::from_ne_bytes(buf));

    socket.close(&reactor);
    Ok(())
}
