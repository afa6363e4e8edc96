use std::net::IpAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use tracing::{info, warn};

use rawsock_common::consts::{self, AddressFamily, Protocol};
use rawsock_core::{Notification, OptionValue, RawSocket, Reactor};

const ICMP_ECHO_REPLY: u8 = 0;
const ICMP_ECHO_REQUEST: u8 = 8;
const ICMPV6_ECHO_REQUEST: u8 = 128;
const ICMPV6_ECHO_REPLY: u8 = 129;
const ICMP_HDR_LEN: usize = 8;
const CHECKSUM_OFFSET: usize = 2;
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

pub fn ping(target: &str, count: u32, ttl: Option<i32>, size: usize) -> anyhow::Result<()> {
    let target_addr: IpAddr = target.parse().context("target must be an IP address")?;
    let (family, protocol, echo_type) = match target_addr {
        IpAddr::V4(_) => (AddressFamily::Ipv4, Protocol::Icmp, ICMP_ECHO_REQUEST),
        IpAddr::V6(_) => (AddressFamily::Ipv6, Protocol::Icmpv6, ICMPV6_ECHO_REQUEST),
    };

    let mut reactor = Reactor::new().context("creating reactor")?;
    let mut socket = RawSocket::new(protocol.into(), family);
    socket
        .open(&mut reactor)
        .context("opening raw socket (try again with elevated privileges)")?;

    // the kernel fills in ICMPv6 checksums itself
    if family == AddressFamily::Ipv4 {
        socket.generate_checksums(true, CHECKSUM_OFFSET);
    }

    if let Some(ttl) = ttl {
        let (level, option) = match family {
            AddressFamily::Ipv4 => (consts::IPPROTO_IP, consts::IP_TTL),
            AddressFamily::Ipv6 => (consts::IPPROTO_IPV6, consts::IPV6_UNICAST_HOPS),
        };
        socket
            .set_option(&mut reactor, level, option, OptionValue::Int(ttl))
            .context("setting time-to-live")?;
    }

    let identifier: u16 = rand::random();
    let mut request = vec![0u8; ICMP_HDR_LEN + size];
    request[0] = echo_type;
    request[4..6].copy_from_slice(&identifier.to_be_bytes());
    for (index, byte) in request[ICMP_HDR_LEN..].iter_mut().enumerate() {
        *byte = index as u8;
    }

    info!("pinging {target} with {size} payload bytes");

    let mut recv_buf = vec![0u8; 4096];
    let mut received = 0u32;

    for sequence in 0..count {
        request[6..8].copy_from_slice(&(sequence as u16).to_be_bytes());
        let length = request.len();
        let started = Instant::now();
        socket
            .send(&mut reactor, &mut request, 0, length, target)
            .context("sending echo request")?;

        let deadline = started + REPLY_TIMEOUT;
        let mut answered = false;
        while !answered && Instant::now() < deadline {
            let timeout = deadline.saturating_duration_since(Instant::now());
            reactor.poll(Some(timeout)).context("polling for readiness")?;

            for event in reactor.events() {
                socket.dispatch(event);
            }

            while let Some(notification) = socket.next_notification() {
                match notification {
                    Notification::RecvReady => {
                        match socket.recv(&mut reactor, &mut recv_buf) {
                            Ok((bytes, source)) => {
                                if let Some(seq) = match_reply(&recv_buf[..bytes], family) {
                                    info!(
                                        "{bytes} bytes from {source}: icmp_seq={seq} time={:.1?}",
                                        started.elapsed()
                                    );
                                    received += 1;
                                    answered = true;
                                }
                            }
                            Err(err) if err.is_would_block() => {}
                            Err(err) => return Err(err).context("receive failed"),
                        }
                    }
                    Notification::SendReady => {}
                    Notification::Error(message) => bail!("socket error: {message}"),
                    Notification::Close => bail!("socket closed unexpectedly"),
                }
            }
        }

        if !answered {
            warn!("icmp_seq={sequence}: timed out");
        }
    }

    info!("{received}/{count} replies received");
    socket.close(&reactor);
    Ok(())
}

/// Picks the sequence number out of an echo reply, skipping the IPv4
/// header that raw IPv4 sockets deliver in front of the ICMP message.
///
/// The identifier is not matched: Linux datagram ICMP sockets rewrite
/// it with their own port, so it carries no information here.
fn match_reply(packet: &[u8], family: AddressFamily) -> Option<u16> {
    let icmp = match family {
        AddressFamily::Ipv4 if packet.first().is_some_and(|byte| byte >> 4 == 4) => {
            let header_len = usize::from(packet[0] & 0x0f) * 4;
            packet.get(header_len..)?
        }
        _ => packet,
    };
    if icmp.len() < ICMP_HDR_LEN {
        return None;
    }

    let reply_type = match family {
        AddressFamily::Ipv4 => ICMP_ECHO_REPLY,
        AddressFamily::Ipv6 => ICMPV6_ECHO_REPLY,
    };
    if icmp[0] != reply_type {
        return None;
    }
    Some(u16::from_be_bytes([icmp[6], icmp[7]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_sequence_is_read_behind_the_ip_header() {
        let mut packet = vec![0u8; 28];
        packet[0] = 0x45; // IPv4, 20-byte header
        packet[20] = ICMP_ECHO_REPLY;
        packet[26..28].copy_from_slice(&7u16.to_be_bytes());
        assert_eq!(match_reply(&packet, AddressFamily::Ipv4), Some(7));
    }

    #[test]
    fn non_reply_types_are_ignored() {
        let mut packet = vec![0u8; 8];
        packet[0] = ICMPV6_ECHO_REQUEST;
        assert_eq!(match_reply(&packet, AddressFamily::Ipv6), None);
    }

    #[test]
    fn truncated_packets_are_ignored() {
        assert_eq!(match_reply(&[0u8; 4], AddressFamily::Ipv6), None);
    }
}
