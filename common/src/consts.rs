//! # Socket Constant Tables
//!
//! Process-wide immutable tables of the socket levels and options the
//! engine exposes at its boundary, plus the address-family and protocol
//! enumerations used when opening a socket.
//!
//! The numeric values are the host's own: on Unix they are re-exported
//! from `libc`, on Windows they reproduce the winsock headers. Nothing
//! here is chosen by this crate.

use std::ffi::c_int;

// ── Socket levels ───────────────────────────────────────────────────

#[cfg(unix)]
pub const SOL_SOCKET: c_int = libc::SOL_SOCKET;
#[cfg(unix)]
pub const IPPROTO_IP: c_int = libc::IPPROTO_IP;
#[cfg(unix)]
pub const IPPROTO_IPV6: c_int = libc::IPPROTO_IPV6;

#[cfg(windows)]
pub const SOL_SOCKET: c_int = 0xffff;
#[cfg(windows)]
pub const IPPROTO_IP: c_int = 0;
#[cfg(windows)]
pub const IPPROTO_IPV6: c_int = 41;

// ── Socket options ──────────────────────────────────────────────────

#[cfg(unix)]
pub const SO_BROADCAST: c_int = libc::SO_BROADCAST;
#[cfg(unix)]
pub const SO_RCVBUF: c_int = libc::SO_RCVBUF;
#[cfg(unix)]
pub const SO_RCVTIMEO: c_int = libc::SO_RCVTIMEO;
#[cfg(unix)]
pub const SO_SNDBUF: c_int = libc::SO_SNDBUF;
#[cfg(unix)]
pub const SO_SNDTIMEO: c_int = libc::SO_SNDTIMEO;
#[cfg(target_os = "linux")]
pub const SO_BINDTODEVICE: c_int = libc::SO_BINDTODEVICE;
#[cfg(unix)]
pub const IP_HDRINCL: c_int = libc::IP_HDRINCL;
#[cfg(unix)]
pub const IP_OPTIONS: c_int = libc::IP_OPTIONS;
#[cfg(unix)]
pub const IP_TOS: c_int = libc::IP_TOS;
#[cfg(unix)]
pub const IP_TTL: c_int = libc::IP_TTL;
#[cfg(unix)]
pub const IPV6_UNICAST_HOPS: c_int = libc::IPV6_UNICAST_HOPS;
#[cfg(unix)]
pub const IPV6_V6ONLY: c_int = libc::IPV6_V6ONLY;

#[cfg(windows)]
pub const SO_BROADCAST: c_int = 0x0020;
#[cfg(windows)]
pub const SO_RCVBUF: c_int = 0x1002;
#[cfg(windows)]
pub const SO_RCVTIMEO: c_int = 0x1006;
#[cfg(windows)]
pub const SO_SNDBUF: c_int = 0x1001;
#[cfg(windows)]
pub const SO_SNDTIMEO: c_int = 0x1005;
#[cfg(windows)]
pub const IP_HDRINCL: c_int = 2;
#[cfg(windows)]
pub const IP_OPTIONS: c_int = 1;
#[cfg(windows)]
pub const IP_TOS: c_int = 3;
#[cfg(windows)]
pub const IP_TTL: c_int = 4;
#[cfg(windows)]
pub const IPV6_UNICAST_HOPS: c_int = 4;
#[cfg(windows)]
pub const IPV6_V6ONLY: c_int = 27;
#[cfg(windows)]
pub const IPV6_HDRINCL: c_int = 2;

// ── Address families and well-known protocols ───────────────────────

/// IP address family of a raw socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4 = 1,
    Ipv6 = 2,
}

impl AddressFamily {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Ipv4),
            2 => Some(Self::Ipv6),
            _ => None,
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "IPv4"),
            Self::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Well-known IP protocol numbers. Any other protocol number can be
/// passed to the engine directly as a `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    None = 0,
    Icmp = 1,
    Tcp = 6,
    Udp = 17,
    Icmpv6 = 58,
}

impl From<Protocol> for u32 {
    fn from(protocol: Protocol) -> Self {
        protocol as u32
    }
}
