//! # rawsock-core
//!
//! A raw-socket I/O engine: non-blocking send/receive of IPv4/IPv6
//! datagrams at the raw-IP layer, bridged to a single-threaded
//! readiness reactor, with RFC 1071 Internet-checksum support for
//! patching outgoing packets.
//!
//! The engine exposes primitives only. Protocol layers (ICMP echo, DNS
//! probes, ...) are built on top of it by the consumer.

pub mod checksum;
pub mod reactor;
pub mod socket;

pub use reactor::{InterestSet, Reactor};
pub use socket::options::OptionValue;
pub use socket::{Lifecycle, Notification, RawSocket};
