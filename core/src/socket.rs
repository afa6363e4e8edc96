//! # Raw Socket
//!
//! Owns one native raw-IP descriptor for its whole open lifetime:
//! creation and non-blocking configuration, registration with the
//! [`Reactor`](crate::reactor::Reactor), non-blocking transfer, typed
//! option access, and idempotent teardown.
//!
//! The descriptor is created lazily on the first `open`, `recv` or
//! `send`, and a closed socket is transparently re-opened by a later
//! call. Explicit close and drop converge on the same close routine.

pub mod options;

use std::collections::VecDeque;
use std::ffi::c_int;
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use std::os::fd::AsRawFd;

use mio::Token;
use socket2::{Domain, Protocol as SockProtocol, SockAddr, Socket, Type};
use tracing::{debug, trace, warn};

use rawsock_common::consts::{self, AddressFamily};
use rawsock_common::error::{Result, SocketError};

use crate::checksum;
use crate::reactor::{InterestSet, Reactor};
use options::{OptionCodec, OptionValue};

const IPPROTO_ICMP: u32 = 1;
const IPPROTO_ICMPV6: u32 = 58;

/// Lifecycle state of the native descriptor. The descriptor exists iff
/// the state is `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Open,
    Closed,
}

/// Asynchronous notifications surfaced to the consumer. Readiness is a
/// signal to attempt a transfer now; it carries no data itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    RecvReady,
    SendReady,
    Error(String),
    Close,
}

/// Binds the descriptor to the reactor. Exists only while the socket
/// is open; destroyed exactly once, synchronously with close.
#[derive(Debug, Clone, Copy)]
struct PollRegistration {
    token: Token,
    interest: InterestSet,
}

pub struct RawSocket {
    protocol: u32,
    family: AddressFamily,
    state: Lifecycle,
    socket: Option<Socket>,
    registration: Option<PollRegistration>,
    /// Set while the close routine runs; suppresses notification
    /// delivery and poll re-arming against a half-torn-down socket.
    closing: bool,
    /// `Some(offset)` when outgoing packets get their checksum patched
    /// at that offset before transmission.
    checksum_offset: Option<usize>,
    no_ip_header: bool,
    notifications: VecDeque<Notification>,
}

impl RawSocket {
    /// Creates the socket object without touching the OS. The native
    /// descriptor is created on the first `open`, `recv` or `send`.
    pub fn new(protocol: u32, family: AddressFamily) -> Self {
        Self {
            protocol,
            family,
            state: Lifecycle::Uninitialized,
            socket: None,
            registration: None,
            closing: false,
            checksum_offset: None,
            no_ip_header: false,
            notifications: VecDeque::new(),
        }
    }

    pub fn protocol(&self) -> u32 {
        self.protocol
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// The readiness conditions currently watched for this socket.
    pub fn interest(&self) -> InterestSet {
        self.registration
            .map(|registration| registration.interest)
            .unwrap_or_default()
    }

    /// Pops the oldest pending notification, if any.
    pub fn next_notification(&mut self) -> Option<Notification> {
        self.notifications.pop_front()
    }

    /// Opens the native descriptor and starts watching read readiness.
    /// A no-op if the socket is already open.
    pub fn open(&mut self, reactor: &mut Reactor) -> Result<()> {
        self.ensure_open(reactor)
    }

    fn ensure_open(&mut self, reactor: &mut Reactor) -> Result<()> {
        if self.state == Lifecycle::Open {
            return Ok(());
        }

        let domain = match self.family {
            AddressFamily::Ipv4 => Domain::IPV4,
            AddressFamily::Ipv6 => Domain::IPV6,
        };
        let protocol = SockProtocol::from(self.protocol as c_int);

        let socket = match Socket::new(domain, Type::RAW, Some(protocol)) {
            Ok(socket) => socket,
            Err(err)
                if err.kind() == io::ErrorKind::PermissionDenied
                    && matches!(self.protocol, IPPROTO_ICMP | IPPROTO_ICMPV6) =>
            {
                // ICMP is conventionally usable unprivileged through a
                // datagram socket carrying the same protocol number.
                debug!(
                    protocol = self.protocol,
                    "raw socket denied, retrying as datagram"
                );
                Socket::new(domain, Type::DGRAM, Some(protocol)).map_err(SocketError::create)?
            }
            Err(err) => return Err(SocketError::create(err)),
        };

        // From here on an early return drops `socket`, releasing the
        // descriptor: no leak on any failure path.
        socket.set_nonblocking(true).map_err(SocketError::create)?;

        if self.no_ip_header {
            apply_ip_header_mode(&socket, self.family, true)?;
        }

        let token = reactor.allocate_token();
        reactor
            .register(socket.as_raw_fd(), token, mio::Interest::READABLE)
            .map_err(SocketError::create)?;

        debug!(
            protocol = self.protocol,
            family = %self.family,
            fd = socket.as_raw_fd(),
            "raw socket open"
        );

        self.registration = Some(PollRegistration {
            token,
            interest: InterestSet::Read,
        });
        self.socket = Some(socket);
        self.state = Lifecycle::Open;
        self.closing = false;
        Ok(())
    }

    /// Closes the socket. Idempotent: the descriptor is released and
    /// the poll registration destroyed exactly once, and exactly one
    /// [`Notification::Close`] is queued per close chain. A later
    /// `recv`/`send`/`open` may re-open the socket.
    pub fn close(&mut self, reactor: &Reactor) {
        self.close_socket(Some(reactor));
    }

    fn close_socket(&mut self, reactor: Option<&Reactor>) {
        if self.closing || self.state == Lifecycle::Closed {
            return;
        }
        self.closing = true;

        if let Some(socket) = self.socket.take() {
            if let Some(registration) = self.registration.take() {
                // Dropping the descriptor clears the OS registration as
                // well; the explicit deregister keeps the teardown
                // synchronous with this call.
                if registration.interest != InterestSet::None {
                    if let Some(reactor) = reactor {
                        if let Err(err) = reactor.deregister(socket.as_raw_fd()) {
                            warn!(%err, "failed to deregister descriptor on close");
                        }
                    }
                }
            }
            debug!(fd = socket.as_raw_fd(), "raw socket closed");
            drop(socket);
        }
        self.registration = None;

        // Readiness queued for the released descriptor is stale; it
        // must not be observed after close.
        self.notifications.retain(|notification| {
            !matches!(
                notification,
                Notification::RecvReady | Notification::SendReady
            )
        });

        self.state = Lifecycle::Closed;
        self.closing = false;
        self.notifications.push_back(Notification::Close);
    }

    /// Recomputes the watched interest from the pause flags and
    /// re-arms the poll registration, stop-then-start. Pausing both
    /// directions stops watching entirely; the socket stays silent
    /// until a later `pause` call re-arms it.
    pub fn pause(&mut self, reactor: &mut Reactor, pause_recv: bool, pause_send: bool) -> Result<()> {
        if self.closing {
            return Ok(());
        }
        self.ensure_open(reactor)?;

        let interest = InterestSet::from_pause(pause_recv, pause_send);
        let (fd, token, current) = match (self.socket.as_ref(), self.registration.as_ref()) {
            (Some(socket), Some(registration)) => (
                socket.as_raw_fd(),
                registration.token,
                registration.interest,
            ),
            _ => return Ok(()),
        };

        let mut failure: Option<io::Error> = None;
        if current != InterestSet::None {
            if let Err(err) = reactor.deregister(fd) {
                failure = Some(err);
            }
        }
        if failure.is_none() {
            if let Some(mio_interest) = interest.to_mio() {
                if let Err(err) = reactor.register(fd, token, mio_interest) {
                    failure = Some(err);
                }
            }
        }

        match failure {
            None => {
                trace!(?interest, "poll interest re-armed");
                if let Some(registration) = self.registration.as_mut() {
                    registration.interest = interest;
                }
                Ok(())
            }
            Some(err) => {
                // Re-arm failures have no syscall caller to hand the
                // error to; surface them asynchronously.
                warn!(%err, "failed to re-arm poll interest");
                self.notifications
                    .push_back(Notification::Error(err.to_string()));
                Ok(())
            }
        }
    }

    /// Classifies one reactor wakeup for this socket and queues the
    /// resulting notification. Events for other tokens, or arriving
    /// once the socket is closing or closed, are discarded.
    pub fn dispatch(&mut self, event: &mio::event::Event) {
        self.dispatch_parts(
            event.token(),
            event.is_readable(),
            event.is_writable(),
            event.is_error(),
        );
    }

    fn dispatch_parts(&mut self, token: Token, readable: bool, writable: bool, errored: bool) {
        if self.closing || self.state != Lifecycle::Open {
            return;
        }
        let Some(registration) = self.registration else {
            return;
        };
        if registration.token != token {
            return;
        }

        // Readable is classified before writable within one wakeup;
        // level-triggered readiness re-signals whatever is not drained.
        if readable && registration.interest.reads() {
            self.notifications.push_back(Notification::RecvReady);
        } else if writable && registration.interest.writes() {
            self.notifications.push_back(Notification::SendReady);
        } else if errored {
            let message = self.error_message();
            self.notifications.push_back(Notification::Error(message));
        }
    }

    fn error_message(&self) -> String {
        self.socket
            .as_ref()
            .and_then(|socket| socket.take_error().ok().flatten())
            .map(|err| err.to_string())
            .unwrap_or_else(|| String::from("unknown socket error"))
    }

    /// Performs a single non-blocking receive into `buf`, returning the
    /// byte count and the source address in canonical text form.
    ///
    /// Opens the socket first if needed. A receive that cannot complete
    /// immediately surfaces as a would-block [`SocketError::Transfer`];
    /// the caller should wait for the next [`Notification::RecvReady`].
    pub fn recv(&mut self, reactor: &mut Reactor, buf: &mut [u8]) -> Result<(usize, String)> {
        self.ensure_open(reactor)?;
        let socket = self.descriptor()?;

        // recv_from only ever writes initialized bytes into the buffer.
        let uninit = unsafe { &mut *(std::ptr::from_mut::<[u8]>(buf) as *mut [MaybeUninit<u8>]) };
        let (bytes, source) = socket.recv_from(uninit).map_err(SocketError::transfer)?;

        let source_text = source
            .as_socket()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| String::from("unknown"));
        trace!(bytes, source = %source_text, "received datagram");
        Ok((bytes, source_text))
    }

    /// Transmits `buf[offset..offset + length]` to the textual
    /// destination address via a single non-blocking send, patching the
    /// checksum field first when generation is enabled.
    ///
    /// Argument validation happens before any native call. A partial
    /// send is returned uninterpreted; the caller resubmits the rest.
    pub fn send(
        &mut self,
        reactor: &mut Reactor,
        buf: &mut [u8],
        offset: usize,
        length: usize,
        destination: &str,
    ) -> Result<usize> {
        let end = offset.checked_add(length).ok_or_else(|| {
            SocketError::argument(format!("offset {offset} plus length {length} overflows"))
        })?;
        if end > buf.len() {
            return Err(SocketError::argument(format!(
                "buffer length {} is not large enough for offset {offset} plus length {length}",
                buf.len()
            )));
        }

        let destination_ip: IpAddr = destination
            .parse()
            .map_err(|_| SocketError::argument(format!("invalid IP address '{destination}'")))?;
        match (self.family, destination_ip) {
            (AddressFamily::Ipv4, IpAddr::V4(_)) | (AddressFamily::Ipv6, IpAddr::V6(_)) => {}
            _ => {
                return Err(SocketError::argument(format!(
                    "address '{destination}' does not match socket family {}",
                    self.family
                )));
            }
        }

        self.ensure_open(reactor)?;
        let checksum_offset = self.checksum_offset;
        let socket = self.descriptor()?;
        let target = SockAddr::from(SocketAddr::new(destination_ip, 0));

        let data = &mut buf[offset..end];
        let bytes = match checksum_offset {
            Some(field_offset) => {
                let patched = checksum::patch(data, field_offset)?;
                // The guard zeroes the field again whether the send
                // succeeds or fails, keeping the buffer reusable.
                socket
                    .send_to(patched.bytes(), &target)
                    .map_err(SocketError::transfer)?
            }
            None => socket.send_to(data, &target).map_err(SocketError::transfer)?,
        };

        trace!(bytes, destination = %destination_ip, "sent datagram");
        Ok(bytes)
    }

    /// Enables or disables checksum patching of outgoing packets. The
    /// offset is relative to the transmitted slice.
    pub fn generate_checksums(&mut self, generate: bool, offset: usize) {
        self.checksum_offset = generate.then_some(offset);
    }

    /// Controls whether outgoing packets are expected to carry their
    /// own IP header (`IP_HDRINCL`). Survives a close/re-open cycle.
    pub fn set_no_ip_header(&mut self, reactor: &mut Reactor, no_header: bool) -> Result<()> {
        self.ensure_open(reactor)?;
        let socket = self.descriptor()?;
        apply_ip_header_mode(socket, self.family, no_header)?;
        self.no_ip_header = no_header;
        Ok(())
    }

    /// Reads a socket option into `buf`, returning the number of bytes
    /// the kernel wrote.
    pub fn get_option(
        &mut self,
        reactor: &mut Reactor,
        level: c_int,
        option: c_int,
        buf: &mut [u8],
    ) -> Result<usize> {
        if buf.is_empty() {
            return Err(SocketError::argument("option buffer must not be empty"));
        }
        self.ensure_open(reactor)?;
        let socket = self.descriptor()?;
        OptionCodec::get(socket.as_raw_fd(), level, option, buf).map_err(SocketError::option)
    }

    /// Writes a socket option, either as the 4-byte integer encoding or
    /// as a structured byte payload.
    pub fn set_option(
        &mut self,
        reactor: &mut Reactor,
        level: c_int,
        option: c_int,
        value: OptionValue<'_>,
    ) -> Result<()> {
        if let OptionValue::Bytes(bytes) = value {
            if bytes.is_empty() {
                return Err(SocketError::argument("option payload must not be empty"));
            }
        }
        self.ensure_open(reactor)?;
        let socket = self.descriptor()?;
        match value {
            OptionValue::Int(int_value) => {
                OptionCodec::set_int(socket.as_raw_fd(), level, option, int_value)
            }
            OptionValue::Bytes(bytes) => OptionCodec::set(socket.as_raw_fd(), level, option, bytes),
        }
        .map_err(SocketError::option)
    }

    fn descriptor(&self) -> Result<&Socket> {
        // Open state implies a live descriptor; this keeps the
        // invariant checked instead of assumed.
        self.socket
            .as_ref()
            .ok_or_else(|| SocketError::transfer(io::Error::from(io::ErrorKind::NotConnected)))
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        // Same idempotent routine as the explicit close. Without a
        // reactor the descriptor drop clears the OS registration.
        self.close_socket(None);
        self.closing = true;
    }
}

fn apply_ip_header_mode(socket: &Socket, family: AddressFamily, no_header: bool) -> Result<()> {
    let (level, option) = match family {
        AddressFamily::Ipv4 => (consts::IPPROTO_IP, consts::IP_HDRINCL),
        #[cfg(windows)]
        AddressFamily::Ipv6 => (consts::IPPROTO_IPV6, consts::IPV6_HDRINCL),
        #[cfg(not(windows))]
        AddressFamily::Ipv6 => {
            return Err(SocketError::argument(
                "the no-IP-header mode is not supported for IPv6 on this platform",
            ));
        }
    };
    OptionCodec::set_int(socket.as_raw_fd(), level, option, c_int::from(no_header))
        .map_err(SocketError::option)
}
