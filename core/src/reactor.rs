//! # Readiness Reactor
//!
//! A single-threaded wrapper around one `mio::Poll`. Sockets register
//! their descriptor here and the owning thread drives the loop:
//! [`Reactor::poll`] fills the event buffer, the consumer feeds each
//! event to the socket it belongs to, and the socket classifies it
//! into a notification.
//!
//! Readiness is level-triggered: an undrained condition is signalled
//! again on the next wakeup.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use tracing::trace;

/// Which readiness conditions a socket is currently watching for,
/// derived from its pause flags. `None` means the descriptor is not
/// registered with the poll at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterestSet {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

impl InterestSet {
    /// Derives the interest from a pair of pause flags, computed once
    /// per `pause` call.
    pub fn from_pause(pause_recv: bool, pause_send: bool) -> Self {
        match (pause_recv, pause_send) {
            (true, true) => Self::None,
            (false, true) => Self::Read,
            (true, false) => Self::Write,
            (false, false) => Self::ReadWrite,
        }
    }

    pub fn reads(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub fn writes(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }

    pub(crate) fn to_mio(self) -> Option<Interest> {
        match self {
            Self::None => None,
            Self::Read => Some(Interest::READABLE),
            Self::Write => Some(Interest::WRITABLE),
            Self::ReadWrite => Some(Interest::READABLE | Interest::WRITABLE),
        }
    }
}

/// A descriptor currently registered with the poll. Kept so a
/// signalled source can be re-armed after each wakeup.
struct Source {
    fd: RawFd,
    interest: Interest,
}

/// Owns the OS readiness primitive and the event buffer for one
/// event-loop thread.
pub struct Reactor {
    poll: Poll,
    events: Events,
    next_token: usize,
    sources: RefCell<HashMap<Token, Source>>,
}

impl Reactor {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(64),
            next_token: 0,
            sources: RefCell::new(HashMap::new()),
        })
    }

    /// Waits for readiness on the registered descriptors, filling the
    /// event buffer. Interrupted waits are retried; a `timeout` of
    /// `None` blocks until the next event.
    pub fn poll(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.events.clear();
        loop {
            match self.poll.poll(&mut self.events, timeout) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Ok(()) => break,
                Err(err) => return Err(err),
            }
        }

        // mio arms epoll sources edge-triggered. Re-registering every
        // signalled source restores the level-triggered contract: an
        // undrained condition is reported again on the next wakeup.
        let sources = self.sources.borrow();
        for event in self.events.iter() {
            if let Some(source) = sources.get(&event.token()) {
                self.poll.registry().deregister(&mut SourceFd(&source.fd))?;
                self.poll
                    .registry()
                    .register(&mut SourceFd(&source.fd), event.token(), source.interest)?;
            }
        }
        Ok(())
    }

    /// The events collected by the last [`poll`](Self::poll) call, in
    /// the order the OS reported them.
    pub fn events(&self) -> impl Iterator<Item = &mio::event::Event> {
        self.events.iter()
    }

    pub(crate) fn allocate_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    pub(crate) fn register(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        trace!(fd, ?token, ?interest, "registering descriptor");
        self.poll.registry().register(&mut SourceFd(&fd), token, interest)?;
        self.sources.borrow_mut().insert(token, Source { fd, interest });
        Ok(())
    }

    pub(crate) fn deregister(&self, fd: RawFd) -> io::Result<()> {
        trace!(fd, "deregistering descriptor");
        self.sources.borrow_mut().retain(|_, source| source.fd != fd);
        self.poll.registry().deregister(&mut SourceFd(&fd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use std::os::fd::AsRawFd;

    #[test]
    fn interest_is_derived_from_pause_flags() {
        assert_eq!(InterestSet::from_pause(true, true), InterestSet::None);
        assert_eq!(InterestSet::from_pause(false, true), InterestSet::Read);
        assert_eq!(InterestSet::from_pause(true, false), InterestSet::Write);
        assert_eq!(InterestSet::from_pause(false, false), InterestSet::ReadWrite);
    }

    #[test]
    fn interest_accessors() {
        assert!(InterestSet::Read.reads());
        assert!(!InterestSet::Read.writes());
        assert!(InterestSet::ReadWrite.reads());
        assert!(InterestSet::ReadWrite.writes());
        assert!(!InterestSet::None.reads());
        assert!(!InterestSet::None.writes());
    }

    #[test]
    fn tokens_are_unique() {
        let mut reactor = Reactor::new().unwrap();
        let a = reactor.allocate_token();
        let b = reactor.allocate_token();
        assert_ne!(a, b);
    }

    #[test]
    fn read_readiness_is_reported_for_a_pending_datagram() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_nonblocking(true).unwrap();
        let addr = socket.local_addr().unwrap();

        let mut reactor = Reactor::new().unwrap();
        let token = reactor.allocate_token();
        reactor
            .register(socket.as_raw_fd(), token, Interest::READABLE)
            .unwrap();

        socket.send_to(b"wake", addr).unwrap();

        reactor.poll(Some(Duration::from_secs(2))).unwrap();
        let event = reactor.events().next().expect("expected one readiness event");
        assert_eq!(event.token(), token);
        assert!(event.is_readable());

        reactor.deregister(socket.as_raw_fd()).unwrap();
    }

    #[test]
    fn level_triggered_readiness_repeats_until_drained() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_nonblocking(true).unwrap();
        let addr = socket.local_addr().unwrap();

        let mut reactor = Reactor::new().unwrap();
        let token = reactor.allocate_token();
        reactor
            .register(socket.as_raw_fd(), token, Interest::READABLE)
            .unwrap();

        socket.send_to(b"wake", addr).unwrap();

        for _ in 0..2 {
            reactor.poll(Some(Duration::from_secs(2))).unwrap();
            assert!(reactor.events().any(|e| e.token() == token && e.is_readable()));
        }

        let mut buf = [0u8; 16];
        socket.recv_from(&mut buf).unwrap();
    }

    #[test]
    fn drained_socket_reports_no_further_readiness() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_nonblocking(true).unwrap();
        let addr = socket.local_addr().unwrap();

        let mut reactor = Reactor::new().unwrap();
        let token = reactor.allocate_token();
        reactor
            .register(socket.as_raw_fd(), token, Interest::READABLE)
            .unwrap();

        socket.send_to(b"wake", addr).unwrap();
        reactor.poll(Some(Duration::from_secs(2))).unwrap();
        assert!(reactor.events().any(|e| e.token() == token));

        let mut buf = [0u8; 16];
        socket.recv_from(&mut buf).unwrap();

        // nothing pending, so the re-armed source stays quiet
        reactor.poll(Some(Duration::from_millis(200))).unwrap();
        assert!(reactor.events().next().is_none());
    }
}
