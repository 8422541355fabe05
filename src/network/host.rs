//! Host implementations of the hardware seams.
//!
//! Lets the firmware core run as a plain process: the "radio" is whatever
//! network the host already has, the broker transport is a non-blocking
//! `std::net::TcpStream`, time comes from `std::time::Instant`.

use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{debug, info};

use super::error::Error;
use super::{AuthMode, Close, Connect, Connection, NetworkStack, RadioEvent, Read, Write};
use crate::time::{Clock, Instant};

fn map_io(e: &io::Error) -> Error {
    match e.kind() {
        ErrorKind::ConnectionRefused => Error::ConnectionRefused,
        ErrorKind::TimedOut => Error::Timeout,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
            Error::ConnectionClosed
        }
        ErrorKind::NotConnected => Error::NotOpen,
        _ => Error::ProtocolError,
    }
}

/// Opens TCP connections to the broker.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    /// Connector giving up on a TCP handshake after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Connect for TcpConnector {
    type Connection = TcpConnection;
    type Error = Error;

    fn connect(&mut self, remote: SocketAddrV4) -> Result<TcpConnection, Error> {
        let stream = TcpStream::connect_timeout(&SocketAddr::V4(remote), self.timeout)
            .map_err(|e| map_io(&e))?;
        stream.set_nonblocking(true).map_err(|e| map_io(&e))?;
        stream.set_nodelay(true).map_err(|e| map_io(&e))?;
        debug!("TCP connected to {}", remote);
        Ok(TcpConnection { stream })
    }
}

/// A non-blocking TCP stream.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
}

impl Read for TcpConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        match io::Read::read(&mut self.stream, buf) {
            // A zero-length read on a readable socket is the peer closing.
            Ok(0) if !buf.is_empty() => Err(Error::ConnectionClosed),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(map_io(&e)),
        }
    }
}

impl Write for TcpConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        loop {
            match io::Write::write(&mut self.stream, buf) {
                Ok(n) => return Ok(n),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                    thread::yield_now();
                }
                Err(e) => return Err(map_io(&e)),
            }
        }
    }

    fn flush(&mut self) -> Result<(), Error> {
        io::Write::flush(&mut self.stream).map_err(|e| map_io(&e))
    }
}

impl Close for TcpConnection {
    type Error = Error;

    fn close(self) -> Result<(), Error> {
        match self.stream.shutdown(std::net::Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(map_io(&e)),
        }
    }
}

impl Connection for TcpConnection {}

/// A "radio" that is always associated: the host's own network.
#[derive(Debug)]
pub struct HostStack {
    address: Ipv4Addr,
    joined: bool,
    events: VecDeque<RadioEvent>,
}

impl HostStack {
    /// Report `address` as the station address once joined.
    pub fn new(address: Ipv4Addr) -> Self {
        Self {
            address,
            joined: false,
            events: VecDeque::new(),
        }
    }

    /// Simulate the link going away.
    pub fn drop_link(&mut self) {
        self.joined = false;
        self.events.push_back(RadioEvent::Down);
    }
}

impl NetworkStack for HostStack {
    type Error = Error;

    fn begin_join(
        &mut self,
        ssid: &str,
        _passphrase: &str,
        _auth: AuthMode,
        _timeout: Duration,
    ) -> Result<(), Error> {
        info!("host network stands in for '{}'", ssid);
        self.joined = true;
        self.events.push_back(RadioEvent::Associating);
        self.events.push_back(RadioEvent::Up(self.address));
        Ok(())
    }

    fn service_once(&mut self) {}

    fn next_event(&mut self) -> Option<RadioEvent> {
        self.events.pop_front()
    }

    fn ipv4_address(&self) -> Option<Ipv4Addr> {
        self.joined.then_some(self.address)
    }
}

/// Monotonic clock counting from its creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: std::time::Instant,
}

impl SystemClock {
    /// Start counting now.
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        let millis = u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX);
        Instant::from_millis(millis)
    }
}

/// Delay backed by `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_stack_reports_up_after_join() {
        let mut stack = HostStack::new(Ipv4Addr::new(10, 0, 0, 7));
        assert_eq!(stack.ipv4_address(), None);
        stack
            .begin_join("lab", "", AuthMode::Open, Duration::from_secs(1))
            .unwrap();
        assert_eq!(stack.next_event(), Some(RadioEvent::Associating));
        assert_eq!(
            stack.next_event(),
            Some(RadioEvent::Up(Ipv4Addr::new(10, 0, 0, 7)))
        );
        assert_eq!(stack.next_event(), None);

        stack.drop_link();
        assert_eq!(stack.next_event(), Some(RadioEvent::Down));
        assert_eq!(stack.ipv4_address(), None);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        StdDelay.delay_ms(2);
        assert!(clock.now() >= a);
    }
}
