//! Hand-written mocks shared by the integration tests.
//!
//! Every mock hands out a cloneable handle so a test can keep poking at a
//! device after the control loop has taken ownership of it.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use picolink::indicator::StatusIndicator;
use picolink::network::application::mqtt::packet::{self, CONNACK, SUBACK};
use picolink::network::error::Error;
use picolink::network::*;
use picolink::time::{Clock, Instant};

pub const DEVICE_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 42);

/// Both ends of a fake TCP stream.
#[derive(Debug, Default)]
pub struct Wire {
    pub inbound: VecDeque<u8>,
    pub outbound: Vec<u8>,
    pub closed: bool,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WireHandle(pub Rc<RefCell<Wire>>);

impl WireHandle {
    /// Queue bytes for the session to read.
    pub fn feed(&self, bytes: &[u8]) {
        self.0.borrow_mut().inbound.extend(bytes.iter().copied());
    }

    pub fn accept(&self) {
        self.feed(&[CONNACK, 2, 0, 0]);
    }

    pub fn refuse(&self, code: u8) {
        self.feed(&[CONNACK, 2, 0, code]);
    }

    pub fn suback(&self, packet_id: u16, code: u8) {
        let [hi, lo] = packet_id.to_be_bytes();
        self.feed(&[SUBACK, 3, hi, lo, code]);
    }

    /// Split everything written so far into packets and clear it.
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        let bytes = std::mem::take(&mut self.0.borrow_mut().outbound);
        let mut packets = Vec::new();
        let mut rest = &bytes[..];
        while let Some(len) = packet::frame_len(rest).unwrap() {
            packets.push(rest[..len].to_vec());
            rest = &rest[len..];
        }
        assert!(rest.is_empty(), "trailing partial packet");
        packets
    }

    /// Fixed-header bytes of every packet written so far; clears the wire.
    pub fn sent_kinds(&self) -> Vec<u8> {
        self.take_sent().iter().map(|p| p[0]).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.0.borrow().closed
    }
}

#[derive(Debug)]
pub struct MockConnection {
    wire: WireHandle,
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut wire = self.wire.0.borrow_mut();
        if wire.closed {
            return Err(Error::NotOpen);
        }
        if wire.fail_reads {
            return Err(Error::ReadError);
        }
        let len = buf.len().min(wire.inbound.len());
        for slot in buf.iter_mut().take(len) {
            *slot = wire.inbound.pop_front().unwrap();
        }
        Ok(len)
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut wire = self.wire.0.borrow_mut();
        if wire.closed {
            return Err(Error::NotOpen);
        }
        if wire.fail_writes {
            return Err(Error::WriteError);
        }
        wire.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        self.wire.0.borrow_mut().closed = true;
        Ok(())
    }
}

impl Connection for MockConnection {}

/// Opens [`MockConnection`]s and remembers where it was asked to connect.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    pub wire: WireHandle,
    pub attempts: Rc<RefCell<Vec<SocketAddrV4>>>,
    pub refuse: Rc<Cell<bool>>,
}

impl MockConnector {
    pub fn attempts(&self) -> usize {
        self.attempts.borrow().len()
    }
}

impl Connect for MockConnector {
    type Connection = MockConnection;
    type Error = Error;

    fn connect(&mut self, remote: SocketAddrV4) -> Result<Self::Connection, Self::Error> {
        self.attempts.borrow_mut().push(remote);
        if self.refuse.get() {
            return Err(Error::ConnectionRefused);
        }
        // Each connection gets a fresh wire, reachable through the connector.
        *self.wire.0.borrow_mut() = Wire::default();
        Ok(MockConnection {
            wire: self.wire.clone(),
        })
    }
}

/// How the mock radio answers a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Associate and get `DEVICE_IP` on the first service.
    Up,
    /// Associate, then report the address twice more.
    UpRepeated,
    /// Never associate.
    Silent,
    /// Refuse the credentials.
    BadCredentials,
    /// Fail to start at all.
    DriverError,
}

#[derive(Debug)]
pub struct RadioState {
    pub outcome: JoinOutcome,
    pub pending: VecDeque<RadioEvent>,
    pub ready: VecDeque<RadioEvent>,
    pub services: usize,
    pub joins: usize,
    pub last_auth: Option<AuthMode>,
}

#[derive(Debug, Clone)]
pub struct MockRadio(pub Rc<RefCell<RadioState>>);

impl MockRadio {
    pub fn new(outcome: JoinOutcome) -> Self {
        Self(Rc::new(RefCell::new(RadioState {
            outcome,
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            services: 0,
            joins: 0,
            last_auth: None,
        })))
    }

    /// Make `event` show up on the next service.
    pub fn inject(&self, event: RadioEvent) {
        self.0.borrow_mut().pending.push_back(event);
    }

    pub fn services(&self) -> usize {
        self.0.borrow().services
    }
}

impl NetworkStack for MockRadio {
    type Error = Error;

    fn begin_join(
        &mut self,
        _ssid: &str,
        _passphrase: &str,
        auth: AuthMode,
        _timeout: Duration,
    ) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        state.joins += 1;
        state.last_auth = Some(auth);
        let events: &[RadioEvent] = match state.outcome {
            JoinOutcome::Up => &[RadioEvent::Associating, RadioEvent::Up(DEVICE_IP)],
            JoinOutcome::UpRepeated => &[
                RadioEvent::Associating,
                RadioEvent::Up(DEVICE_IP),
                RadioEvent::Up(DEVICE_IP),
                RadioEvent::Up(DEVICE_IP),
            ],
            JoinOutcome::Silent => &[RadioEvent::Associating],
            JoinOutcome::BadCredentials => &[RadioEvent::Associating, RadioEvent::AuthRejected],
            JoinOutcome::DriverError => return Err(Error::NotOpen),
        };
        state.pending.extend(events.iter().copied());
        Ok(())
    }

    fn service_once(&mut self) {
        let mut state = self.0.borrow_mut();
        state.services += 1;
        let pending = std::mem::take(&mut state.pending);
        state.ready.extend(pending);
    }

    fn next_event(&mut self) -> Option<RadioEvent> {
        self.0.borrow_mut().ready.pop_front()
    }

    fn ipv4_address(&self) -> Option<Ipv4Addr> {
        None
    }
}

/// Simulated time shared by [`MockClock`] and [`MockDelay`], in nanoseconds.
#[derive(Debug, Clone, Default)]
pub struct SimTime(pub Rc<Cell<u64>>);

impl SimTime {
    pub fn advance_ms(&self, ms: u64) {
        self.0.set(self.0.get() + ms * 1_000_000);
    }

    pub fn millis(&self) -> u64 {
        self.0.get() / 1_000_000
    }

    pub fn clock(&self) -> MockClock {
        MockClock(self.clone())
    }

    pub fn delay(&self) -> MockDelay {
        MockDelay(self.clone())
    }
}

#[derive(Debug, Clone)]
pub struct MockClock(SimTime);

impl Clock for MockClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.0.millis())
    }
}

/// Sleeping only moves simulated time forward.
#[derive(Debug, Clone)]
pub struct MockDelay(SimTime);

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        let time = &(self.0).0;
        time.set(time.get() + u64::from(ns));
    }
}

/// Records every level written to the indicator.
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicator(pub Rc<RefCell<Vec<bool>>>);

impl RecordingIndicator {
    pub fn history(&self) -> Vec<bool> {
        self.0.borrow().clone()
    }
}

impl StatusIndicator for RecordingIndicator {
    fn set_link_up(&mut self, up: bool) {
        self.0.borrow_mut().push(up);
    }
}

/// An output pin that remembers its level.
#[derive(Debug, Clone, Default)]
pub struct MockPin(pub Rc<RefCell<Vec<bool>>>);

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(true);
        Ok(())
    }
}
