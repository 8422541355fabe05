//! A network abstraction layer for embedded systems
//!
//! The firmware core never talks to a radio chip or a TCP/IP stack directly.
//! It goes through the traits below, which a board support crate implements
//! on top of its driver (CYW43, esp-wifi, smoltcp, lwIP bindings, ...):
//!
//! - [`NetworkStack`]: the radio and the stack's event pump (`service_once`)
//! - [`Connect`]: opens a byte stream to the broker
//! - [`Read`] / [`Write`] / [`Close`]: the byte stream itself
//!

#![allow(missing_docs)]
#![deny(unsafe_code)]

use core::net::{Ipv4Addr, SocketAddrV4};
use core::time::Duration;

/// Common error types for network operations
pub mod error;

/// Wi-Fi link management
pub mod link;

/// Protocol-specific implementations
pub mod application;

/// `std`-backed implementations for running the core on a host
#[cfg(feature = "std")]
pub mod host;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, NetworkStack, Read, Write};
}

// Core synchronous traits
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection.
    ///
    /// Must not block: `Ok(0)` means no data is available right now.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Open a connection to `remote`
    fn connect(&mut self, remote: SocketAddrV4) -> Result<Self::Connection, Self::Error>;
}

/// Wi-Fi authentication mode requested at association time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Open network, no passphrase.
    Open,
    /// WPA-TKIP personal.
    WpaTkipPsk,
    /// WPA2-AES personal.
    #[default]
    Wpa2AesPsk,
    /// WPA/WPA2 mixed personal.
    Wpa2MixedPsk,
}

/// A link-level event reported by the radio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent {
    /// Association is in progress.
    Associating,
    /// Associated and an address was assigned.
    Up(Ipv4Addr),
    /// The link dropped or the association attempt failed.
    Down,
    /// The access point refused the credentials.
    AuthRejected,
}

/// The radio plus the network stack behind it.
///
/// Everything asynchronous the driver does (packet RX/TX, DHCP, timers) happens
/// inside [`service_once`](NetworkStack::service_once). Link changes observed
/// while servicing are queued by the driver and handed out through
/// [`next_event`](NetworkStack::next_event), so nothing ever calls back into
/// the firmware core.
pub trait NetworkStack {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Start associating with `ssid`.
    ///
    /// Returns immediately; progress is reported through [`RadioEvent`]s. The
    /// `timeout` is a hint for drivers with their own join timer, the
    /// [`LinkManager`](link::LinkManager) enforces it regardless.
    fn begin_join(
        &mut self,
        ssid: &str,
        passphrase: &str,
        auth: AuthMode,
        timeout: Duration,
    ) -> Result<(), Self::Error>;

    /// Drive the stack's internal processing once. Non-blocking and bounded.
    fn service_once(&mut self);

    /// Pop the next link event produced by servicing, if any.
    fn next_event(&mut self) -> Option<RadioEvent>;

    /// The address currently assigned to the station interface.
    fn ipv4_address(&self) -> Option<Ipv4Addr>;
}
