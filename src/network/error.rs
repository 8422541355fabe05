//! Common error types for network operations
//!
//! Three layers report failures here:
//!
//! - [`Error`]: byte-level transport failures from a [`Connection`](super::Connection)
//! - [`LinkError`]: Wi-Fi association failures, fatal to the firmware
//! - [`SessionError`]: broker session failures, logged and skipped in steady state

use core::fmt;

/// A common error type for network operations.
///
/// This enum defines a set of common errors that can occur when working with
/// network devices. It is designed to be simple and portable for `no_std`
/// environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// A connection attempt was refused.
    ConnectionRefused,
    /// A timeout occurred.
    Timeout,
    /// The connection was closed.
    ConnectionClosed,
    /// An invalid address was provided.
    InvalidAddress,
    /// A protocol-specific error occurred.
    ProtocolError,
    /// A packet did not fit in the fixed-size buffers.
    BufferOverflow,
}

/// Failure to bring the wireless link up.
///
/// Association happens once at boot and nothing useful can run without a
/// link, so every variant is treated as fatal by the control loop.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LinkError {
    /// No association within the configured timeout.
    Timeout,
    /// The access point refused the credentials.
    AuthRejected,
    /// The radio driver could not start the association at all.
    InitFailed,
}

/// Failure of a broker session operation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SessionError {
    /// The broker address could not be parsed as an IPv4 address.
    InvalidAddress,
    /// The transport for the session could not be created.
    AllocationFailed,
    /// The operation needs an accepted session.
    NotConnected,
    /// The transport refused to carry the packet.
    TransportRejected(Error),
    /// `connect` was called while a handshake is pending or a session is live.
    AlreadyConnected,
    /// Topic, client identity or payload exceeds the fixed-size buffers.
    BufferOverflow,
}

impl From<Error> for SessionError {
    fn from(err: Error) -> Self {
        match err {
            Error::BufferOverflow => SessionError::BufferOverflow,
            other => SessionError::TransportRejected(other),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Error::NotOpen => "connection not open",
            Error::WriteError => "write failed",
            Error::ReadError => "read failed",
            Error::ConnectionRefused => "connection refused",
            Error::Timeout => "timed out",
            Error::ConnectionClosed => "connection closed",
            Error::InvalidAddress => "invalid address",
            Error::ProtocolError => "protocol error",
            Error::BufferOverflow => "buffer overflow",
        };
        f.write_str(text)
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Timeout => f.write_str("Wi-Fi association timed out"),
            LinkError::AuthRejected => f.write_str("access point rejected the credentials"),
            LinkError::InitFailed => f.write_str("radio failed to start association"),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidAddress => f.write_str("invalid broker address"),
            SessionError::AllocationFailed => f.write_str("could not create broker session"),
            SessionError::NotConnected => f.write_str("session not accepted"),
            SessionError::TransportRejected(e) => write!(f, "transport rejected packet: {}", e),
            SessionError::AlreadyConnected => f.write_str("session already connecting or live"),
            SessionError::BufferOverflow => f.write_str("packet exceeds buffer"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
            Error::BufferOverflow => defmt::write!(f, "BufferOverflow"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            LinkError::Timeout => defmt::write!(f, "Timeout"),
            LinkError::AuthRejected => defmt::write!(f, "AuthRejected"),
            LinkError::InitFailed => defmt::write!(f, "InitFailed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SessionError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SessionError::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            SessionError::AllocationFailed => defmt::write!(f, "AllocationFailed"),
            SessionError::NotConnected => defmt::write!(f, "NotConnected"),
            SessionError::TransportRejected(e) => defmt::write!(f, "TransportRejected({})", e),
            SessionError::AlreadyConnected => defmt::write!(f, "AlreadyConnected"),
            SessionError::BufferOverflow => defmt::write!(f, "BufferOverflow"),
        }
    }
}
