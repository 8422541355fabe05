//! MQTT 3.1.1 broker session for embedded systems.
//!
//! MQTT uses a publish-subscribe pattern where:
//! - **Publishers** send messages to topics
//! - **Subscribers** receive messages from topics they're interested in
//! - **Brokers** route messages between publishers and subscribers
//!
//! Unlike a blocking client, the [`SessionManager`] never waits on the socket.
//! `connect` and `subscribe` write their request and return; the broker's
//! answers (CONNACK, SUBACK) and inbound PUBLISH packets are decoded while the
//! session is serviced and handed to the control loop as
//! [`Event`](crate::event::Event)s.
//!
//! # Modules
//!
//! - [`packet`]: encoding and decoding of the control packets the session uses
//! - [`session`]: the session state machine
//! - [`router`]: topic-filter matching and the inbound handler registry
//!
//! # Example
//!
//! ```rust
//! use picolink::network::application::mqtt::{SessionManager, SessionState, QoS};
//! use picolink::network::error::SessionError;
//! use picolink::time::Instant;
//! # use picolink::network::{Connection, Read, Write, Close};
//! # struct MockConnection;
//! # impl Connection for MockConnection {}
//! # impl Read for MockConnection {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl Write for MockConnection {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Close for MockConnection {
//! #     type Error = ();
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//!
//! let mut session = SessionManager::<MockConnection>::new("pico/topic", QoS::AtMostOnce)?;
//! assert_eq!(session.state(), SessionState::Idle);
//!
//! // Nothing can be published before the broker accepts the session.
//! let result = session.publish("pico/topic", b"Hello from Pico!", QoS::AtMostOnce, false, Instant::ZERO);
//! assert_eq!(result, Err(SessionError::NotConnected));
//! # Ok::<(), SessionError>(())
//! ```

use core::fmt;

pub mod packet;
pub mod router;
pub mod session;

pub use packet::{MAX_PACKET_SIZE, MAX_PAYLOAD_LEN, MAX_TOPIC_LEN};
pub use router::{HandlerRegistry, MessageHandler, topic_matches};
pub use session::{
    ConnectOptions, ConnectionStatus, IncomingMessage, RejectReason, SessionManager,
    SessionState, SubAckResult, Subscription,
};

/// Quality of Service levels for MQTT messages.
///
/// QoS defines the guarantee of delivery for a specific message. Higher QoS levels
/// provide stronger delivery guarantees but require more network overhead and
/// client state management.
///
/// # Examples
///
/// ```rust
/// use picolink::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::try_from(2u8), Ok(QoS::ExactlyOnce));
/// assert!(QoS::try_from(3u8).is_err());
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Default, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(try_from = "u8")]
#[repr(u8)]
pub enum QoS {
    /// **QoS 0**: At most once delivery.
    ///
    /// Fire and forget. The heartbeat uses this level: a lost beat is simply
    /// replaced by the next one.
    #[default]
    AtMostOnce = 0,

    /// **QoS 1**: At least once delivery.
    ///
    /// Messages are assured to arrive but duplicates can occur.
    AtLeastOnce = 1,

    /// **QoS 2**: Exactly once delivery.
    ///
    /// Messages are assured to arrive exactly once, at the cost of a four-way
    /// handshake.
    ExactlyOnce = 2,
}

/// A QoS value outside `0..=2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidQoS(pub u8);

impl fmt::Display for InvalidQoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid QoS level {}", self.0)
    }
}

impl TryFrom<u8> for QoS {
    type Error = InvalidQoS;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(InvalidQoS(other)),
        }
    }
}

/// Return code carried by a CONNACK packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectReturnCode {
    /// The connection was accepted.
    Accepted,
    /// The broker does not support MQTT 3.1.1.
    UnacceptableProtocolVersion,
    /// The client identifier is not valid.
    IdentifierRejected,
    /// The broker is unavailable.
    ServerUnavailable,
    /// The username or password is malformed.
    BadUserNameOrPassword,
    /// The client is not authorized to connect.
    NotAuthorized,
    /// A code outside the 3.1.1 table.
    Other(u8),
}

impl From<u8> for ConnectReturnCode {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Accepted,
            1 => Self::UnacceptableProtocolVersion,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadUserNameOrPassword,
            5 => Self::NotAuthorized,
            _ => Self::Other(val),
        }
    }
}

impl From<ConnectReturnCode> for u8 {
    fn from(code: ConnectReturnCode) -> u8 {
        match code {
            ConnectReturnCode::Accepted => 0,
            ConnectReturnCode::UnacceptableProtocolVersion => 1,
            ConnectReturnCode::IdentifierRejected => 2,
            ConnectReturnCode::ServerUnavailable => 3,
            ConnectReturnCode::BadUserNameOrPassword => 4,
            ConnectReturnCode::NotAuthorized => 5,
            ConnectReturnCode::Other(val) => val,
        }
    }
}
