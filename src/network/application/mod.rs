//! # Application Layer Network Protocols
//!
//! Application layer (OSI Layer 7) protocols spoken by the firmware. Each one
//! works on top of the core network traits and keeps to fixed-size buffers.
//!
//! ## Available Protocols
//!
//! - **[`mqtt`]**: MQTT 3.1.1 broker session for publish-subscribe messaging
//!
//! ## Design Principles
//!
//! - **Connection Agnostic**: Work with any type implementing [`Connection`](crate::network::Connection)
//! - **No-std Compatible**: Designed for embedded systems without heap allocation
//! - **Non-blocking**: Outcomes of handshakes and requests arrive as events,
//!   never by waiting on the socket

/// MQTT session implementation.
///
/// Provides the broker session (connect, keep-alive, subscribe, publish,
/// disconnect), the packet codec underneath it and the inbound message router.
pub mod mqtt;
