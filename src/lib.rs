//! # picolink - connection-lifecycle core for heartbeat firmware
//!
//! The portable part of a microcontroller firmware that joins a Wi-Fi network,
//! opens an MQTT session with a broker, subscribes to one topic and publishes a
//! heartbeat on a fixed cadence, mirroring its connectivity on a status LED.
//! The crate is `no_std` and talks to hardware only through traits, so the
//! same core runs on a Pico W, an ESP32 or a Linux host.
//!
//! ## Components
//!
//! - **Link manager** ([`network::link`]): association and link state
//! - **Session manager** ([`network::application::mqtt`]): broker session state machine
//! - **Publish scheduler** ([`scheduler`]): heartbeat cadence on a monotonic clock
//! - **Status indicator** ([`indicator`]): one bit of status on an output pin
//! - **Control loop** ([`control`]): services the stack, dispatches [`event`]s,
//!   publishes the heartbeat and sleeps
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! picolink = "0.1.0"
//! ```
//!
//! ### Heartbeat timing
//!
//! ```rust
//! use core::time::Duration;
//! use picolink::scheduler::HeartbeatTimer;
//! use picolink::time::Instant;
//!
//! let mut timer = HeartbeatTimer::new(Duration::from_secs(5), Instant::ZERO);
//! let fired = (0..=12)
//!     .filter(|s| timer.is_due(Instant::from_secs(*s)))
//!     .count();
//! assert_eq!(fired, 2);
//! ```
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers (ARM Cortex-M, RISC-V, etc.)
//! - Linux hosts, with the `std` feature, for bench testing against a real broker
//!
//! ## Optional Features
//!
//! - `std`: host implementations of the network, clock and delay traits
//! - `defmt`: `defmt::Format` for the error and state types

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

/// Firmware configuration and its defaults.
pub mod config;

/// The control loop tying link, session and scheduler together.
pub mod control;

/// Events queued during servicing and dispatched by the control loop.
pub mod event;

/// The status LED.
pub mod indicator;

/// Network abstraction layer: link management and the MQTT session.
pub mod network;

/// Heartbeat cadence.
pub mod scheduler;

/// Monotonic time.
pub mod time;

pub use config::Config;
pub use control::ControlLoop;
