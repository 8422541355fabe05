//! Firmware configuration.
//!
//! Everything the firmware needs to know about its environment lives in one
//! [`Config`]. The built-in defaults match a stock Mosquitto broker on the
//! local network; a board crate typically overrides the Wi-Fi credentials and
//! the broker address, either in code or from a JSON blob stored in flash:
//!
//! ```rust
//! use picolink::config::Config;
//!
//! let json = r#"{"ssid":"home","passphrase":"hunter22","broker_address":"192.168.1.10"}"#;
//! let config = Config::from_json(json)?;
//!
//! assert_eq!(config.broker_port, 1883);
//! assert_eq!(config.client_id.as_str(), "pico_client");
//! # Ok::<(), picolink::config::ConfigError>(())
//! ```

use core::fmt;
use core::time::Duration;

use heapless::String;
use log::error;
use serde::Deserialize;

use crate::network::AuthMode;
use crate::network::application::mqtt::QoS;
use crate::network::application::mqtt::packet::{MAX_CLIENT_ID_LEN, MAX_TOPIC_LEN};

/// Longest SSID allowed by 802.11.
pub const MAX_SSID_LEN: usize = 32;
/// Longest WPA passphrase.
pub const MAX_PASSPHRASE_LEN: usize = 64;
/// Longest broker address, a dotted IPv4 quad.
pub const MAX_ADDRESS_LEN: usize = 15;
/// Longest heartbeat payload.
pub const MAX_HEARTBEAT_LEN: usize = 128;

/// Reasons a configuration is rejected.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConfigError {
    /// The JSON blob is malformed, has an unknown value or a string too long.
    Parse,
    /// No SSID.
    EmptySsid,
    /// A secured network without a passphrase.
    MissingPassphrase,
    /// No broker address.
    EmptyBrokerAddress,
    /// No client identifier.
    EmptyClientId,
    /// No publish topic.
    EmptyTopic,
    /// A heartbeat period of zero.
    ZeroHeartbeatPeriod,
    /// A loop tick of zero.
    ZeroTickInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConfigError::Parse => "configuration could not be parsed",
            ConfigError::EmptySsid => "SSID is empty",
            ConfigError::MissingPassphrase => "secured network needs a passphrase",
            ConfigError::EmptyBrokerAddress => "broker address is empty",
            ConfigError::EmptyClientId => "client identifier is empty",
            ConfigError::EmptyTopic => "publish topic is empty",
            ConfigError::ZeroHeartbeatPeriod => "heartbeat period must be positive",
            ConfigError::ZeroTickInterval => "tick interval must be positive",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConfigError::Parse => defmt::write!(f, "Parse"),
            ConfigError::EmptySsid => defmt::write!(f, "EmptySsid"),
            ConfigError::MissingPassphrase => defmt::write!(f, "MissingPassphrase"),
            ConfigError::EmptyBrokerAddress => defmt::write!(f, "EmptyBrokerAddress"),
            ConfigError::EmptyClientId => defmt::write!(f, "EmptyClientId"),
            ConfigError::EmptyTopic => defmt::write!(f, "EmptyTopic"),
            ConfigError::ZeroHeartbeatPeriod => defmt::write!(f, "ZeroHeartbeatPeriod"),
            ConfigError::ZeroTickInterval => defmt::write!(f, "ZeroTickInterval"),
        }
    }
}

/// Wi-Fi, broker and heartbeat settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network to join.
    pub ssid: String<MAX_SSID_LEN>,
    /// Passphrase; ignored for open networks.
    pub passphrase: String<MAX_PASSPHRASE_LEN>,
    /// Security of the network.
    pub auth_mode: AuthMode,
    /// How long to wait for association before giving up.
    pub association_timeout_ms: u32,
    /// Broker IPv4 address.
    pub broker_address: String<MAX_ADDRESS_LEN>,
    /// Broker TCP port.
    pub broker_port: u16,
    /// Client identifier sent in CONNECT.
    pub client_id: String<MAX_CLIENT_ID_LEN>,
    /// MQTT keep-alive; 0 disables pings and the silence check.
    pub keep_alive_seconds: u16,
    /// Ask the broker to drop any stored session.
    pub clean_session: bool,
    /// Give up on a handshake without CONNACK after this long.
    pub connack_timeout_ms: Option<u32>,
    /// Topic subscribed once the session is accepted; empty to skip.
    pub subscribe_topic: String<MAX_TOPIC_LEN>,
    /// QoS of the subscription.
    pub subscribe_qos: QoS,
    /// Topic the heartbeat is published on.
    pub publish_topic: String<MAX_TOPIC_LEN>,
    /// QoS of the heartbeat.
    pub publish_qos: QoS,
    /// Retain flag of the heartbeat.
    pub publish_retain: bool,
    /// Heartbeat body.
    pub heartbeat_payload: String<MAX_HEARTBEAT_LEN>,
    /// Heartbeat cadence.
    pub heartbeat_period_ms: u32,
    /// Sleep between control loop iterations.
    pub tick_interval_ms: u32,
}

/// Copy a literal into a fixed-capacity string, truncating if needed.
fn text<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            passphrase: String::new(),
            auth_mode: AuthMode::Wpa2AesPsk,
            association_timeout_ms: 10_000,
            broker_address: text("127.0.0.1"),
            broker_port: 1883,
            client_id: text("pico_client"),
            keep_alive_seconds: 60,
            clean_session: true,
            connack_timeout_ms: None,
            subscribe_topic: text("pico/topic"),
            subscribe_qos: QoS::AtMostOnce,
            publish_topic: text("pico/topic"),
            publish_qos: QoS::AtMostOnce,
            publish_retain: false,
            heartbeat_payload: text("Hello from Pico!"),
            heartbeat_period_ms: 5_000,
            tick_interval_ms: 100,
        }
    }
}

impl Config {
    /// Parse a JSON object; absent fields keep their defaults.
    ///
    /// The result is validated before it is returned.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let (config, _) = serde_json_core::from_str::<Config>(json).map_err(|e| {
            error!("invalid configuration: {:?}", e);
            ConfigError::Parse
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings the firmware cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() {
            return Err(ConfigError::EmptySsid);
        }
        if self.auth_mode != AuthMode::Open && self.passphrase.is_empty() {
            return Err(ConfigError::MissingPassphrase);
        }
        if self.broker_address.is_empty() {
            return Err(ConfigError::EmptyBrokerAddress);
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::EmptyClientId);
        }
        if self.publish_topic.is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        if self.heartbeat_period_ms == 0 {
            return Err(ConfigError::ZeroHeartbeatPeriod);
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }

    /// Association timeout as a [`Duration`].
    pub fn association_timeout(&self) -> Duration {
        Duration::from_millis(self.association_timeout_ms.into())
    }

    /// Heartbeat period as a [`Duration`].
    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_period_ms.into())
    }

    /// CONNACK timeout as a [`Duration`], if configured.
    pub fn connack_timeout(&self) -> Option<Duration> {
        self.connack_timeout_ms
            .map(|ms| Duration::from_millis(ms.into()))
    }
}
