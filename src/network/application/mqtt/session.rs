//! Broker session manager.
//!
//! Owns the one transport handle of the firmware and walks the session through
//!
//! ```text
//! Idle ──connect──▶ Connecting ──CONNACK 0──▶ Accepted ──closed──▶ Disconnected
//!                       │                                              │
//!                       └──refused / timeout / closed──▶ Rejected      │
//!                                                           │          │
//!                       Connecting ◀──────── reconnect ─────┴──────────┘
//! ```
//!
//! Nothing here blocks on the broker. Requests are written and the method
//! returns; answers are decoded in [`SessionManager::service`] and queued as
//! [`Event`]s for the control loop, which feeds them back through
//! [`on_status_change`](SessionManager::on_status_change) and
//! [`on_suback`](SessionManager::on_suback).

use core::net::{Ipv4Addr, SocketAddrV4};
use core::str::FromStr;
use core::time::Duration;

use heapless::{FnvIndexMap, String, Vec};
use log::{debug, error, info, warn};

use super::packet::{
    self, MAX_CLIENT_ID_LEN, MAX_PACKET_SIZE, MAX_PAYLOAD_LEN, MAX_TOPIC_LEN, Packet, PacketBuf,
};
use super::router::{HandlerRegistry, MessageHandler};
use super::{ConnectReturnCode, QoS};
use crate::event::{Event, EventQueue};
use crate::network::error::{Error, SessionError};
use crate::network::{Close, Connect, Connection, Read, Write};
use crate::time::Instant;

/// Maximum number of tracked subscriptions.
pub const MAX_SUBSCRIPTIONS: usize = 8;

/// Largest chunk pulled from the transport per read call.
const READ_CHUNK: usize = 256;

/// Why a handshake did not produce a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RejectReason {
    /// The broker answered with a non-zero CONNACK code.
    Refused(ConnectReturnCode),
    /// No CONNACK within the configured timeout.
    Timeout,
    /// The transport closed before CONNACK.
    Closed,
}

/// State of the broker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// Never connected.
    #[default]
    Idle,
    /// CONNECT sent, waiting for CONNACK.
    Connecting,
    /// The broker accepted the session; publish and subscribe are allowed.
    Accepted,
    /// The handshake failed. Unusable until an explicit reconnect.
    Rejected(RejectReason),
    /// An accepted session ended. Unusable until an explicit reconnect.
    Disconnected,
}

/// Connection status reported by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionStatus {
    /// CONNACK with return code 0.
    Accepted,
    /// CONNACK with a refusal code.
    Refused(ConnectReturnCode),
    /// The transport closed, failed, or the broker went silent.
    Disconnected,
    /// No CONNACK arrived in time.
    Timeout,
}

/// Outcome of a subscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubAckResult {
    /// Subscribed with the given maximum QoS.
    Granted(QoS),
    /// The broker refused the subscription.
    Failure,
}

/// A subscription issued on the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Topic filter.
    pub topic: String<MAX_TOPIC_LEN>,
    /// Requested QoS.
    pub qos: QoS,
    /// Set once the broker acknowledged the request.
    pub confirmed: bool,
    /// Identifier of the SUBSCRIBE packet awaiting its SUBACK.
    pub packet_id: u16,
}

/// A message received on a subscribed topic.
///
/// Transient: handed to the inbound handlers and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Topic the message was published on.
    pub topic: String<MAX_TOPIC_LEN>,
    /// Message body.
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
    /// Length of the payload as sent by the broker.
    pub total_len: usize,
    /// Delivery level.
    pub qos: QoS,
    /// Retained-message flag.
    pub retain: bool,
}

/// Parameters of the last `connect`, kept for `reconnect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Broker endpoint.
    pub broker: SocketAddrV4,
    /// Client identifier sent in CONNECT.
    pub client_id: String<MAX_CLIENT_ID_LEN>,
    /// Keep-alive interval in seconds; 0 disables keep-alive.
    pub keep_alive_seconds: u16,
}

/// What a decoded packet asks the session to do, detached from the receive
/// buffer so the session can write while acting on it.
enum Action {
    Status(ConnectionStatus),
    Deliver(Option<IncomingMessage>, Option<(u8, u16)>),
    Ack(u8, u16),
    SubAck(u16, SubAckResult),
    PingResp,
    Nothing,
}

/// The broker session.
pub struct SessionManager<C: Connection> {
    state: SessionState,
    connection: Option<C>,
    options: Option<ConnectOptions>,
    clean_session: bool,
    connack_timeout: Option<Duration>,
    subscribe_topic: String<MAX_TOPIC_LEN>,
    subscribe_qos: QoS,
    subscriptions: FnvIndexMap<String<MAX_TOPIC_LEN>, Subscription, MAX_SUBSCRIPTIONS>,
    next_packet_id: u16,
    rx: Vec<u8, MAX_PACKET_SIZE>,
    // Bytes of an oversized inbound packet still to be thrown away.
    discard: usize,
    connect_started: Instant,
    last_tx: Instant,
    last_rx: Instant,
    // When the unanswered PINGREQ went out.
    ping_sent: Option<Instant>,
    // A status the last full event queue could not take.
    pending_status: Option<ConnectionStatus>,
}

impl<C: Connection> SessionManager<C> {
    /// Create an idle session that subscribes to `subscribe_topic` once accepted.
    ///
    /// An empty topic disables the automatic subscription. A topic longer than
    /// [`MAX_TOPIC_LEN`] is rejected with [`SessionError::BufferOverflow`].
    pub fn new(subscribe_topic: &str, subscribe_qos: QoS) -> Result<Self, SessionError> {
        let subscribe_topic =
            String::try_from(subscribe_topic).map_err(|_| SessionError::BufferOverflow)?;
        Ok(Self::with_topic(subscribe_topic, subscribe_qos))
    }

    /// Like [`new`](Self::new), for a topic already in a bounded string.
    pub fn with_topic(subscribe_topic: String<MAX_TOPIC_LEN>, subscribe_qos: QoS) -> Self {
        Self {
            state: SessionState::Idle,
            connection: None,
            options: None,
            clean_session: true,
            connack_timeout: None,
            subscribe_topic,
            subscribe_qos,
            subscriptions: FnvIndexMap::new(),
            next_packet_id: 1,
            rx: Vec::new(),
            discard: 0,
            connect_started: Instant::ZERO,
            last_tx: Instant::ZERO,
            last_rx: Instant::ZERO,
            ping_sent: None,
            pending_status: None,
        }
    }

    /// Request a clean (default) or persistent session on the next connect.
    pub fn set_clean_session(&mut self, clean: bool) {
        self.clean_session = clean;
    }

    /// Give up on a handshake without CONNACK after `timeout`. Off by default.
    pub fn set_connack_timeout(&mut self, timeout: Option<Duration>) {
        self.connack_timeout = timeout;
    }

    /// Open the transport and send CONNECT.
    ///
    /// Returns as soon as CONNECT is written. The broker's answer arrives later
    /// as an [`Event::Session`] produced by [`service`](Self::service).
    ///
    /// # Errors
    ///
    /// * [`SessionError::InvalidAddress`] - `broker_address` is not a dotted IPv4 address
    /// * [`SessionError::AlreadyConnected`] - a handshake is pending or a session is live
    /// * [`SessionError::BufferOverflow`] - `client_identity` is too long
    /// * [`SessionError::AllocationFailed`] - the transport could not be opened
    /// * [`SessionError::TransportRejected`] - CONNECT could not be written
    pub fn connect<N>(
        &mut self,
        connector: &mut N,
        broker_address: &str,
        broker_port: u16,
        client_identity: &str,
        keep_alive_seconds: u16,
        now: Instant,
    ) -> Result<(), SessionError>
    where
        N: Connect<Connection = C>,
    {
        if matches!(self.state, SessionState::Connecting | SessionState::Accepted) {
            return Err(SessionError::AlreadyConnected);
        }
        let ip = Ipv4Addr::from_str(broker_address).map_err(|_| {
            error!("cannot parse broker address '{}'", broker_address);
            SessionError::InvalidAddress
        })?;
        let client_id =
            String::try_from(client_identity).map_err(|_| SessionError::BufferOverflow)?;
        self.options = Some(ConnectOptions {
            broker: SocketAddrV4::new(ip, broker_port),
            client_id,
            keep_alive_seconds,
        });
        self.open(connector, now)
    }

    /// Re-run the handshake with the options of the last [`connect`](Self::connect).
    ///
    /// This is the only way out of `Rejected` and `Disconnected`; the session
    /// never reconnects by itself.
    pub fn reconnect<N>(&mut self, connector: &mut N, now: Instant) -> Result<(), SessionError>
    where
        N: Connect<Connection = C>,
    {
        if self.options.is_none() {
            return Err(SessionError::NotConnected);
        }
        self.open(connector, now)
    }

    fn open<N>(&mut self, connector: &mut N, now: Instant) -> Result<(), SessionError>
    where
        N: Connect<Connection = C>,
    {
        if matches!(self.state, SessionState::Connecting | SessionState::Accepted) {
            return Err(SessionError::AlreadyConnected);
        }
        let Some(options) = self.options.clone() else {
            return Err(SessionError::NotConnected);
        };

        info!(
            "connecting to MQTT broker {} as '{}'",
            options.broker, options.client_id
        );
        let connection = connector.connect(options.broker).map_err(|e| {
            error!("cannot create broker session: {:?}", e);
            SessionError::AllocationFailed
        })?;
        self.connection = Some(connection);
        self.rx.clear();
        self.discard = 0;
        self.ping_sent = None;
        self.pending_status = None;

        let mut buf = PacketBuf::new();
        packet::encode_connect(
            &mut buf,
            &options.client_id,
            options.keep_alive_seconds,
            self.clean_session,
        )?;
        if let Err(e) = self.send(&buf, now) {
            error!("failed to send CONNECT: {}", e);
            self.drop_connection();
            return Err(e);
        }

        self.state = SessionState::Connecting;
        self.connect_started = now;
        self.last_rx = now;
        Ok(())
    }

    /// Apply a connection status reported by the transport.
    ///
    /// On `Accepted` the configured topic is subscribed, exactly once per
    /// accepted session. Every other status leaves the session unusable until
    /// [`reconnect`](Self::reconnect).
    pub fn on_status_change(&mut self, status: ConnectionStatus, now: Instant) -> SessionState {
        match (self.state, status) {
            (SessionState::Connecting, ConnectionStatus::Accepted) => {
                info!("connected to MQTT broker");
                self.state = SessionState::Accepted;
                self.subscriptions.clear();
                self.last_rx = now;
                self.ping_sent = None;
                if !self.subscribe_topic.is_empty() {
                    let topic = self.subscribe_topic.clone();
                    // The ack is reported later; a failed request is only logged.
                    if let Err(e) = self.subscribe(&topic, self.subscribe_qos, now) {
                        error!("cannot subscribe to {}: {}", topic, e);
                    }
                }
            }
            (SessionState::Accepted, ConnectionStatus::Accepted) => {
                warn!("duplicate CONNACK ignored");
            }
            (SessionState::Connecting, ConnectionStatus::Refused(code)) => {
                error!("MQTT connection refused: {:?}", code);
                self.reject(RejectReason::Refused(code));
            }
            (SessionState::Connecting, ConnectionStatus::Timeout) => {
                error!("MQTT connection timed out waiting for CONNACK");
                self.reject(RejectReason::Timeout);
            }
            (SessionState::Connecting, ConnectionStatus::Disconnected) => {
                error!("MQTT connection closed during handshake");
                self.reject(RejectReason::Closed);
            }
            (SessionState::Accepted, ConnectionStatus::Disconnected) => {
                warn!("MQTT session lost");
                self.drop_connection();
                self.state = SessionState::Disconnected;
            }
            (SessionState::Accepted, other) => {
                warn!("MQTT session ended: {:?}", other);
                self.drop_connection();
                self.state = SessionState::Disconnected;
            }
            (state, other) => {
                debug!("ignoring status {:?} in state {:?}", other, state);
            }
        }
        self.state
    }

    fn reject(&mut self, reason: RejectReason) {
        self.drop_connection();
        self.state = SessionState::Rejected(reason);
    }

    /// The link under the session went away: the transport is dead.
    pub fn on_link_lost(&mut self) {
        self.end_session();
    }

    fn end_session(&mut self) {
        match self.state {
            SessionState::Connecting => self.reject(RejectReason::Closed),
            SessionState::Accepted => {
                self.drop_connection();
                self.state = SessionState::Disconnected;
            }
            _ => {}
        }
    }

    /// Subscribe to `topic`.
    ///
    /// The SUBACK is reported later as [`Event::SubAck`] and is not retried.
    pub fn subscribe(&mut self, topic: &str, qos: QoS, now: Instant) -> Result<(), SessionError> {
        if self.state != SessionState::Accepted {
            return Err(SessionError::NotConnected);
        }
        let key = String::try_from(topic).map_err(|_| SessionError::BufferOverflow)?;
        let packet_id = self.allocate_packet_id();

        let mut buf = PacketBuf::new();
        packet::encode_subscribe(&mut buf, packet_id, topic, qos)?;
        if let Err(e) = self.send(&buf, now) {
            error!("error subscribing to topic {}: {}", topic, e);
            return Err(e);
        }

        let subscription = Subscription {
            topic: key.clone(),
            qos,
            confirmed: false,
            packet_id,
        };
        if self.subscriptions.insert(key, subscription).is_err() {
            warn!("subscription table full, not tracking {}", topic);
        }
        info!("subscribed to topic {} with QoS {}", topic, qos as u8);
        Ok(())
    }

    /// Record the broker's answer to a subscribe request.
    pub fn on_suback(&mut self, packet_id: u16, result: SubAckResult) {
        let Some(subscription) = self
            .subscriptions
            .values_mut()
            .find(|s| s.packet_id == packet_id && !s.confirmed)
        else {
            warn!("SUBACK for unknown packet id {}", packet_id);
            return;
        };
        match result {
            SubAckResult::Granted(qos) => {
                subscription.confirmed = true;
                info!(
                    "subscription to {} confirmed (QoS {})",
                    subscription.topic, qos as u8
                );
            }
            SubAckResult::Failure => {
                error!("subscription to {} refused by broker", subscription.topic);
            }
        }
    }

    /// Log an inbound message and hand it to every matching handler.
    ///
    /// Never fails: a message nobody listens to is only logged.
    pub fn on_inbound_message<H: MessageHandler>(
        &self,
        message: &IncomingMessage,
        handlers: &mut HandlerRegistry<H>,
    ) -> usize {
        info!(
            "message on {} ({} bytes, QoS {})",
            message.topic, message.total_len, message.qos as u8
        );
        let delivered = handlers.dispatch(message);
        if delivered == 0 {
            debug!("no handler for {}", message.topic);
        }
        delivered
    }

    /// Publish `payload` on `topic`. Fire and forget: no acknowledgement is
    /// tracked and nothing is retried.
    pub fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
        now: Instant,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Accepted {
            return Err(SessionError::NotConnected);
        }
        let packet_id = match qos {
            QoS::AtMostOnce => None,
            _ => Some(self.allocate_packet_id()),
        };

        let mut buf = PacketBuf::new();
        packet::encode_publish(&mut buf, topic, payload, qos, retain, packet_id)?;
        self.send(&buf, now)?;
        debug!("published {} bytes on {}", payload.len(), topic);
        Ok(())
    }

    /// Send DISCONNECT and close the transport.
    pub fn disconnect(&mut self, now: Instant) {
        if self.connection.is_none() {
            return;
        }
        let mut buf = PacketBuf::new();
        if packet::encode_disconnect(&mut buf).is_ok() {
            if let Err(e) = self.send(&buf, now) {
                debug!("DISCONNECT not sent: {}", e);
            }
        }
        self.drop_connection();
        self.state = SessionState::Disconnected;
        info!("disconnected from MQTT broker");
    }

    /// Read whatever the transport has, decode complete packets and queue the
    /// resulting events. Also runs the keep-alive and CONNACK timers.
    ///
    /// Stops decoding when `events` is full; the remaining bytes stay buffered
    /// for the next call. A session that ends here changes state at once, and
    /// a status that finds `events` full is queued again on the next call.
    pub fn service(&mut self, now: Instant, events: &mut EventQueue) {
        if let Some(status) = self.pending_status.take() {
            self.notify(status, events);
        }
        if self.connection.is_none() {
            return;
        }
        if !self.fill_rx(now, events) {
            return;
        }

        while !events.is_full() {
            let total = match packet::frame_len(&self.rx) {
                Ok(Some(total)) => total,
                Ok(None) => break,
                Err(e) => {
                    self.protocol_failure(e, events);
                    return;
                }
            };
            if total > MAX_PACKET_SIZE {
                warn!("dropping {} byte packet, larger than receive buffer", total);
                self.discard = total - self.rx.len();
                self.rx.clear();
                break;
            }
            if self.rx.len() < total {
                break;
            }

            let action = match packet::decode(&self.rx[..total]).map(Self::classify) {
                Ok(action) => action,
                Err(e) => {
                    self.protocol_failure(e, events);
                    return;
                }
            };
            self.consume(total);
            self.act(action, now, events);
        }

        self.run_timers(now, events);
    }

    /// Pull available bytes into the receive buffer. Returns `false` if the
    /// transport failed.
    fn fill_rx(&mut self, now: Instant, events: &mut EventQueue) -> bool {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let room = if self.discard > 0 {
                READ_CHUNK
            } else {
                (MAX_PACKET_SIZE - self.rx.len()).min(READ_CHUNK)
            };
            if room == 0 {
                return true;
            }
            let Some(connection) = self.connection.as_mut() else {
                return false;
            };
            let n = match connection.read(&mut chunk[..room]) {
                Ok(0) => return true,
                Ok(n) => n,
                Err(e) => {
                    warn!("MQTT transport read failed: {:?}", e);
                    self.connection_lost(events);
                    return false;
                }
            };
            self.last_rx = now;

            let mut data = &chunk[..n];
            if self.discard > 0 {
                let skipped = self.discard.min(data.len());
                self.discard -= skipped;
                data = &data[skipped..];
            }
            // `room` bounds `data` to the free space left in `rx`.
            let _ = self.rx.extend_from_slice(data);
        }
    }

    fn classify(pkt: Packet<'_>) -> Action {
        match pkt {
            Packet::ConnAck { return_code, .. } => match ConnectReturnCode::from(return_code) {
                ConnectReturnCode::Accepted => Action::Status(ConnectionStatus::Accepted),
                code => Action::Status(ConnectionStatus::Refused(code)),
            },
            Packet::Publish {
                topic,
                payload,
                qos,
                retain,
                packet_id,
                ..
            } => {
                let ack = match (qos, packet_id) {
                    (QoS::AtLeastOnce, Some(id)) => Some((packet::PUBACK, id)),
                    (QoS::ExactlyOnce, Some(id)) => Some((packet::PUBREC, id)),
                    _ => None,
                };
                let message = match (String::try_from(topic), Vec::from_slice(payload)) {
                    (Ok(topic), Ok(body)) => Some(IncomingMessage {
                        topic,
                        payload: body,
                        total_len: payload.len(),
                        qos,
                        retain,
                    }),
                    _ => {
                        warn!("inbound message on {} exceeds buffers, dropped", topic);
                        None
                    }
                };
                Action::Deliver(message, ack)
            }
            Packet::PubRec(id) => Action::Ack(packet::PUBREL, id),
            Packet::PubRel(id) => Action::Ack(packet::PUBCOMP, id),
            Packet::SubAck {
                packet_id,
                return_code,
            } => {
                let result = match QoS::try_from(return_code) {
                    Ok(qos) => SubAckResult::Granted(qos),
                    Err(_) => SubAckResult::Failure,
                };
                Action::SubAck(packet_id, result)
            }
            Packet::PubAck(id) | Packet::PubComp(id) => {
                debug!("publish {} acknowledged", id);
                Action::Nothing
            }
            Packet::PingResp => Action::PingResp,
            Packet::UnsubAck(_) => Action::Nothing,
        }
    }

    fn act(&mut self, action: Action, now: Instant, events: &mut EventQueue) {
        match action {
            Action::Status(status) => {
                events.push(Event::Session(status));
            }
            Action::Deliver(message, ack) => {
                if let Some((kind, id)) = ack {
                    self.send_ack(kind, id, now);
                }
                if let Some(message) = message {
                    events.push(Event::Inbound(message));
                }
            }
            Action::Ack(kind, id) => self.send_ack(kind, id, now),
            Action::SubAck(packet_id, result) => {
                events.push(Event::SubAck { packet_id, result });
            }
            Action::PingResp => self.ping_sent = None,
            Action::Nothing => {}
        }
    }

    fn send_ack(&mut self, kind: u8, packet_id: u16, now: Instant) {
        let mut buf = PacketBuf::new();
        let result = packet::encode_ack(&mut buf, kind, packet_id)
            .map_err(SessionError::from)
            .and_then(|()| self.send(&buf, now));
        if let Err(e) = result {
            warn!("failed to acknowledge packet {}: {}", packet_id, e);
        }
    }

    fn run_timers(&mut self, now: Instant, events: &mut EventQueue) {
        match self.state {
            SessionState::Connecting => {
                if let Some(timeout) = self.connack_timeout {
                    if now.saturating_duration_since(self.connect_started) >= timeout {
                        error!("MQTT connection timed out waiting for CONNACK");
                        self.reject(RejectReason::Timeout);
                        self.notify(ConnectionStatus::Timeout, events);
                    }
                }
            }
            SessionState::Accepted => {
                let keep_alive = self
                    .options
                    .as_ref()
                    .map_or(0, |o| o.keep_alive_seconds);
                if keep_alive == 0 {
                    return;
                }
                let keep_alive = Duration::from_secs(keep_alive.into());
                if let Some(sent) = self.ping_sent {
                    if now.saturating_duration_since(sent) >= keep_alive / 2 {
                        warn!("no PINGRESP {} ms after PINGREQ", (keep_alive / 2).as_millis());
                        self.connection_lost(events);
                    }
                } else if now.saturating_duration_since(self.last_tx) >= keep_alive
                    || now.saturating_duration_since(self.last_rx) >= keep_alive
                {
                    let mut buf = PacketBuf::new();
                    let sent = packet::encode_pingreq(&mut buf)
                        .map_err(SessionError::from)
                        .and_then(|()| self.send(&buf, now));
                    match sent {
                        Ok(()) => {
                            debug!("keep-alive ping sent");
                            self.ping_sent = Some(now);
                        }
                        Err(e) => {
                            warn!("keep-alive ping failed: {}", e);
                            self.connection_lost(events);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn protocol_failure(&mut self, e: Error, events: &mut EventQueue) {
        error!("malformed packet from broker: {}", e);
        self.connection_lost(events);
    }

    /// The transport failed under a pending or live session.
    fn connection_lost(&mut self, events: &mut EventQueue) {
        if self.state == SessionState::Accepted {
            warn!("MQTT session lost");
        }
        self.end_session();
        self.drop_connection();
        self.notify(ConnectionStatus::Disconnected, events);
    }

    fn notify(&mut self, status: ConnectionStatus, events: &mut EventQueue) {
        if !events.push(Event::Session(status)) {
            self.pending_status = Some(status);
        }
    }

    /// Write a whole packet to the transport.
    fn send(&mut self, bytes: &[u8], now: Instant) -> Result<(), SessionError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(SessionError::NotConnected)?;
        let mut written = 0;
        while written < bytes.len() {
            match connection.write(&bytes[written..]) {
                Ok(0) => return Err(SessionError::TransportRejected(Error::WriteError)),
                Ok(n) => written += n,
                Err(e) => {
                    debug!("transport write failed: {:?}", e);
                    return Err(SessionError::TransportRejected(Error::WriteError));
                }
            }
        }
        connection
            .flush()
            .map_err(|_| SessionError::TransportRejected(Error::WriteError))?;
        self.last_tx = now;
        Ok(())
    }

    fn consume(&mut self, n: usize) {
        let len = self.rx.len();
        self.rx.copy_within(n..len, 0);
        self.rx.truncate(len - n);
    }

    fn drop_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                debug!("transport close failed: {:?}", e);
            }
        }
        self.rx.clear();
        self.discard = 0;
    }

    fn allocate_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.checked_add(1).unwrap_or(1);
        id
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if publish and subscribe are currently allowed.
    pub fn is_accepted(&self) -> bool {
        self.state == SessionState::Accepted
    }

    /// Look up the subscription for `topic` on the current session.
    pub fn subscription(&self, topic: &str) -> Option<&Subscription> {
        self.subscriptions.values().find(|s| s.topic.as_str() == topic)
    }

    /// All subscriptions issued on the current session.
    pub fn subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.values()
    }

    /// Options of the last connect, if any.
    pub fn options(&self) -> Option<&ConnectOptions> {
        self.options.as_ref()
    }

    /// Borrow the transport, if open.
    pub fn connection(&self) -> Option<&C> {
        self.connection.as_ref()
    }

    /// Mutably borrow the transport, if open.
    pub fn connection_mut(&mut self) -> Option<&mut C> {
        self.connection.as_mut()
    }
}

impl<C: Connection> core::fmt::Debug for SessionManager<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state)
            .field("options", &self.options)
            .field("subscriptions", &self.subscriptions.len())
            .field("buffered", &self.rx.len())
            .finish()
    }
}
