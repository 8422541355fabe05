//! The firmware's control loop.
//!
//! [`ControlLoop`] wires the link manager, the broker session, the heartbeat
//! timer and the inbound handlers together. A firmware `main` boils down to:
//!
//! ```rust,ignore
//! let mut firmware = ControlLoop::new(config, radio, led, tcp, clock, delay)?;
//! firmware.bring_up()?;
//! firmware.run()
//! ```
//!
//! Each [`tick`](ControlLoop::tick) services the stack and the session, which
//! only queue [`Event`]s; the queued events are then dispatched one by one, and
//! only after that is the heartbeat considered. Handlers therefore never run
//! while a publish or subscribe is in progress.

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::config::{Config, ConfigError};
use crate::event::{Event, EventQueue};
use crate::indicator::StatusIndicator;
use crate::network::application::mqtt::router::NoHandler;
use crate::network::application::mqtt::{
    HandlerRegistry, MessageHandler, SessionManager, SessionState,
};
use crate::network::error::{LinkError, SessionError};
use crate::network::link::LinkManager;
use crate::network::{Connect, NetworkStack};
use crate::scheduler::HeartbeatTimer;
use crate::time::{Clock, Instant};

/// The assembled firmware.
pub struct ControlLoop<S, I, N, K, D, H = NoHandler>
where
    N: Connect,
{
    config: Config,
    link: LinkManager<S, I>,
    connector: N,
    session: SessionManager<N::Connection>,
    scheduler: HeartbeatTimer,
    handlers: HandlerRegistry<H>,
    events: EventQueue,
    clock: K,
    delay: D,
    heartbeats: u32,
}

impl<S, I, N, K, D, H> ControlLoop<S, I, N, K, D, H>
where
    S: NetworkStack,
    I: StatusIndicator,
    N: Connect,
    K: Clock,
    D: DelayNs,
    H: MessageHandler,
{
    /// Assemble the firmware from a validated configuration and its hardware.
    pub fn new(
        config: Config,
        stack: S,
        indicator: I,
        connector: N,
        clock: K,
        delay: D,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut session =
            SessionManager::with_topic(config.subscribe_topic.clone(), config.subscribe_qos);
        session.set_clean_session(config.clean_session);
        session.set_connack_timeout(config.connack_timeout());
        let scheduler = HeartbeatTimer::new(config.heartbeat_period(), clock.now());

        Ok(Self {
            link: LinkManager::new(stack, indicator),
            connector,
            session,
            scheduler,
            handlers: HandlerRegistry::new(),
            events: EventQueue::new(),
            clock,
            delay,
            heartbeats: 0,
            config,
        })
    }

    /// Blink, associate, then start the broker session.
    ///
    /// # Errors
    ///
    /// Association failures are returned and must be treated as fatal. A
    /// session that fails to start is only logged: the loop still runs and
    /// the session stays unusable until [`reconnect`](Self::reconnect).
    pub fn bring_up(&mut self) -> Result<(), LinkError> {
        self.link.blink(&mut self.delay);
        self.link.begin_association(
            &self.config.ssid,
            &self.config.passphrase,
            self.config.auth_mode,
            self.config.association_timeout(),
            &self.clock,
            &mut self.delay,
        )?;
        if let Some(addr) = self.link.assigned_address() {
            info!("IP address: {}", addr);
        }

        let now = self.clock.now();
        self.scheduler = HeartbeatTimer::new(self.config.heartbeat_period(), now);
        if let Err(e) = self.session.connect(
            &mut self.connector,
            &self.config.broker_address,
            self.config.broker_port,
            &self.config.client_id,
            self.config.keep_alive_seconds,
            now,
        ) {
            error!("MQTT connect failed: {}", e);
        }
        Ok(())
    }

    /// One loop iteration: service, dispatch, heartbeat, sleep.
    pub fn tick(&mut self) {
        self.link.poll(&mut self.events);
        let now = self.clock.now();
        self.session.service(now, &mut self.events);
        while let Some(event) = self.events.pop() {
            self.dispatch(event, now);
        }

        self.heartbeat(now);
        self.delay.delay_ms(self.config.tick_interval_ms);
    }

    /// Tick forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.tick();
        }
    }

    fn dispatch(&mut self, event: Event, now: Instant) {
        match event {
            Event::Link(radio) => {
                if self.link.on_event(radio) == Some(false) {
                    self.session.on_link_lost();
                }
            }
            Event::Session(status) => match self.session.on_status_change(status, now) {
                SessionState::Accepted => self.link.indicate(true),
                SessionState::Rejected(_) | SessionState::Disconnected => {
                    self.link.indicate(false)
                }
                _ => {}
            },
            Event::SubAck { packet_id, result } => self.session.on_suback(packet_id, result),
            Event::Inbound(message) => {
                self.session.on_inbound_message(&message, &mut self.handlers);
            }
        }
    }

    fn heartbeat(&mut self, now: Instant) {
        if !self.scheduler.is_due(now) {
            return;
        }
        if !self.session.is_accepted() {
            debug!("heartbeat skipped, session {:?}", self.session.state());
            return;
        }
        match self.session.publish(
            &self.config.publish_topic,
            self.config.heartbeat_payload.as_bytes(),
            self.config.publish_qos,
            self.config.publish_retain,
            now,
        ) {
            Ok(()) => {
                self.heartbeats = self.heartbeats.wrapping_add(1);
                info!("heartbeat published on {}", self.config.publish_topic);
            }
            Err(e) => warn!("heartbeat publish failed: {}", e),
        }
    }

    /// Restart the broker session with the options of the first connect.
    pub fn reconnect(&mut self) -> Result<(), SessionError> {
        let now = self.clock.now();
        self.session.reconnect(&mut self.connector, now)
    }

    /// Send DISCONNECT and close the broker session.
    pub fn disconnect(&mut self) {
        let now = self.clock.now();
        self.session.disconnect(now);
        self.link.indicate(false);
    }

    /// Register an inbound handler for a topic filter.
    ///
    /// Returns the handler back if the registry is full or the filter too long.
    pub fn register_handler(&mut self, filter: &str, handler: H) -> Result<(), H> {
        self.handlers.register(filter, handler)
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The link manager.
    pub fn link(&self) -> &LinkManager<S, I> {
        &self.link
    }

    /// The broker session.
    pub fn session(&self) -> &SessionManager<N::Connection> {
        &self.session
    }

    /// The broker session, mutably.
    pub fn session_mut(&mut self) -> &mut SessionManager<N::Connection> {
        &mut self.session
    }

    /// The connector used to open broker transports.
    pub fn connector(&self) -> &N {
        &self.connector
    }

    /// Heartbeats successfully handed to the transport.
    pub fn heartbeats_sent(&self) -> u32 {
        self.heartbeats
    }
}

impl<S, I, N, K, D, H> core::fmt::Debug for ControlLoop<S, I, N, K, D, H>
where
    N: Connect,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("session", &self.session)
            .field("scheduler", &self.scheduler)
            .field("heartbeats", &self.heartbeats)
            .finish()
    }
}
