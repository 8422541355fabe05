//! Wi-Fi link manager.
//!
//! Owns the [`NetworkStack`] and tracks whether the station is associated.
//! The link state only changes in response to [`RadioEvent`]s, which the
//! driver produces while it is being serviced.

use core::net::Ipv4Addr;
use core::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use super::error::LinkError;
use super::{AuthMode, NetworkStack, RadioEvent};
use crate::event::{Event, EventQueue};
use crate::indicator::StatusIndicator;
use crate::time::Clock;

/// How long the status LED stays on, then off, in the pre-association blink.
pub const BLINK_HALF_PERIOD_MS: u32 = 500;

/// Pause between stack services while waiting for association.
pub const ASSOCIATION_POLL_MS: u32 = 10;

/// State of the wireless link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// Not associated.
    #[default]
    Down,
    /// Association in progress.
    Connecting,
    /// Associated with an address assigned.
    Up,
}

/// Manages the wireless link and the status indicator that mirrors it.
#[derive(Debug)]
pub struct LinkManager<S, I> {
    stack: S,
    indicator: I,
    state: LinkState,
    address: Option<Ipv4Addr>,
    auth_rejected: bool,
    // Last level pushed to the indicator; `None` until the first signal.
    indicated: Option<bool>,
}

impl<S: NetworkStack, I: StatusIndicator> LinkManager<S, I> {
    /// Create a manager in the `Down` state.
    pub fn new(stack: S, indicator: I) -> Self {
        Self {
            stack,
            indicator,
            state: LinkState::Down,
            address: None,
            auth_rejected: false,
            indicated: None,
        }
    }

    /// Associate with the access point, blocking until done.
    ///
    /// The stack keeps being serviced while waiting, so DHCP and the driver's
    /// own timers make progress. Nothing else in the firmware can run before a
    /// link exists, so blocking here is fine.
    ///
    /// # Errors
    ///
    /// * [`LinkError::InitFailed`] - the driver refused to start the join
    /// * [`LinkError::AuthRejected`] - the access point refused the passphrase
    /// * [`LinkError::Timeout`] - no association within `timeout`
    pub fn begin_association<C, D>(
        &mut self,
        ssid: &str,
        passphrase: &str,
        auth: AuthMode,
        timeout: Duration,
        clock: &C,
        delay: &mut D,
    ) -> Result<(), LinkError>
    where
        C: Clock,
        D: DelayNs,
    {
        info!("connecting to Wi-Fi network '{}'", ssid);
        self.auth_rejected = false;
        self.stack
            .begin_join(ssid, passphrase, auth, timeout)
            .map_err(|e| {
                error!("radio failed to start association: {:?}", e);
                LinkError::InitFailed
            })?;
        self.state = LinkState::Connecting;

        let deadline = clock.now() + timeout;
        loop {
            self.service();
            match self.state {
                LinkState::Up => {
                    if let Some(addr) = self.address {
                        info!("Wi-Fi connected, address {}", addr);
                    }
                    return Ok(());
                }
                _ if self.auth_rejected => {
                    error!("Wi-Fi association failed: credentials rejected");
                    return Err(LinkError::AuthRejected);
                }
                _ => {}
            }
            if clock.now() >= deadline {
                error!("Wi-Fi association timed out after {} ms", timeout.as_millis());
                self.state = LinkState::Down;
                return Err(LinkError::Timeout);
            }
            delay.delay_ms(ASSOCIATION_POLL_MS);
        }
    }

    /// Drive the stack once and apply every link event it produced.
    ///
    /// Returns `Some(up)` if the link crossed the up/down boundary.
    pub fn service(&mut self) -> Option<bool> {
        self.stack.service_once();
        let mut edge = None;
        while let Some(event) = self.stack.next_event() {
            if let Some(up) = self.on_event(event) {
                edge = Some(up);
            }
        }
        edge
    }

    /// Drive the stack once and queue its link events without applying them.
    ///
    /// Used by the control loop, which applies them through
    /// [`on_event`](Self::on_event) at its dispatch point.
    pub fn poll(&mut self, events: &mut EventQueue) {
        self.stack.service_once();
        while !events.is_full() {
            let Some(event) = self.stack.next_event() else {
                break;
            };
            events.push(Event::Link(event));
        }
    }

    /// Apply one radio event. Returns `Some(up)` on an up/down edge.
    ///
    /// Repeated `Up` events while already up are absorbed here, so the
    /// indicator sees one rising edge per association.
    pub fn on_event(&mut self, event: RadioEvent) -> Option<bool> {
        let was_up = self.state == LinkState::Up;
        match event {
            RadioEvent::Associating => {
                if !was_up {
                    self.state = LinkState::Connecting;
                }
            }
            RadioEvent::Up(addr) => {
                self.address = Some(addr);
                self.state = LinkState::Up;
            }
            RadioEvent::Down => {
                self.address = None;
                self.state = LinkState::Down;
            }
            RadioEvent::AuthRejected => {
                warn!("access point rejected the credentials");
                self.auth_rejected = true;
                self.address = None;
                self.state = LinkState::Down;
            }
        }

        let is_up = self.state == LinkState::Up;
        if is_up == was_up {
            return None;
        }
        if is_up {
            debug!("link up");
        } else {
            warn!("link down");
        }
        self.indicate(is_up);
        Some(is_up)
    }

    /// Push a level to the status indicator, skipping repeats.
    pub fn indicate(&mut self, up: bool) {
        if self.indicated != Some(up) {
            self.indicated = Some(up);
            self.indicator.set_link_up(up);
        }
    }

    /// Blink the indicator once: on, wait, off, wait.
    pub fn blink<D: DelayNs>(&mut self, delay: &mut D) {
        self.indicator.set_link_up(true);
        delay.delay_ms(BLINK_HALF_PERIOD_MS);
        self.indicator.set_link_up(false);
        delay.delay_ms(BLINK_HALF_PERIOD_MS);
        self.indicated = Some(false);
    }

    /// Non-blocking snapshot of the link state.
    pub fn current_state(&self) -> LinkState {
        self.state
    }

    /// The assigned address, populated only while `Up`.
    pub fn assigned_address(&self) -> Option<Ipv4Addr> {
        match self.state {
            LinkState::Up => self.address.or_else(|| self.stack.ipv4_address()),
            _ => None,
        }
    }

    /// Borrow the underlying stack.
    pub fn stack(&self) -> &S {
        &self.stack
    }

    /// Mutably borrow the underlying stack.
    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    /// Borrow the status indicator.
    pub fn indicator(&self) -> &I {
        &self.indicator
    }
}
