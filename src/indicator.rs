//! Status indicator.
//!
//! The firmware exposes exactly one bit of status to the outside world: is the
//! device online. On most boards that bit is an LED on a GPIO pin.

use embedded_hal::digital::OutputPin;
use log::warn;

/// Receives "link up" / "link down" signals.
///
/// Implementations only have to act on the value; de-duplication of repeated
/// signals is done by the [`LinkManager`](crate::network::link::LinkManager).
pub trait StatusIndicator {
    /// Show the link as up (`true`) or down (`false`).
    fn set_link_up(&mut self, up: bool);
}

impl<S: StatusIndicator + ?Sized> StatusIndicator for &mut S {
    fn set_link_up(&mut self, up: bool) {
        (**self).set_link_up(up)
    }
}

/// An LED driven by any `embedded-hal` output pin.
///
/// Active-high by default; pass `active_low = true` for LEDs wired to VCC.
#[derive(Debug)]
pub struct LedIndicator<P> {
    pin: P,
    active_low: bool,
}

impl<P: OutputPin> LedIndicator<P> {
    /// Wrap an active-high LED pin.
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            active_low: false,
        }
    }

    /// Wrap an LED pin, choosing its polarity.
    pub fn with_polarity(pin: P, active_low: bool) -> Self {
        Self { pin, active_low }
    }

    /// Give the pin back.
    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> StatusIndicator for LedIndicator<P> {
    fn set_link_up(&mut self, up: bool) {
        // A failed pin write only loses a status light.
        let result = if up != self.active_low {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = result {
            warn!("status LED write failed: {:?}", e);
        }
    }
}

/// An indicator that shows nothing, for boards without a status LED.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    fn set_link_up(&mut self, _up: bool) {}
}
