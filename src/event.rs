//! Events delivered to the control loop.
//!
//! The radio driver and the broker session never call back into the firmware.
//! Whatever they observe while being serviced is queued here as an [`Event`]
//! and processed afterwards at the control loop's single dispatch point, so a
//! handler can never run in the middle of a `publish` or `subscribe`.

use heapless::Deque;
use log::warn;

use crate::network::RadioEvent;
use crate::network::application::mqtt::{ConnectionStatus, IncomingMessage, SubAckResult};

/// Events one tick can queue before later ones are deferred.
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Everything the control loop reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The wireless link changed.
    Link(RadioEvent),
    /// The broker answered the handshake, or the session ended.
    Session(ConnectionStatus),
    /// A message arrived on a subscribed topic.
    Inbound(IncomingMessage),
    /// The broker answered a subscribe request.
    SubAck {
        /// Identifier of the SUBSCRIBE being answered.
        packet_id: u16,
        /// Outcome.
        result: SubAckResult,
    },
}

/// Fixed-capacity FIFO of pending events.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Deque<Event, EVENT_QUEUE_DEPTH>,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            events: Deque::new(),
        }
    }

    /// Queue `event`. Returns `false` (and logs) if the queue is full.
    pub fn push(&mut self, event: Event) -> bool {
        match self.events.push_back(event) {
            Ok(()) => true,
            Err(event) => {
                warn!("event queue full, dropping {:?}", event);
                false
            }
        }
    }

    /// Take the oldest event.
    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Check if another event fits.
    pub fn is_full(&self) -> bool {
        self.events.is_full()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }
}
