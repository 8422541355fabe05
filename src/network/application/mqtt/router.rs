//! Inbound message routing.
//!
//! Maps topic filters to handlers. The control loop logs every inbound message
//! and then hands it to each handler whose filter matches.

use heapless::{String, Vec};

use super::packet::MAX_TOPIC_LEN;
use super::session::IncomingMessage;

/// Maximum number of registered handlers.
pub const MAX_HANDLERS: usize = 8;

/// Something that consumes inbound messages.
///
/// Handlers only observe: they cannot publish or fail. Anything they want to
/// send goes through their own state and is picked up on a later tick.
pub trait MessageHandler {
    /// Handle one message.
    fn on_message(&mut self, message: &IncomingMessage);
}

impl<F: FnMut(&IncomingMessage)> MessageHandler for F {
    fn on_message(&mut self, message: &IncomingMessage) {
        self(message)
    }
}

/// Does `topic` match the subscription `filter`?
///
/// Implements the MQTT wildcard rules: `+` matches exactly one level, a
/// trailing `#` matches the parent level and everything below it. Topics
/// starting with `$` are not matched by filters starting with a wildcard.
///
/// # Examples
///
/// ```rust
/// use picolink::network::application::mqtt::topic_matches;
///
/// assert!(topic_matches("pico/+/cmd", "pico/led/cmd"));
/// assert!(topic_matches("pico/#", "pico"));
/// assert!(!topic_matches("pico/+", "pico/led/cmd"));
/// ```
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Topic filter → handler registry.
pub struct HandlerRegistry<H> {
    handlers: Vec<(String<MAX_TOPIC_LEN>, H), MAX_HANDLERS>,
}

impl<H: MessageHandler> HandlerRegistry<H> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register `handler` for `filter`.
    ///
    /// Returns the handler back if the registry is full or the filter too long.
    pub fn register(&mut self, filter: &str, handler: H) -> Result<(), H> {
        let Ok(key) = String::try_from(filter) else {
            return Err(handler);
        };
        self.handlers.push((key, handler)).map_err(|(_, h)| h)
    }

    /// Deliver `message` to every matching handler, returning how many ran.
    pub fn dispatch(&mut self, message: &IncomingMessage) -> usize {
        let mut delivered = 0;
        for (filter, handler) in self.handlers.iter_mut() {
            if topic_matches(filter, &message.topic) {
                handler.on_message(message);
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<H: MessageHandler> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> core::fmt::Debug for HandlerRegistry<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|(filter, _)| filter.as_str()))
            .finish()
    }
}

/// A handler that ignores everything; the default when no routing is needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHandler;

impl MessageHandler for NoHandler {
    fn on_message(&mut self, _message: &IncomingMessage) {}
}
