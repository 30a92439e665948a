//! Transport channel abstraction for Blade.
//!
//! A channel is one duplex, message-oriented connection to a single host.
//! The session creates it through a [`ChannelFactory`] and hands it a
//! [`ChannelEvents`] sink at creation time; the channel reports its four
//! lifecycle callbacks (opened, closed, errored, message) through that sink.

pub mod websocket;

pub use websocket::WebSocketFactory;

use tokio::sync::mpsc;

use blade_core::BladeResult;

use crate::engine::Command;

/// Host used when the application does not supply one.
pub const DEFAULT_HOST: &str = "wss://relay.signalwire.com";

/// A lifecycle callback raised by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    Closed { code: Option<u16>, reason: String },
    Errored(String),
    Message(String),
}

/// Sink for channel callbacks, bound to one channel instance.
///
/// Events carry the generation of the channel they were created for, so
/// callbacks from a discarded channel never touch a newer one.
#[derive(Clone)]
pub struct ChannelEvents {
    generation: u64,
    sink: mpsc::WeakUnboundedSender<Command>,
}

impl ChannelEvents {
    pub(crate) fn new(generation: u64, sink: mpsc::WeakUnboundedSender<Command>) -> Self {
        Self { generation, sink }
    }

    pub fn opened(&self) {
        self.emit(ChannelEvent::Opened);
    }

    pub fn closed(&self, code: Option<u16>, reason: impl Into<String>) {
        self.emit(ChannelEvent::Closed {
            code,
            reason: reason.into(),
        });
    }

    pub fn errored(&self, error: impl Into<String>) {
        self.emit(ChannelEvent::Errored(error.into()));
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(ChannelEvent::Message(text.into()));
    }

    fn emit(&self, event: ChannelEvent) {
        // The session may already be gone; nothing left to notify then.
        if let Some(sink) = self.sink.upgrade() {
            let _ = sink.send(Command::Channel {
                generation: self.generation,
                event,
            });
        }
    }
}

/// An open (or opening) duplex channel.
pub trait Channel: Send {
    /// Queue a text frame for delivery.
    fn send(&mut self, text: String) -> BladeResult<()>;

    /// Start closing. A `Closed` event follows once the channel is down.
    fn close(&mut self);
}

/// Socket-constructor-like factory supplied by the host environment.
pub trait ChannelFactory: Send + Sync + 'static {
    /// Create exactly one channel to `host`, wiring its callbacks to `events`.
    fn create(&self, host: &str, events: ChannelEvents) -> BladeResult<Box<dyn Channel>>;
}

/// Prefix `wss://` unless the host already names a WebSocket scheme.
pub fn check_websocket_host(host: &str) -> String {
    let lower = host.to_lowercase();
    if lower.starts_with("ws://") || lower.starts_with("wss://") {
        host.to_string()
    } else {
        format!("wss://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_wss() {
        assert_eq!(check_websocket_host("relay.example.com"), "wss://relay.example.com");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        assert_eq!(check_websocket_host("ws://localhost:8080"), "ws://localhost:8080");
        assert_eq!(check_websocket_host("WSS://example.com"), "WSS://example.com");
    }

    #[test]
    fn events_carry_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = ChannelEvents::new(7, tx.downgrade());
        events.message("hi");
        match rx.try_recv() {
            Ok(Command::Channel { generation, event }) => {
                assert_eq!(generation, 7);
                assert_eq!(event, ChannelEvent::Message("hi".into()));
            }
            _ => panic!("expected a channel event"),
        }
    }

    #[test]
    fn events_after_session_drop_are_discarded() {
        let (tx, rx) = mpsc::unbounded_channel::<Command>();
        let events = ChannelEvents::new(1, tx.downgrade());
        drop(tx);
        drop(rx);
        events.opened();
    }
}
