//! Outward collaborator interface.
//!
//! The session engine hands everything it does not handle itself to a
//! [`SessionHooks`] implementation: unsolicited events, handshake outcomes,
//! and unexpected channel loss. Hooks run on the engine's task and must not
//! block.

use serde_json::Value;

use blade_core::{BladeError, ConnectResult};

use crate::session::Session;

pub trait SessionHooks: Send + Sync + 'static {
    /// Every inbound frame that is neither a correlated reply nor a
    /// keepalive/disconnect notice.
    fn dispatch_event(&self, payload: Value);

    fn on_authorized(&self, _result: &ConnectResult) {}

    fn on_auth_error(&self, _error: &BladeError) {}

    /// The channel went down without `disconnect()`. Reconnection policy
    /// belongs here; the engine itself never reconnects.
    fn on_unexpected_close(&self, _session: &Session) {}
}

/// Logs events and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHooks;

impl SessionHooks for LogHooks {
    fn dispatch_event(&self, payload: Value) {
        tracing::info!(%payload, "event");
    }
}
