//! Inbound frame routing.
//!
//! Correlated replies settle their pending call; keepalive and disconnect
//! notices are answered here; everything else goes out to the hooks.

use serde_json::Value;
use tokio::sync::oneshot;

use blade_core::messages::{blade_disconnect_response, blade_ping_response};
use blade_core::{codec, parse_rpc_response, BladeError, Inbound, Message};

use crate::engine::{Engine, Responder};
use crate::session::Reply;

/// For messages whose outcome nobody waits on.
fn detached() -> Responder {
    oneshot::channel().0
}

impl Engine {
    pub(crate) fn on_message(&mut self, text: String) {
        tracing::debug!(frame = %text, "RECV");
        let inbound = codec::decode(&text);

        if let Some(call) = inbound.id().and_then(|id| self.pending.take(id)) {
            let outcome = match &inbound {
                Inbound::Response(response) => {
                    parse_rpc_response(&call.request, response).map(Reply::Result)
                }
                _ => Err(BladeError::InvalidMessage(format!(
                    "reply to {} is not a response",
                    call.request.method
                ))),
            };
            call.settle(outcome);
            return;
        }

        match inbound {
            Inbound::Ping { id, timestamp } => {
                let pong = blade_ping_response(id, timestamp);
                self.execute(Message::Response(pong), detached());
            }
            Inbound::Disconnect { id } => {
                tracing::warn!("server announced disconnect, holding further calls");
                self.send_now(
                    Message::Response(blade_disconnect_response(id)),
                    detached(),
                );
                self.idle = true;
            }
            Inbound::Response(response) => {
                tracing::warn!(id = %response.id, "reply matches no pending call");
                let payload = serde_json::to_value(&response).unwrap_or_default();
                self.hooks.dispatch_event(payload);
            }
            Inbound::Malformed(raw) => {
                tracing::warn!("malformed frame");
                self.hooks.dispatch_event(Value::String(raw));
            }
            Inbound::Event(payload) => self.hooks.dispatch_event(payload),
        }
    }
}
