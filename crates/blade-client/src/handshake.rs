//! Authentication handshake (`blade.connect`).
//!
//! Runs once per channel-open. The negotiated protocol is echoed back only
//! while it is still bound to the current authorization signature; the
//! queue is drained once the handshake settles, whatever its outcome.
//! Outcomes are tagged with the channel generation they ran on, so a
//! handshake of a channel that has since gone away never touches the
//! session's auth state.

use tokio::sync::oneshot;

use blade_core::messages::{blade_connect, ConnectParams, Credentials};
use blade_core::{BladeError, BladeResult, ConnectResult, JsonRpcRequest, Message};

use crate::engine::{Command, Engine, HandshakeDone};
use crate::session::{Reply, SessionOptions};
use crate::state::AuthStatus;

/// A protocol is bound to a session when its trailing `_` component is the signature.
pub(crate) fn relay_protocol_is_valid(protocol: &str, signature: Option<&str>) -> bool {
    match signature {
        Some(sig) if !sig.is_empty() && !protocol.is_empty() => {
            protocol.rsplit('_').next() == Some(sig)
        }
        _ => false,
    }
}

pub(crate) fn connect_request(
    options: &SessionOptions,
    protocol: Option<String>,
) -> BladeResult<JsonRpcRequest> {
    let credentials = Credentials {
        project: options.project.clone(),
        token: options.token.clone(),
    };
    blade_connect(ConnectParams::new(credentials, protocol))
}

impl Engine {
    /// Explicit handshake on the current channel. Refused unless the channel is usable.
    pub(crate) fn reauthenticate(&mut self, done: HandshakeDone) {
        if !self.is_connected() || self.idle {
            let _ = done.send(Err(BladeError::Transport(
                "channel is not ready for a handshake".into(),
            )));
            return;
        }
        self.authenticate(Some(done), false);
    }

    pub(crate) fn authenticate(&mut self, done: Option<HandshakeDone>, drain: bool) {
        let signature = self.authorization.as_ref().map(|a| a.signature.as_str());
        let protocol = if relay_protocol_is_valid(&self.relay_protocol, signature) {
            Some(self.relay_protocol.clone())
        } else {
            if !self.relay_protocol.is_empty() {
                tracing::debug!(
                    protocol = %self.relay_protocol,
                    "protocol no longer bound to the authorization, negotiating a new one"
                );
                self.relay_protocol.clear();
            }
            None
        };

        let request = match connect_request(&self.options, protocol) {
            Ok(request) => request,
            Err(e) => {
                self.on_handshake_settled(self.generation, Err(e), done, drain);
                return;
            }
        };

        let generation = self.generation;
        self.handshake = Some(request.id.clone());
        self.auth_status = AuthStatus::Authorizing;
        let (tx, rx) = oneshot::channel();
        self.execute(Message::Request(request), tx);

        let commands = self.commands.clone();
        tokio::spawn(async move {
            let outcome = rx.await.unwrap_or(Err(BladeError::SessionClosed));
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::HandshakeSettled {
                    generation,
                    outcome,
                    done,
                    drain,
                });
            }
        });
    }

    pub(crate) fn on_handshake_settled(
        &mut self,
        generation: u64,
        outcome: BladeResult<Reply>,
        done: Option<HandshakeDone>,
        drain: bool,
    ) {
        let result = outcome.and_then(|reply| match reply {
            Reply::Result(value) => serde_json::from_value::<ConnectResult>(value)
                .map_err(|e| BladeError::AuthFailed(format!("unexpected connect result: {e}"))),
            Reply::TimedOut => Err(BladeError::Timeout),
            Reply::Sent => Err(BladeError::InvalidMessage(
                "connect request was sent without awaiting a reply".into(),
            )),
        });

        if generation != self.generation || !self.channel_state.connected() {
            tracing::debug!(generation, "handshake of a discarded channel settled, ignoring");
            if let Some(done) = done {
                let _ = done.send(result);
            }
            return;
        }
        self.handshake = None;

        match result {
            Ok(result) => {
                tracing::info!(
                    sessionid = %result.sessionid,
                    restored = result.session_restored,
                    "authenticated"
                );
                self.authorization = Some(result.authorization.clone());
                if let Some(negotiated) = &result.result {
                    self.relay_protocol = negotiated.protocol.clone();
                    self.ice_servers = negotiated.ice_servers.clone();
                }
                self.auth_status = AuthStatus::Authorized;
                self.hooks.on_authorized(&result);
                if let Some(done) = done {
                    let _ = done.send(Ok(result));
                }
            }
            Err(error) => {
                tracing::error!(%error, "authentication failed");
                self.auth_status = AuthStatus::Unauthorized;
                self.hooks.on_auth_error(&error);
                if let Some(done) = done {
                    let _ = done.send(Err(error));
                }
            }
        }

        if drain {
            self.drain_queue();
        }
    }

    /// Fail the handshake in flight on a channel that is going away.
    pub(crate) fn abandon_handshake(&mut self) {
        if let Some(call) = self.handshake.take().and_then(|id| self.pending.take(&id)) {
            tracing::debug!(id = %call.request.id, "channel gone before handshake reply");
            call.settle(Err(BladeError::SessionClosed));
        }
        if self.auth_status == AuthStatus::Authorizing {
            self.auth_status = AuthStatus::Unknown;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_bound_to_signature_is_valid() {
        assert!(relay_protocol_is_valid("signalwire_abc123", Some("abc123")));
    }

    #[test]
    fn protocol_with_other_suffix_is_invalid() {
        assert!(!relay_protocol_is_valid("signalwire_abc123", Some("zzz")));
    }

    #[test]
    fn nothing_to_resume_without_protocol_or_signature() {
        assert!(!relay_protocol_is_valid("", Some("abc")));
        assert!(!relay_protocol_is_valid("signalwire_abc", None));
        assert!(!relay_protocol_is_valid("signalwire_", Some("")));
    }

    #[test]
    fn connect_request_carries_credentials() {
        let options = SessionOptions {
            project: Some("p".into()),
            token: "t".into(),
            ..Default::default()
        };
        let request = connect_request(&options, None).unwrap();
        let params = request.params.unwrap();
        assert_eq!(request.method, "blade.connect");
        assert_eq!(params["authentication"]["project"], "p");
        assert_eq!(params["authentication"]["token"], "t");
        assert!(params["params"].get("protocol").is_none());
    }
}
