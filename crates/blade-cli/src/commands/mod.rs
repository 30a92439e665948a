//! Subcommands and the session setup they share.

pub mod call;
pub mod listen;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::info;

use blade_client::{AuthStatus, Session, SessionHooks, SessionOptions, SessionStatus};

/// Prints every server event to stdout as one JSON line.
pub struct PrintHooks;

impl SessionHooks for PrintHooks {
    fn dispatch_event(&self, payload: Value) {
        println!("{payload}");
    }

    fn on_unexpected_close(&self, _session: &Session) {
        eprintln!("blade: connection lost");
    }
}

/// Spawn a session, connect, and wait for the handshake to settle.
pub async fn open(options: SessionOptions) -> Result<(Session, SessionStatus)> {
    let deadline = options.execute_timeout + Duration::from_secs(5);
    let host = options.host();
    let session = Session::builder(options).hooks(PrintHooks).spawn();
    session.connect()?;

    let status = tokio::time::timeout(
        deadline,
        session.wait_for(|s| {
            matches!(s.auth, AuthStatus::Authorized | AuthStatus::Unauthorized) || s.channel.closed()
        }),
    )
    .await
    .with_context(|| format!("timed out connecting to {host}"))??;

    match status.auth {
        AuthStatus::Authorized => {
            info!(host = %host, protocol = %status.protocol, "session ready");
            Ok((session, status))
        }
        AuthStatus::Unauthorized => bail!("authentication with {host} failed"),
        _ => bail!("connection to {host} closed before authentication"),
    }
}
