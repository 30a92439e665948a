//! blade-client: client-side session engine for the Blade signaling protocol.
//!
//! A [`Session`] owns one duplex channel to a relay host. It authenticates
//! with `blade.connect` every time the channel opens, correlates replies to
//! requests by id, answers server keepalives, holds calls back while the
//! server has asked it to go idle, and forwards everything else to the
//! application's [`SessionHooks`].
//!
//! # Quick Start
//!
//! ```no_run
//! use blade_client::{Session, SessionOptions};
//! use blade_core::messages::blade_execute;
//!
//! # async fn example() -> blade_core::BladeResult<()> {
//! let session = Session::new(SessionOptions {
//!     project: Some("my-project".into()),
//!     token: "my-token".into(),
//!     ..Default::default()
//! });
//! session.connect()?;
//!
//! let status = session.wait_for(|s| s.ready()).await?;
//! let reply = session
//!     .execute(blade_execute(&status.protocol, "calling.dial", serde_json::json!({})))
//!     .await?;
//! println!("{:?}", reply.into_value());
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod engine;
mod handshake;
mod pending;
mod queue;

pub mod hooks;
pub mod session;
pub mod state;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export primary public types.
pub use hooks::{LogHooks, SessionHooks};
pub use session::{Reply, Session, SessionBuilder, SessionOptions, DEFAULT_EXECUTE_TIMEOUT};
pub use state::{AuthStatus, ChannelState, SessionStatus};
pub use transport::{
    check_websocket_host, Channel, ChannelEvent, ChannelEvents, ChannelFactory, WebSocketFactory,
    DEFAULT_HOST,
};

// Re-export blade-core error types for convenience.
pub use blade_core::{BladeError, BladeResult};
