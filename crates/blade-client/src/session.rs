//! Public session facade.
//!
//! A [`Session`] is a cheap, cloneable handle onto one engine task. Every
//! method enqueues a command and returns; the engine stops once the last
//! handle is dropped.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::Instrument;

use blade_core::{BladeError, BladeResult, ConnectResult, Message};

use crate::engine::{Command, Engine};
use crate::hooks::{LogHooks, SessionHooks};
use crate::state::SessionStatus;
use crate::transport::{check_websocket_host, ChannelFactory, WebSocketFactory, DEFAULT_HOST};

/// Per-request timeout when none is configured.
pub const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub project: Option<String>,
    pub token: String,
    /// Relay host; `wss://` is added when no WebSocket scheme is given.
    pub host: Option<String>,
    /// Open the channel as soon as the session is spawned.
    pub auto_connect: bool,
    pub execute_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            project: None,
            token: String::new(),
            host: None,
            auto_connect: false,
            execute_timeout: DEFAULT_EXECUTE_TIMEOUT,
        }
    }
}

impl SessionOptions {
    /// The URL the channel will be opened against.
    pub fn host(&self) -> String {
        match self.host.as_deref() {
            Some(host) if !host.is_empty() => check_websocket_host(host),
            _ => DEFAULT_HOST.to_string(),
        }
    }
}

/// Outcome of a successful `execute()`.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The (unwrapped) result of a correlated reply.
    Result(Value),
    /// The message expects no reply and went out on the wire.
    Sent,
    /// No reply arrived within the request timeout.
    TimedOut,
}

impl Reply {
    /// The result payload, if the call produced one.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Result(value) => Some(value),
            Self::Sent | Self::TimedOut => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

/// Configures and spawns a [`Session`].
pub struct SessionBuilder {
    options: SessionOptions,
    factory: Arc<dyn ChannelFactory>,
    hooks: Arc<dyn SessionHooks>,
    span: Option<tracing::Span>,
}

impl SessionBuilder {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            factory: Arc::new(WebSocketFactory),
            hooks: Arc::new(LogHooks),
            span: None,
        }
    }

    /// Replace the channel factory (WebSocket by default).
    pub fn factory(mut self, factory: impl ChannelFactory) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    pub fn hooks(mut self, hooks: impl SessionHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Run the engine inside `span` instead of a fresh `session` span.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Start the engine task. Must be called from within a Tokio runtime.
    pub fn spawn(self) -> Session {
        let id: Arc<str> = uuid::Uuid::new_v4().to_string().into();
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());

        let span = self
            .span
            .unwrap_or_else(|| tracing::info_span!("session", id = %id));
        let auto_connect = self.options.auto_connect;

        let engine = Engine::new(
            id.clone(),
            self.options,
            self.factory,
            self.hooks,
            tx.downgrade(),
            status_tx,
        );
        tokio::spawn(engine.run(rx).instrument(span));

        let session = Session::from_parts(id, tx, status_rx);
        if auto_connect {
            let _ = session.connect();
        }
        session
    }
}

/// Handle to a running session.
#[derive(Clone)]
pub struct Session {
    id: Arc<str>,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("status", &*self.status.borrow())
            .finish()
    }
}

impl Session {
    /// Spawn a session over WebSocket with logging hooks.
    pub fn new(options: SessionOptions) -> Self {
        SessionBuilder::new(options).spawn()
    }

    pub fn builder(options: SessionOptions) -> SessionBuilder {
        SessionBuilder::new(options)
    }

    pub(crate) fn from_parts(
        id: Arc<str>,
        commands: mpsc::UnboundedSender<Command>,
        status: watch::Receiver<SessionStatus>,
    ) -> Self {
        Self {
            id,
            commands,
            status,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, command: Command) -> BladeResult<()> {
        self.commands
            .send(command)
            .map_err(|_| BladeError::SessionClosed)
    }

    /// Open the channel. A no-op (with a warning) when one already exists.
    pub fn connect(&self) -> BladeResult<()> {
        self.send(Command::Connect)
    }

    /// Close the channel. A no-op (with a warning) when there is none.
    pub fn disconnect(&self) -> BladeResult<()> {
        self.send(Command::Disconnect)
    }

    /// Send a message, queueing it while the session is idle or disconnected.
    ///
    /// Requests carrying `params` resolve with the server's result. A request
    /// that sees no reply within the configured timeout resolves with
    /// [`Reply::TimedOut`] rather than an error.
    pub async fn execute(&self, message: impl Into<Message>) -> BladeResult<Reply> {
        let message = message.into();
        let id = message.id().to_string();
        let (tx, rx) = oneshot::channel();
        self.send(Command::Execute { message, reply: tx })?;

        match rx.await {
            Ok(Err(BladeError::Timeout)) => {
                tracing::error!(session = %self.id, %id, "request timeout");
                Ok(Reply::TimedOut)
            }
            Ok(outcome) => outcome,
            Err(_) => Err(BladeError::SessionClosed),
        }
    }

    /// Run a `blade.connect` handshake over the current channel.
    ///
    /// Fails with a transport error unless the channel is open and not idle.
    pub async fn authenticate(&self) -> BladeResult<ConnectResult> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Authenticate { done: tx })?;
        rx.await.map_err(|_| BladeError::SessionClosed)?
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn connecting(&self) -> bool {
        self.status.borrow().channel.connecting()
    }

    pub fn connected(&self) -> bool {
        self.status.borrow().channel.connected()
    }

    pub fn closing(&self) -> bool {
        self.status.borrow().channel.closing()
    }

    pub fn closed(&self) -> bool {
        self.status.borrow().channel.closed()
    }

    pub fn idle(&self) -> bool {
        self.status.borrow().idle
    }

    pub fn relay_protocol(&self) -> String {
        self.status.borrow().protocol.clone()
    }

    pub fn signature(&self) -> Option<String> {
        self.status.borrow().signature().map(str::to_string)
    }

    /// Wait until the published status satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionStatus) -> bool,
    ) -> BladeResult<SessionStatus> {
        let mut status = self.status.clone();
        let snapshot = status
            .wait_for(predicate)
            .await
            .map_err(|_| BladeError::SessionClosed)?;
        Ok(snapshot.clone())
    }
}
