//! The session engine: one task owning all session state.
//!
//! Facade calls, channel callbacks, request timers and handshake completion
//! all arrive as [`Command`]s on a single queue and are handled one at a
//! time. The pending-call table and the idle queue are only touched from
//! here, so neither needs a lock.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;

use blade_core::codec;
use blade_core::messages::IceServer;
use blade_core::{Authorization, BladeError, BladeResult, ConnectResult, Message};

use crate::hooks::SessionHooks;
use crate::pending::{PendingCall, PendingCalls};
use crate::queue::IdleQueue;
use crate::session::{Reply, Session, SessionOptions};
use crate::state::{AuthStatus, ChannelState, SessionStatus};
use crate::transport::{Channel, ChannelEvent, ChannelEvents, ChannelFactory};

/// Where the outcome of one `execute()` goes.
pub(crate) type Responder = oneshot::Sender<BladeResult<Reply>>;

/// Where the outcome of an explicit `authenticate()` goes.
pub(crate) type HandshakeDone = oneshot::Sender<BladeResult<ConnectResult>>;

pub(crate) enum Command {
    Connect,
    Disconnect,
    Execute {
        message: Message,
        reply: Responder,
    },
    Authenticate {
        done: HandshakeDone,
    },
    Channel {
        generation: u64,
        event: ChannelEvent,
    },
    /// A request's timer fired.
    Expire {
        id: String,
    },
    /// The `blade.connect` sent on channel `generation` settled.
    HandshakeSettled {
        generation: u64,
        outcome: BladeResult<Reply>,
        done: Option<HandshakeDone>,
        drain: bool,
    },
}

pub(crate) struct Engine {
    pub(crate) id: Arc<str>,
    pub(crate) options: SessionOptions,
    pub(crate) host: String,
    pub(crate) factory: Arc<dyn ChannelFactory>,
    pub(crate) hooks: Arc<dyn SessionHooks>,
    /// Weak so that timers and channels never keep the engine alive.
    pub(crate) commands: mpsc::WeakUnboundedSender<Command>,
    pub(crate) status: watch::Sender<SessionStatus>,

    pub(crate) channel: Option<Box<dyn Channel>>,
    pub(crate) channel_state: ChannelState,
    pub(crate) generation: u64,
    pub(crate) idle: bool,

    pub(crate) relay_protocol: String,
    pub(crate) authorization: Option<Authorization>,
    pub(crate) ice_servers: Vec<IceServer>,
    pub(crate) auth_status: AuthStatus,
    /// Id of the `blade.connect` in flight on the current channel.
    pub(crate) handshake: Option<String>,

    pub(crate) pending: PendingCalls,
    pub(crate) queue: IdleQueue,
}

impl Engine {
    pub(crate) fn new(
        id: Arc<str>,
        options: SessionOptions,
        factory: Arc<dyn ChannelFactory>,
        hooks: Arc<dyn SessionHooks>,
        commands: mpsc::WeakUnboundedSender<Command>,
        status: watch::Sender<SessionStatus>,
    ) -> Self {
        let host = options.host();
        Self {
            id,
            options,
            host,
            factory,
            hooks,
            commands,
            status,
            channel: None,
            channel_state: ChannelState::Absent,
            generation: 0,
            idle: true,
            relay_protocol: String::new(),
            authorization: None,
            ice_servers: Vec::new(),
            auth_status: AuthStatus::Unknown,
            handshake: None,
            pending: PendingCalls::default(),
            queue: IdleQueue::default(),
        }
    }

    /// Process commands until every [`Session`] handle is gone.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            self.handle(command);
            self.publish();
        }

        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        tracing::debug!("session engine stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Disconnect => self.disconnect(),
            Command::Execute { message, reply } => self.execute(message, reply),
            Command::Authenticate { done } => self.reauthenticate(done),
            Command::Channel { generation, event } => self.on_channel_event(generation, event),
            Command::Expire { id } => self.expire(&id),
            Command::HandshakeSettled {
                generation,
                outcome,
                done,
                drain,
            } => self.on_handshake_settled(generation, outcome, done, drain),
        }
    }

    fn publish(&self) {
        self.status.send_replace(SessionStatus {
            channel: self.channel_state,
            idle: self.idle,
            auth: self.auth_status,
            protocol: self.relay_protocol.clone(),
            authorization: self.authorization.clone(),
            ice_servers: self.ice_servers.clone(),
            pending: self.pending.len(),
            queued: self.queue.len(),
        });
    }

    /// A facade handle, for hooks that want to act on the session.
    fn session_handle(&self) -> Option<Session> {
        let commands = self.commands.upgrade()?;
        Some(Session::from_parts(
            self.id.clone(),
            commands,
            self.status.subscribe(),
        ))
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.channel.is_some() && self.channel_state.connected()
    }

    // ── Channel lifecycle ────────────────────────────────────────────

    pub(crate) fn connect(&mut self) {
        if self.channel.is_some() {
            tracing::warn!("session already connected");
            return;
        }

        self.generation += 1;
        let events = ChannelEvents::new(self.generation, self.commands.clone());
        match self.factory.create(&self.host, events) {
            Ok(channel) => {
                tracing::info!(host = %self.host, "connecting");
                self.channel = Some(channel);
                self.channel_state = ChannelState::Connecting;
            }
            Err(e) => {
                tracing::error!(host = %self.host, error = %e, "failed to create channel");
                self.channel_state = ChannelState::Closed;
            }
        }
    }

    pub(crate) fn disconnect(&mut self) {
        if self.channel.is_none() || self.channel_state.closing() {
            tracing::warn!("session not connected or already closing");
            return;
        }
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.channel_state = ChannelState::Closing;
        self.abandon_handshake();
    }

    fn on_channel_event(&mut self, generation: u64, event: ChannelEvent) {
        if generation != self.generation {
            tracing::trace!(generation, ?event, "ignoring event from a discarded channel");
            return;
        }

        match event {
            ChannelEvent::Opened => self.on_open(),
            ChannelEvent::Message(text) => self.on_message(text),
            ChannelEvent::Errored(error) => tracing::error!(%error, "channel error"),
            ChannelEvent::Closed { code, reason } => self.on_close(code, reason),
        }
    }

    fn on_open(&mut self) {
        if self.channel.is_none() {
            tracing::debug!("channel opened after disconnect; ignoring");
            return;
        }
        tracing::debug!("channel opened");
        self.channel_state = ChannelState::Open;
        self.idle = false;
        self.authenticate(None, true);
    }

    fn on_close(&mut self, code: Option<u16>, reason: String) {
        // disconnect() discards the channel before the close lands.
        let requested = self.channel.take().is_none();
        self.channel_state = ChannelState::Closed;
        self.abandon_handshake();

        if requested {
            tracing::debug!(?code, %reason, "channel closed");
            return;
        }
        tracing::warn!(?code, %reason, "channel closed unexpectedly");
        if let Some(session) = self.session_handle() {
            self.hooks.on_unexpected_close(&session);
        }
    }

    // ── Execute ──────────────────────────────────────────────────────

    /// Route an outgoing message: queue while idle or disconnected, else send.
    pub(crate) fn execute(&mut self, message: Message, reply: Responder) {
        if self.idle {
            tracing::debug!(id = message.id(), "session idle, queueing");
            self.queue.push(message, reply);
            return;
        }

        if !self.is_connected() {
            tracing::debug!(id = message.id(), "not connected, queueing");
            self.queue.push(message, reply);
            if self.channel.is_none() {
                self.connect();
            }
            return;
        }

        self.send_now(message, reply);
    }

    /// Put a message on the wire. Requests are tracked until their reply or timeout.
    pub(crate) fn send_now(&mut self, message: Message, reply: Responder) {
        if message.expects_reply() && self.pending.contains(message.id()) {
            let _ = reply.send(Err(BladeError::InvalidMessage(format!(
                "request id {} is already in flight",
                message.id()
            ))));
            return;
        }

        let frame = match codec::encode(&message) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        tracing::debug!(%frame, "SEND");
        let sent = match self.channel.as_mut() {
            Some(channel) => channel.send(frame),
            None => Err(BladeError::Transport("no channel".into())),
        };
        if let Err(e) = sent {
            tracing::error!(id = message.id(), error = %e, "failed to send");
            let _ = reply.send(Err(e));
            return;
        }

        match message {
            Message::Request(request) if request.params.is_some() => {
                let timer = self.spawn_timeout(request.id.clone());
                if let Err(call) = self
                    .pending
                    .insert(PendingCall::new(request, reply, Some(timer)))
                {
                    call.settle(Err(BladeError::InvalidMessage(
                        "request id is already in flight".into(),
                    )));
                }
            }
            _ => {
                let _ = reply.send(Ok(Reply::Sent));
            }
        }
    }

    fn spawn_timeout(&self, id: String) -> JoinHandle<()> {
        let commands = self.commands.clone();
        let timeout = self.options.execute_timeout;
        tokio::spawn(async move {
            time::sleep(timeout).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::Expire { id });
            }
        })
    }

    fn expire(&mut self, id: &str) {
        if let Some(call) = self.pending.take(id) {
            tracing::debug!(id, method = %call.request.method, "no reply within timeout");
            call.settle(Err(BladeError::Timeout));
        }
    }

    /// Replay everything queued while idle or disconnected, in arrival order.
    pub(crate) fn drain_queue(&mut self) {
        let batch = self.queue.take_all();
        if batch.is_empty() {
            return;
        }
        tracing::debug!(count = batch.len(), "replaying queued calls");
        for call in batch {
            self.execute(call.message, call.reply);
        }
    }
}
