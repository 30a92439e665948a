//! In-process channel and hooks for exercising the engine without a socket.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use blade_core::{BladeError, BladeResult, ConnectResult};

use crate::hooks::SessionHooks;
use crate::session::Session;
use crate::transport::{Channel, ChannelEvents, ChannelFactory};

#[derive(Default)]
struct Shared {
    created: usize,
    hosts: Vec<String>,
    /// Callback sinks, one per created channel, oldest first.
    events: Vec<ChannelEvents>,
    sent: Vec<String>,
    closes: usize,
}

/// Records every channel it creates and lets the test drive its callbacks.
#[derive(Clone, Default)]
pub(crate) struct MockFactory {
    shared: Arc<Mutex<Shared>>,
}

impl MockFactory {
    fn with<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        f(&mut self.shared.lock().unwrap())
    }

    fn events(&self) -> ChannelEvents {
        self.with(|s| s.events.last().cloned())
            .expect("no channel has been created")
    }

    /// Callback sink of the `n`th created channel (0-based).
    pub fn channel_events(&self, n: usize) -> ChannelEvents {
        self.with(|s| s.events.get(n).cloned())
            .expect("no such channel")
    }

    pub fn created(&self) -> usize {
        self.with(|s| s.created)
    }

    pub fn hosts(&self) -> Vec<String> {
        self.with(|s| s.hosts.clone())
    }

    pub fn closes(&self) -> usize {
        self.with(|s| s.closes)
    }

    /// Every frame written to any channel, parsed.
    pub fn sent(&self) -> Vec<Value> {
        self.with(|s| {
            s.sent
                .iter()
                .map(|f| serde_json::from_str(f).unwrap())
                .collect()
        })
    }

    pub fn sent_with_method(&self, method: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|m| m["method"] == method)
            .collect()
    }

    pub fn open(&self) {
        self.events().opened();
    }

    pub fn close_from_server(&self, code: u16, reason: &str) {
        self.events().closed(Some(code), reason);
    }

    pub fn error(&self, error: &str) {
        self.events().errored(error);
    }

    pub fn push(&self, frame: Value) {
        self.events().message(frame.to_string());
    }

    pub fn push_raw(&self, frame: &str) {
        self.events().message(frame);
    }
}

impl ChannelFactory for MockFactory {
    fn create(&self, host: &str, events: ChannelEvents) -> BladeResult<Box<dyn Channel>> {
        self.with(|s| {
            s.created += 1;
            s.hosts.push(host.to_string());
            s.events.push(events.clone());
        });
        Ok(Box::new(MockChannel {
            shared: self.shared.clone(),
            events,
        }))
    }
}

struct MockChannel {
    shared: Arc<Mutex<Shared>>,
    events: ChannelEvents,
}

impl Channel for MockChannel {
    fn send(&mut self, text: String) -> BladeResult<()> {
        self.shared.lock().unwrap().sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        self.shared.lock().unwrap().closes += 1;
        self.events.closed(Some(1000), "closed by client");
    }
}

#[derive(Default)]
struct Recorded {
    events: Vec<Value>,
    authorized: usize,
    auth_errors: usize,
    unexpected_closes: usize,
}

#[derive(Clone, Default)]
pub(crate) struct RecordingHooks {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingHooks {
    pub fn events(&self) -> Vec<Value> {
        self.recorded.lock().unwrap().events.clone()
    }

    pub fn authorized(&self) -> usize {
        self.recorded.lock().unwrap().authorized
    }

    pub fn auth_errors(&self) -> usize {
        self.recorded.lock().unwrap().auth_errors
    }

    pub fn unexpected_closes(&self) -> usize {
        self.recorded.lock().unwrap().unexpected_closes
    }
}

impl SessionHooks for RecordingHooks {
    fn dispatch_event(&self, payload: Value) {
        self.recorded.lock().unwrap().events.push(payload);
    }

    fn on_authorized(&self, _result: &ConnectResult) {
        self.recorded.lock().unwrap().authorized += 1;
    }

    fn on_auth_error(&self, _error: &BladeError) {
        self.recorded.lock().unwrap().auth_errors += 1;
    }

    fn on_unexpected_close(&self, _session: &Session) {
        self.recorded.lock().unwrap().unexpected_closes += 1;
    }
}

/// Let the engine and its helper tasks run until they go quiet.
pub(crate) async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

pub(crate) fn connect_result(signature: &str, protocol: &str) -> Value {
    json!({
        "session_restored": false,
        "sessionid": "session-1",
        "nodeid": "node-1",
        "identity": "identity-1",
        "master_nodeid": "master-1",
        "authorization": {
            "type": "video",
            "project": "project",
            "scopes": ["calling"],
            "signature": signature
        },
        "result": {
            "protocol": protocol,
            "iceServers": [{"urls": "stun:stun.test:3478"}]
        }
    })
}

/// Reply to the most recent `blade.connect` with a successful result.
pub(crate) fn answer_handshake(factory: &MockFactory, signature: &str, protocol: &str) {
    let connects = factory.sent_with_method("blade.connect");
    let request = connects.last().expect("no handshake was sent");
    factory.push(json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "result": connect_result(signature, protocol),
    }));
}
