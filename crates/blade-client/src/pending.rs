//! Pending-call table: requests on the wire, keyed by request id.

use std::collections::HashMap;

use tokio::task::JoinHandle;

use blade_core::{BladeResult, JsonRpcRequest};

use crate::engine::Responder;
use crate::session::Reply;

pub(crate) struct PendingCall {
    pub request: JsonRpcRequest,
    reply: Responder,
    timer: Option<JoinHandle<()>>,
}

impl PendingCall {
    pub fn new(request: JsonRpcRequest, reply: Responder, timer: Option<JoinHandle<()>>) -> Self {
        Self {
            request,
            reply,
            timer,
        }
    }

    /// Resolve or reject the waiting caller. The entry must already be out of the table.
    pub fn settle(self, outcome: BladeResult<Reply>) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        // The caller may have stopped waiting.
        let _ = self.reply.send(outcome);
    }
}

#[derive(Default)]
pub(crate) struct PendingCalls {
    calls: HashMap<String, PendingCall>,
}

impl PendingCalls {
    /// Register a call. Gives the call back if its id is already in flight.
    pub fn insert(&mut self, call: PendingCall) -> Result<(), PendingCall> {
        if self.calls.contains_key(&call.request.id) {
            return Err(call);
        }
        self.calls.insert(call.request.id.clone(), call);
        Ok(())
    }

    /// Remove and return the call for `id`. Each entry is handed out once.
    pub fn take(&mut self, id: &str) -> Option<PendingCall> {
        self.calls.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.calls.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }
}
