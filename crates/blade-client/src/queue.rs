//! Idle queue: calls issued before the channel is usable.

use std::collections::VecDeque;

use blade_core::Message;

use crate::engine::Responder;

pub(crate) struct QueuedCall {
    pub message: Message,
    pub reply: Responder,
}

/// FIFO of calls waiting for the channel to become usable.
#[derive(Default)]
pub(crate) struct IdleQueue {
    entries: VecDeque<QueuedCall>,
}

impl IdleQueue {
    pub fn push(&mut self, message: Message, reply: Responder) {
        self.entries.push_back(QueuedCall { message, reply });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Empty the queue and hand back its entries in arrival order.
    ///
    /// Anything enqueued while the returned entries are being replayed lands
    /// in the (now empty) queue, not in this batch.
    pub fn take_all(&mut self) -> VecDeque<QueuedCall> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blade_core::messages::blade_disconnect_response;
    use tokio::sync::oneshot;

    fn message(id: &str) -> Message {
        Message::from(blade_disconnect_response(id))
    }

    #[test]
    fn take_all_preserves_order_and_empties() {
        let mut queue = IdleQueue::default();
        for id in ["a", "b", "c"] {
            queue.push(message(id), oneshot::channel().0);
        }
        assert_eq!(queue.len(), 3);

        let drained: Vec<String> = queue
            .take_all()
            .into_iter()
            .map(|c| c.message.id().to_string())
            .collect();
        assert_eq!(drained, ["a", "b", "c"]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn pushes_during_replay_go_to_a_fresh_queue() {
        let mut queue = IdleQueue::default();
        queue.push(message("first"), oneshot::channel().0);

        let batch = queue.take_all();
        for call in batch {
            queue.push(call.message, call.reply);
        }
        assert_eq!(queue.len(), 1);
        assert!(queue.take_all().len() == 1);
    }
}
