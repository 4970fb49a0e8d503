//! Relay queue: unbounded FIFO between the ingestion handler and the dispatch loop.
//!
//! Producers never block. The single consumer either polls with `try_dequeue`
//! or parks in `dequeue` until the next `enqueue` wakes it.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

use super::RelayMessage;

#[derive(Default)]
pub struct RelayQueue {
    items: Mutex<VecDeque<RelayMessage>>,
    ready: Notify,
}

impl RelayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // The lock is never held across an await or a panic-prone call, so a
    // poisoned mutex still guards a consistent deque.
    fn items(&self) -> MutexGuard<'_, VecDeque<RelayMessage>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a message and wake the consumer.
    pub fn enqueue(&self, message: RelayMessage) {
        let depth = {
            let mut items = self.items();
            items.push_back(message);
            items.len()
        };
        log::debug!("relay queue: enqueued (depth {})", depth);
        self.ready.notify_one();
    }

    /// Pop the oldest message, or `None` when the queue is empty.
    pub fn try_dequeue(&self) -> Option<RelayMessage> {
        self.items().pop_front()
    }

    /// Wait until a message is available and pop it.
    pub async fn dequeue(&self) -> RelayMessage {
        loop {
            if let Some(message) = self.try_dequeue() {
                return message;
            }
            self.wait().await;
        }
    }

    /// Park until the next enqueue. Returns immediately if an enqueue happened
    /// since the last wake-up.
    pub async fn wait(&self) {
        self.ready.notified().await;
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}
