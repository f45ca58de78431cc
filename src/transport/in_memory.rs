//! # In-Memory Transport
//!
//! Channel-backed [`MessageTransport`] for tests and single-process runs.
//! Queues are created lazily on first send or subscribe, so publish order
//! relative to subscription does not matter.

use crate::errors::{ActionHandlerError, Result};
use crate::messaging::message::{ActionMessage, MessageHeaders};
use crate::transport::{MessageTransport, TransportEnvelope};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

struct Queue {
    sender: mpsc::Sender<TransportEnvelope>,
    receiver: Mutex<Option<mpsc::Receiver<TransportEnvelope>>>,
}

pub struct InMemoryTransport {
    queues: DashMap<String, Arc<Queue>>,
    capacity: usize,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: DashMap::new(),
            capacity,
        }
    }

    fn queue(&self, queue_name: &str) -> Arc<Queue> {
        let entry = self.queues.entry(queue_name.to_string()).or_insert_with(|| {
            let (sender, receiver) = mpsc::channel(self.capacity);
            Arc::new(Queue {
                sender,
                receiver: Mutex::new(Some(receiver)),
            })
        });
        Arc::clone(entry.value())
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn send(
        &self,
        queue_name: &str,
        message: &ActionMessage,
        headers: &MessageHeaders,
    ) -> Result<()> {
        let queue = self.queue(queue_name);
        queue
            .sender
            .send(TransportEnvelope {
                message: message.clone(),
                headers: headers.clone(),
            })
            .await
            .map_err(|_| {
                ActionHandlerError::transport(queue_name, "send", "queue receiver dropped")
            })
    }

    async fn subscribe(&self, queue_name: &str) -> Result<mpsc::Receiver<TransportEnvelope>> {
        let queue = self.queue(queue_name);
        let receiver = queue.receiver.lock().take();
        receiver.ok_or_else(|| {
            ActionHandlerError::transport(queue_name, "subscribe", "queue already has a subscriber")
        })
    }
}
