//! # Message Transport
//!
//! Broker-agnostic transport seam: handler logic never sees a concrete bus
//! client. One adapter per deployment target implements [`MessageTransport`];
//! [`in_memory::InMemoryTransport`] backs tests and local runs.
//!
//! [`TransportHost`] pumps a queue subscription into the dispatcher with a
//! bounded number of concurrent handler invocations, dead-letters fatal
//! failures and redelivers transient ones up to a retry budget.

pub mod in_memory;

pub use in_memory::InMemoryTransport;

use crate::config::ActionHandlerConfig;
use crate::errors::Result;
use crate::handlers::MessageDispatcher;
use crate::messaging::message::{ActionMessage, MessageHeaders};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A message together with its delivery headers
#[derive(Debug, Clone)]
pub struct TransportEnvelope {
    pub message: ActionMessage,
    pub headers: MessageHeaders,
}

/// Abstract bus transport: send to a named queue, subscribe to one.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(
        &self,
        queue_name: &str,
        message: &ActionMessage,
        headers: &MessageHeaders,
    ) -> Result<()>;

    /// Subscribe to a queue. At most one subscriber per queue.
    async fn subscribe(&self, queue_name: &str) -> Result<mpsc::Receiver<TransportEnvelope>>;
}

/// Hosts the receive loop: subscription in, handler invocations out.
pub struct TransportHost {
    transport: Arc<dyn MessageTransport>,
    dispatcher: Arc<MessageDispatcher>,
    config: ActionHandlerConfig,
    shutdown: watch::Sender<bool>,
}

impl TransportHost {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        dispatcher: Arc<MessageDispatcher>,
        config: ActionHandlerConfig,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            config,
            shutdown,
        }
    }

    /// Start consuming the message queue. Returns the receive-loop task; it
    /// exits when [`stop`](Self::stop) is called or the queue closes, after
    /// every in-flight handler invocation has completed.
    pub async fn start(&self) -> Result<JoinHandle<()>> {
        let mut receiver = self.transport.subscribe(&self.config.message_queue).await?;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let dispatcher = Arc::clone(&self.dispatcher);
        let transport = Arc::clone(&self.transport);
        let config = self.config.clone();
        let mut shutdown = self.shutdown.subscribe();

        info!(
            queue = %config.message_queue,
            max_concurrency = config.max_concurrency,
            "transport host starting"
        );

        Ok(tokio::spawn(async move {
            loop {
                let envelope = tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                    maybe = receiver.recv() => match maybe {
                        Some(envelope) => envelope,
                        None => break,
                    },
                };

                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break;
                };
                let dispatcher = Arc::clone(&dispatcher);
                let transport = Arc::clone(&transport);
                let config = config.clone();
                tokio::spawn(async move {
                    process_envelope(&dispatcher, transport.as_ref(), &config, envelope).await;
                    drop(permit);
                });
            }
            // Reclaim every permit so stopped is only reported once all
            // in-flight invocations have finished.
            let _ = semaphore.acquire_many(config.max_concurrency as u32).await;
            info!("transport host stopped");
        }))
    }

    /// Signal shutdown to the receive loop and all in-flight polling loops.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

async fn process_envelope(
    dispatcher: &MessageDispatcher,
    transport: &dyn MessageTransport,
    config: &ActionHandlerConfig,
    envelope: TransportEnvelope,
) {
    match dispatcher
        .handle_message(&envelope.message, &envelope.headers)
        .await
    {
        Ok(handled) => {
            debug!(handled, "message processed");
        }
        Err(err) if err.is_fatal() => {
            error!(%err, "message failed fatally, dead-lettering");
            dead_letter(transport, config, &envelope).await;
        }
        Err(err) => {
            if envelope.headers.retry_count >= config.max_message_retries {
                error!(
                    %err,
                    retries = envelope.headers.retry_count,
                    "retry budget exhausted, dead-lettering"
                );
                dead_letter(transport, config, &envelope).await;
            } else {
                warn!(
                    %err,
                    retries = envelope.headers.retry_count,
                    "transient failure, redelivering"
                );
                let mut headers = envelope.headers.clone();
                headers.retry_count += 1;
                if let Err(send_err) = transport
                    .send(&config.message_queue, &envelope.message, &headers)
                    .await
                {
                    error!(%send_err, "failed to redeliver message");
                }
            }
        }
    }
}

async fn dead_letter(
    transport: &dyn MessageTransport,
    config: &ActionHandlerConfig,
    envelope: &TransportEnvelope,
) {
    if let Err(err) = transport
        .send(&config.error_queue, &envelope.message, &envelope.headers)
        .await
    {
        error!(%err, queue = %config.error_queue, "failed to dead-letter message");
    }
}
