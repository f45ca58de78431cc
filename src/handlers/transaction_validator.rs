//! # Transaction Validator
//!
//! Polls a tenant's transaction-status store until the database transaction
//! that raised a message commits, rolls back, or the retry budget runs out.
//! Backoff doubles from a configured base up to a cap so the store is not
//! hammered while a long publish is still in flight.

use crate::config::ActionHandlerConfig;
use crate::errors::{ActionHandlerError, Result};
use crate::repositories::{BaseRepository, TransactionStatus};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Bounded polling of transaction status with exponential backoff.
#[derive(Debug, Clone)]
pub struct TransactionValidator {
    tries_max: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl TransactionValidator {
    pub fn new(config: &ActionHandlerConfig) -> Self {
        Self {
            tries_max: config.transaction_tries_max,
            backoff_base: Duration::from_millis(config.transaction_backoff_base_ms),
            backoff_max: Duration::from_millis(config.transaction_backoff_max_ms),
        }
    }

    /// Resolve the status of `transaction_id`, polling up to the configured
    /// maximum number of attempts.
    ///
    /// Returns `Uncommitted` when the budget is exhausted without the
    /// transaction resolving; the dispatcher treats that as a stale message.
    /// Checks the shutdown signal between attempts.
    pub async fn get_status(
        &self,
        transaction_id: i64,
        repository: &dyn BaseRepository,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<TransactionStatus> {
        let mut backoff = self.backoff_base;

        for attempt in 1..=self.tries_max {
            if *shutdown.borrow() {
                return Err(ActionHandlerError::shutting_down(
                    "transaction status polling",
                ));
            }

            let status = repository.get_transaction_status(transaction_id).await?;
            if status != TransactionStatus::Uncommitted {
                return Ok(status);
            }

            debug!(
                transaction_id,
                attempt,
                tries_max = self.tries_max,
                backoff_ms = backoff.as_millis() as u64,
                "transaction still uncommitted"
            );

            if attempt < self.tries_max {
                self.wait_backoff(backoff, shutdown).await?;
                backoff = self.next_backoff(backoff);
            }
        }

        Ok(TransactionStatus::Uncommitted)
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        (current * 2).min(self.backoff_max)
    }

    async fn wait_backoff(&self, delay: Duration, shutdown: &watch::Receiver<bool>) -> Result<()> {
        let mut shutdown = shutdown.clone();
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => return Ok(()),
                changed = shutdown.changed() => {
                    match changed {
                        Ok(()) if *shutdown.borrow() => {
                            return Err(ActionHandlerError::shutting_down(
                                "transaction status polling",
                            ));
                        }
                        // Spurious change or sender gone; finish the backoff.
                        Ok(()) => continue,
                        Err(_) => {
                            sleep.as_mut().await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
