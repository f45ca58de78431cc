//! # Message Dispatcher
//!
//! The generic dispatch shell every inbound message passes through:
//!
//! 1. Require the tenant-id and message-id headers.
//! 2. Check the action type against the supported-types bitmask.
//! 3. Resolve the tenant from the cached tenant map.
//! 4. Validate that the originating database transaction committed.
//! 5. Invoke the matching action helper.
//!
//! The dispatcher itself performs no side effects; it validates and routes.
//! A rolled-back transaction discards the message silently since the change
//! that raised it never happened.

use crate::config::ActionHandlerConfig;
use crate::errors::{ActionHandlerError, Result};
use crate::handlers::{HandlerRegistry, TransactionValidator};
use crate::messaging::message::{ActionMessage, MessageHeaders};
use crate::repositories::{TenantRepositoryFactory, TransactionStatus};
use crate::tenant::TenantInfoRetriever;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

pub struct MessageDispatcher {
    config: ActionHandlerConfig,
    tenant_info: Arc<TenantInfoRetriever>,
    transaction_validator: TransactionValidator,
    registry: Arc<HandlerRegistry>,
    repository_factory: Arc<dyn TenantRepositoryFactory>,
    shutdown: watch::Receiver<bool>,
}

impl MessageDispatcher {
    pub fn new(
        config: ActionHandlerConfig,
        tenant_info: Arc<TenantInfoRetriever>,
        registry: Arc<HandlerRegistry>,
        repository_factory: Arc<dyn TenantRepositoryFactory>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let transaction_validator = TransactionValidator::new(&config);
        Self {
            config,
            tenant_info,
            transaction_validator,
            registry,
            repository_factory,
            shutdown,
        }
    }

    /// Validate and dispatch one inbound message.
    ///
    /// `Ok(true)` means the helper performed work, `Ok(false)` means the
    /// message was processed with nothing to do (including the rolled-back
    /// case). Fatal errors mean the message can never succeed; anything else
    /// is retryable by the transport host.
    #[instrument(skip_all, fields(
        action_type = %message.action_type(),
        transaction_id = message.transaction_id(),
    ))]
    pub async fn handle_message(
        &self,
        message: &ActionMessage,
        headers: &MessageHeaders,
    ) -> Result<bool> {
        let tenant_id = headers.require_tenant_id()?;
        let message_id = headers.require_message_id()?;

        let action_type = message.action_type();
        if !self.config.is_action_type_supported(action_type) {
            return Err(ActionHandlerError::unsupported_action_type(
                action_type.to_string(),
            ));
        }

        let tenants = self.tenant_info.get_tenants().await?;
        if tenants.is_empty() {
            return Err(ActionHandlerError::entity_not_found(
                "tenant",
                "tenants store returned no tenants",
            ));
        }
        let tenant = tenants.get(tenant_id).ok_or_else(|| {
            ActionHandlerError::entity_not_found(
                "tenant",
                format!("tenant {tenant_id} is not registered"),
            )
        })?;

        let repositories = self.repository_factory.create(tenant)?;

        let status = self
            .transaction_validator
            .get_status(
                message.transaction_id(),
                repositories.base.as_ref(),
                &self.shutdown,
            )
            .await?;

        match status {
            TransactionStatus::RolledBack => {
                info!(
                    tenant_id,
                    message_id, "transaction rolled back, message discarded"
                );
                Ok(false)
            }
            TransactionStatus::Uncommitted => Err(ActionHandlerError::entity_not_found(
                "transaction",
                format!(
                    "transaction {} did not commit within {} attempts",
                    message.transaction_id(),
                    self.config.transaction_tries_max
                ),
            )),
            TransactionStatus::Committed => {
                let helper = self.registry.resolve(action_type).ok_or_else(|| {
                    ActionHandlerError::unsupported_action_type(action_type.to_string())
                })?;

                let handled = helper.handle_action(tenant, message, &repositories).await?;
                debug!(tenant_id, message_id, handled, "message dispatched");
                Ok(handled)
            }
        }
    }
}
