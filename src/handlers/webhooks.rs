//! # Webhooks Action Helper
//!
//! Hands an outbound webhook to the tenant's webhook queue. Delivery itself
//! (HTTP, signing, retries) belongs to the webhook dispatch service.

use crate::errors::Result;
use crate::handlers::{wrong_variant, ActionHelper};
use crate::messaging::message::ActionMessage;
use crate::repositories::TenantRepositories;
use crate::tenant::TenantInformation;
use async_trait::async_trait;
use tracing::debug;

pub struct WebhooksActionHelper;

#[async_trait]
impl ActionHelper for WebhooksActionHelper {
    async fn handle_action(
        &self,
        tenant: &TenantInformation,
        message: &ActionMessage,
        repositories: &TenantRepositories,
    ) -> Result<bool> {
        let webhook = match message {
            ActionMessage::Webhook(m) => m,
            other => return Err(wrong_variant("WebhooksActionHelper", other)),
        };

        let has_url = webhook
            .url
            .as_deref()
            .map(|u| !u.trim().is_empty())
            .unwrap_or(false);
        if !has_url {
            debug!(
                tenant_id = %tenant.tenant_id,
                webhook_id = webhook.webhook_id,
                "webhook without a target url, skipped"
            );
            return Ok(false);
        }

        repositories.webhooks.queue_webhook(webhook).await?;

        debug!(
            tenant_id = %tenant.tenant_id,
            webhook_id = webhook.webhook_id,
            "webhook queued for delivery"
        );
        Ok(true)
    }
}
