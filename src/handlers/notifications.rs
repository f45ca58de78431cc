//! # Notifications Action Helper
//!
//! Sends workflow email notifications. SMTP settings are fetched fresh from
//! the tenant store before every send; a tenant without a configured mail
//! host is a soft skip, not an error.

use crate::errors::Result;
use crate::handlers::{wrong_variant, ActionHelper};
use crate::messaging::message::{ActionMessage, NotificationMessage};
use crate::repositories::{OutgoingEmail, SmtpClientConfig, TenantRepositories};
use crate::tenant::TenantInformation;
use async_trait::async_trait;
use tracing::{debug, warn};

pub struct NotificationsActionHelper;

#[async_trait]
impl ActionHelper for NotificationsActionHelper {
    async fn handle_action(
        &self,
        tenant: &TenantInformation,
        message: &ActionMessage,
        repositories: &TenantRepositories,
    ) -> Result<bool> {
        let notification = match message {
            ActionMessage::Notification(m) => m,
            other => return Err(wrong_variant("NotificationsActionHelper", other)),
        };

        let Some(settings) = repositories.notifications.get_email_settings().await? else {
            warn!(
                tenant_id = %tenant.tenant_id,
                artifact_id = notification.artifact_id,
                "no email settings for tenant, notification skipped"
            );
            return Ok(false);
        };

        let Some(smtp) = SmtpClientConfig::from_settings(&settings) else {
            warn!(
                tenant_id = %tenant.tenant_id,
                artifact_id = notification.artifact_id,
                "email settings are not usable, notification skipped"
            );
            return Ok(false);
        };

        let email = build_email(notification, &smtp);
        repositories.notifications.send_email(&smtp, &email).await?;

        debug!(
            tenant_id = %tenant.tenant_id,
            artifact_id = notification.artifact_id,
            recipients = email.to.len(),
            "notification email sent"
        );
        Ok(true)
    }
}

/// Render the outgoing email. Message string fields may all be absent;
/// each one substitutes to an empty string.
fn build_email(notification: &NotificationMessage, smtp: &SmtpClientConfig) -> OutgoingEmail {
    let header = notification.header.as_deref().unwrap_or_default();
    let body = notification.message.as_deref().unwrap_or_default();
    let properties = notification
        .modified_properties_information
        .as_deref()
        .unwrap_or_default();

    OutgoingEmail {
        to: notification.to.clone(),
        cc: notification.cc.clone(),
        blind_cc: notification.blind_cc.clone(),
        from: notification
            .from
            .clone()
            .unwrap_or_else(|| smtp.sender.clone()),
        subject: notification.subject.clone().unwrap_or_default(),
        body: format!("{header}{body}{properties}"),
        is_html: true,
    }
}
