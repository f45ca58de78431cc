//! # Property Change Action Helper
//!
//! Applies property-change side effects through the tenant artifact store
//! once the originating publish is confirmed committed.

use crate::errors::Result;
use crate::handlers::{wrong_variant, ActionHelper};
use crate::messaging::message::ActionMessage;
use crate::repositories::TenantRepositories;
use crate::tenant::TenantInformation;
use async_trait::async_trait;
use tracing::debug;

pub struct PropertyChangeActionHelper;

#[async_trait]
impl ActionHelper for PropertyChangeActionHelper {
    async fn handle_action(
        &self,
        tenant: &TenantInformation,
        message: &ActionMessage,
        repositories: &TenantRepositories,
    ) -> Result<bool> {
        let change = match message {
            ActionMessage::PropertyChange(m) => m,
            other => return Err(wrong_variant("PropertyChangeActionHelper", other)),
        };

        if change.artifact_id == 0 || change.modified_properties.is_empty() {
            debug!(
                tenant_id = %tenant.tenant_id,
                artifact_id = change.artifact_id,
                "property change carries nothing to apply, skipped"
            );
            return Ok(false);
        }

        repositories.artifacts.apply_property_change(change).await?;

        debug!(
            tenant_id = %tenant.tenant_id,
            artifact_id = change.artifact_id,
            property_count = change.modified_properties.len(),
            "property change applied"
        );
        Ok(true)
    }
}
