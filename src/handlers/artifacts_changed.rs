//! # Changed-Entity Action Helpers
//!
//! The *Changed message family fans committed change sets out to downstream
//! consumers (search indexing, cache revalidation). An empty change set is a
//! soft skip; a non-empty one results in exactly one repository call.

use crate::errors::Result;
use crate::handlers::{wrong_variant, ActionHelper};
use crate::messaging::message::ActionMessage;
use crate::repositories::{RegistryChangeKind, TenantRepositories};
use crate::tenant::TenantInformation;
use async_trait::async_trait;
use tracing::debug;

pub struct ArtifactsChangedActionHelper;

#[async_trait]
impl ActionHelper for ArtifactsChangedActionHelper {
    async fn handle_action(
        &self,
        tenant: &TenantInformation,
        message: &ActionMessage,
        repositories: &TenantRepositories,
    ) -> Result<bool> {
        let changed = match message {
            ActionMessage::ArtifactsChanged(m) => m,
            other => return Err(wrong_variant("ArtifactsChangedActionHelper", other)),
        };

        if changed.artifact_ids.is_empty() {
            debug!(tenant_id = %tenant.tenant_id, "artifacts-changed with no ids, skipped");
            return Ok(false);
        }

        repositories
            .artifacts
            .queue_artifacts_changed(changed.change_type, &changed.artifact_ids)
            .await?;

        debug!(
            tenant_id = %tenant.tenant_id,
            artifact_count = changed.artifact_ids.len(),
            change_type = ?changed.change_type,
            "artifacts-changed queued"
        );
        Ok(true)
    }
}

/// Handles the four registry-changed kinds (projects, property/item types,
/// users/groups, workflows) with one shared shape.
pub struct RegistryChangedActionHelper;

#[async_trait]
impl ActionHelper for RegistryChangedActionHelper {
    async fn handle_action(
        &self,
        tenant: &TenantInformation,
        message: &ActionMessage,
        repositories: &TenantRepositories,
    ) -> Result<bool> {
        let (kind, change_type, ids): (RegistryChangeKind, _, Vec<i64>) = match message {
            ActionMessage::ProjectsChanged(m) => (
                RegistryChangeKind::Projects,
                m.change_type,
                m.project_ids.clone(),
            ),
            ActionMessage::PropertyItemTypesChanged(m) => (
                RegistryChangeKind::PropertyItemTypes,
                m.change_type,
                m.item_type_ids
                    .iter()
                    .chain(m.property_type_ids.iter())
                    .copied()
                    .collect(),
            ),
            ActionMessage::UsersGroupsChanged(m) => (
                RegistryChangeKind::UsersGroups,
                m.change_type,
                m.user_ids.iter().chain(m.group_ids.iter()).copied().collect(),
            ),
            ActionMessage::WorkflowsChanged(m) => (
                RegistryChangeKind::Workflows,
                m.change_type,
                m.workflow_ids.clone(),
            ),
            other => return Err(wrong_variant("RegistryChangedActionHelper", other)),
        };

        if ids.is_empty() {
            debug!(
                tenant_id = %tenant.tenant_id,
                kind = ?kind,
                "registry-changed with no ids, skipped"
            );
            return Ok(false);
        }

        repositories
            .artifacts
            .queue_registry_changed(kind, change_type, &ids)
            .await?;

        debug!(
            tenant_id = %tenant.tenant_id,
            kind = ?kind,
            id_count = ids.len(),
            "registry-changed queued"
        );
        Ok(true)
    }
}
