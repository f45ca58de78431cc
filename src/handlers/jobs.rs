//! # Job-Enqueueing Action Helpers
//!
//! The generate-descendants, generate-tests, generate-user-stories and
//! state-transition messages all resolve to one job record in the tenant's
//! background job queue. Each helper validates its message, builds the job
//! parameters and enqueues exactly one record.

use crate::errors::Result;
use crate::handlers::{wrong_variant, ActionHelper};
use crate::messaging::message::ActionMessage;
use crate::repositories::{AddJobMessage, JobType, TenantRepositories};
use crate::tenant::TenantInformation;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

async fn enqueue(
    tenant: &TenantInformation,
    repositories: &TenantRepositories,
    job: AddJobMessage,
) -> Result<bool> {
    let job_type = job.job_type;
    let job_id = repositories.jobs.add_job_message(job).await?;
    debug!(
        tenant_id = %tenant.tenant_id,
        %job_type,
        job_id = job_id.unwrap_or(-1),
        "job message enqueued"
    );
    Ok(true)
}

pub struct GenerateDescendantsActionHelper;

#[async_trait]
impl ActionHelper for GenerateDescendantsActionHelper {
    async fn handle_action(
        &self,
        tenant: &TenantInformation,
        message: &ActionMessage,
        repositories: &TenantRepositories,
    ) -> Result<bool> {
        let request = match message {
            ActionMessage::GenerateDescendants(m) => m,
            other => return Err(wrong_variant("GenerateDescendantsActionHelper", other)),
        };

        let Some(desired_artifact_type_id) = request.desired_artifact_type_id else {
            debug!(artifact_id = request.artifact_id, "no desired artifact type, skipped");
            return Ok(false);
        };
        if request.artifact_id == 0 || request.child_count == 0 {
            return Ok(false);
        }

        enqueue(
            tenant,
            repositories,
            AddJobMessage {
                job_type: JobType::GenerateDescendants,
                user_id: request.user_id,
                user_name: request.user_name.clone(),
                project_id: request.project_id,
                project_name: request.project_name.clone(),
                host_uri: request.base_host_uri.clone(),
                parameters: json!({
                    "artifact_id": request.artifact_id,
                    "revision_id": request.revision_id,
                    "desired_artifact_type_id": desired_artifact_type_id,
                    "child_count": request.child_count,
                    "ancestor_artifact_type_ids": request.ancestor_artifact_type_ids,
                }),
            },
        )
        .await
    }
}

pub struct GenerateTestsActionHelper;

#[async_trait]
impl ActionHelper for GenerateTestsActionHelper {
    async fn handle_action(
        &self,
        tenant: &TenantInformation,
        message: &ActionMessage,
        repositories: &TenantRepositories,
    ) -> Result<bool> {
        let request = match message {
            ActionMessage::GenerateTests(m) => m,
            other => return Err(wrong_variant("GenerateTestsActionHelper", other)),
        };

        if request.artifact_id == 0 {
            return Ok(false);
        }

        enqueue(
            tenant,
            repositories,
            AddJobMessage {
                job_type: JobType::GenerateProcessTests,
                user_id: request.user_id,
                user_name: request.user_name.clone(),
                project_id: request.project_id,
                project_name: request.project_name.clone(),
                host_uri: request.base_host_uri.clone(),
                parameters: json!({
                    "artifact_id": request.artifact_id,
                    "revision_id": request.revision_id,
                }),
            },
        )
        .await
    }
}

pub struct GenerateUserStoriesActionHelper;

#[async_trait]
impl ActionHelper for GenerateUserStoriesActionHelper {
    async fn handle_action(
        &self,
        tenant: &TenantInformation,
        message: &ActionMessage,
        repositories: &TenantRepositories,
    ) -> Result<bool> {
        let request = match message {
            ActionMessage::GenerateUserStories(m) => m,
            other => return Err(wrong_variant("GenerateUserStoriesActionHelper", other)),
        };

        if request.artifact_id == 0 {
            return Ok(false);
        }

        enqueue(
            tenant,
            repositories,
            AddJobMessage {
                job_type: JobType::GenerateUserStories,
                user_id: request.user_id,
                user_name: request.user_name.clone(),
                project_id: request.project_id,
                project_name: request.project_name.clone(),
                host_uri: request.base_host_uri.clone(),
                parameters: json!({
                    "artifact_id": request.artifact_id,
                    "revision_id": request.revision_id,
                }),
            },
        )
        .await
    }
}

pub struct StateTransitionActionHelper;

#[async_trait]
impl ActionHelper for StateTransitionActionHelper {
    async fn handle_action(
        &self,
        tenant: &TenantInformation,
        message: &ActionMessage,
        repositories: &TenantRepositories,
    ) -> Result<bool> {
        let transition = match message {
            ActionMessage::StateTransition(m) => m,
            other => return Err(wrong_variant("StateTransitionActionHelper", other)),
        };

        if transition.artifact_id == 0 {
            return Ok(false);
        }

        enqueue(
            tenant,
            repositories,
            AddJobMessage {
                job_type: JobType::WorkflowTransition,
                user_id: transition.user_id,
                user_name: transition.user_name.clone(),
                project_id: transition.project_id,
                project_name: transition.project_name.clone(),
                host_uri: None,
                parameters: json!({
                    "artifact_id": transition.artifact_id,
                    "revision_id": transition.revision_id,
                    "workflow_id": transition.workflow_id,
                    "from_state_id": transition.from_state_id,
                    "to_state_id": transition.to_state_id,
                }),
            },
        )
        .await
    }
}
