//! # Workflow Events Messages Helper
//!
//! Evaluates the triggers attached to a state-transition event and produces
//! the outbound action messages to publish. Triggers are independent: a
//! trigger whose data cannot be resolved is logged and skipped without
//! blocking the rest.

use crate::messaging::message::{
    ActionMessage, GenerateDescendantsMessage, GenerateTestsMessage, GenerateUserStoriesMessage,
    ModifiedProperty, NotificationMessage, PredefinedItemType, PropertyChangeMessage,
    WebhookMessage,
};
use crate::repositories::UsersRepository;
use crate::workflow::triggers::{
    EmailNotificationAction, WorkflowEventAction, WorkflowEventTrigger, WorkflowEventTriggers,
};
use serde_json::json;
use std::collections::HashMap;
use tracing::{info, warn};

/// The artifact a state-transition event fired for
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactInfo {
    pub id: i64,
    pub name: Option<String>,
    pub project_id: i64,
    pub item_type_id: i32,
    pub predefined_type: PredefinedItemType,
}

/// Everything known about the triggering event, gathered by the caller
/// before trigger evaluation.
#[derive(Debug, Clone)]
pub struct WorkflowEventContext {
    pub user_id: i32,
    pub user_name: Option<String>,
    pub revision_id: i64,
    pub transaction_id: i64,
    pub artifact: ArtifactInfo,
    pub project_name: Option<String>,
    pub modified_properties: Vec<ModifiedProperty>,
    pub artifact_url: Option<String>,
    pub base_url: Option<String>,
    pub ancestor_type_ids: Vec<i32>,
    /// User ids stored in each associated-user property on the artifact,
    /// keyed by property type id. Used to resolve email recipients.
    pub property_user_ids: HashMap<i32, Vec<i32>>,
}

pub struct WorkflowEventsMessagesHelper;

impl WorkflowEventsMessagesHelper {
    /// Translate each trigger, in order, into zero or one outbound message.
    pub async fn generate_messages(
        context: &WorkflowEventContext,
        triggers: &WorkflowEventTriggers,
        users: &dyn UsersRepository,
    ) -> Vec<ActionMessage> {
        let mut messages = Vec::new();

        for trigger in triggers.iter() {
            if let Some(message) = Self::generate_for_trigger(context, trigger, users).await {
                messages.push(message);
            }
        }

        messages
    }

    async fn generate_for_trigger(
        context: &WorkflowEventContext,
        trigger: &WorkflowEventTrigger,
        users: &dyn UsersRepository,
    ) -> Option<ActionMessage> {
        match &trigger.action {
            WorkflowEventAction::EmailNotification(action) => {
                Self::generate_notification(context, trigger, action, users).await
            }
            WorkflowEventAction::GenerateChildren(action) => {
                Some(ActionMessage::GenerateDescendants(GenerateDescendantsMessage {
                    transaction_id: context.transaction_id,
                    revision_id: context.revision_id,
                    user_id: context.user_id,
                    user_name: context.user_name.clone(),
                    artifact_id: context.artifact.id,
                    project_id: context.artifact.project_id,
                    project_name: context.project_name.clone(),
                    desired_artifact_type_id: Some(action.artifact_type_id),
                    child_count: action.child_count,
                    ancestor_artifact_type_ids: context.ancestor_type_ids.clone(),
                    base_host_uri: context.base_url.clone(),
                }))
            }
            WorkflowEventAction::GenerateTestCases => {
                if !Self::is_process(context, trigger, "generate test cases") {
                    return None;
                }
                Some(ActionMessage::GenerateTests(GenerateTestsMessage {
                    transaction_id: context.transaction_id,
                    revision_id: context.revision_id,
                    user_id: context.user_id,
                    user_name: context.user_name.clone(),
                    artifact_id: context.artifact.id,
                    project_id: context.artifact.project_id,
                    project_name: context.project_name.clone(),
                    base_host_uri: context.base_url.clone(),
                }))
            }
            WorkflowEventAction::GenerateUserStories => {
                if !Self::is_process(context, trigger, "generate user stories") {
                    return None;
                }
                Some(ActionMessage::GenerateUserStories(GenerateUserStoriesMessage {
                    transaction_id: context.transaction_id,
                    revision_id: context.revision_id,
                    user_id: context.user_id,
                    user_name: context.user_name.clone(),
                    artifact_id: context.artifact.id,
                    project_id: context.artifact.project_id,
                    project_name: context.project_name.clone(),
                    base_host_uri: context.base_url.clone(),
                }))
            }
            WorkflowEventAction::PropertyChange(action) => {
                Some(ActionMessage::PropertyChange(PropertyChangeMessage {
                    transaction_id: context.transaction_id,
                    revision_id: context.revision_id,
                    user_id: context.user_id,
                    artifact_id: context.artifact.id,
                    property_type_id: action.property_type_id,
                    is_system_property: false,
                    modified_properties: vec![ModifiedProperty {
                        property_type_id: action.property_type_id,
                        name: None,
                        value: action.property_value.clone(),
                    }],
                }))
            }
            WorkflowEventAction::Webhook(action) => {
                Some(ActionMessage::Webhook(WebhookMessage {
                    transaction_id: context.transaction_id,
                    revision_id: context.revision_id,
                    user_id: context.user_id,
                    webhook_id: action.webhook_id,
                    url: action.url.clone(),
                    security_info: action.security_info.clone(),
                    payload: Some(json!({
                        "artifact_id": context.artifact.id,
                        "artifact_name": context.artifact.name,
                        "project_id": context.artifact.project_id,
                        "revision_id": context.revision_id,
                        "user_id": context.user_id,
                    })),
                }))
            }
        }
    }

    fn is_process(context: &WorkflowEventContext, trigger: &WorkflowEventTrigger, what: &str) -> bool {
        if context.artifact.predefined_type == PredefinedItemType::Process {
            return true;
        }
        info!(
            artifact_id = context.artifact.id,
            predefined_type = ?context.artifact.predefined_type,
            trigger = trigger.name.as_deref().unwrap_or("<unnamed>"),
            "artifact is not a process, cannot {what}"
        );
        false
    }

    async fn generate_notification(
        context: &WorkflowEventContext,
        trigger: &WorkflowEventTrigger,
        action: &EmailNotificationAction,
        users: &dyn UsersRepository,
    ) -> Option<ActionMessage> {
        let mut recipients = action.emails.clone();

        if let Some(property_type_id) = action.property_type_id {
            let user_ids = context
                .property_user_ids
                .get(&property_type_id)
                .cloned()
                .unwrap_or_default();

            match users.get_existing_users_by_ids(&user_ids).await {
                Ok(found) => {
                    recipients.extend(found.into_iter().filter_map(|user| user.email));
                }
                Err(error) => {
                    // Per-trigger isolation: log and skip, later triggers
                    // still evaluate.
                    warn!(
                        artifact_id = context.artifact.id,
                        property_type_id,
                        trigger = trigger.name.as_deref().unwrap_or("<unnamed>"),
                        %error,
                        "failed to resolve notification recipients, trigger skipped"
                    );
                    return None;
                }
            }
        }

        recipients.retain(|email| !email.trim().is_empty());
        if recipients.is_empty() {
            info!(
                artifact_id = context.artifact.id,
                trigger = trigger.name.as_deref().unwrap_or("<unnamed>"),
                "no recipients resolved, notification not generated"
            );
            return None;
        }

        let artifact_display = context
            .artifact
            .name
            .clone()
            .unwrap_or_else(|| format!("#{}", context.artifact.id));

        Some(ActionMessage::Notification(NotificationMessage {
            transaction_id: context.transaction_id,
            revision_id: context.revision_id,
            user_id: context.user_id,
            artifact_id: context.artifact.id,
            artifact_name: context.artifact.name.clone(),
            artifact_type_id: context.artifact.item_type_id,
            artifact_type_predefined: context.artifact.predefined_type,
            artifact_url: context.artifact_url.clone(),
            project_id: context.artifact.project_id,
            project_name: context.project_name.clone(),
            modified_properties_information: render_properties(&context.modified_properties),
            subject: Some(format!("Artifact {artifact_display} has been updated")),
            message: action.message.clone(),
            from: None,
            to: recipients,
            cc: vec![],
            blind_cc: vec![],
            header: None,
        }))
    }
}

fn render_properties(properties: &[ModifiedProperty]) -> Option<String> {
    if properties.is_empty() {
        return None;
    }
    let lines: Vec<String> = properties
        .iter()
        .map(|property| {
            format!(
                "{}: {}",
                property.name.as_deref().unwrap_or("<unknown>"),
                property.value.as_deref().unwrap_or("")
            )
        })
        .collect();
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::FakeUsers;
    use crate::repositories::UserInfo;
    use crate::workflow::triggers::{GenerateChildrenAction, PropertyChangeAction, WebhookAction};
    use std::sync::atomic::Ordering;

    fn context(predefined_type: PredefinedItemType) -> WorkflowEventContext {
        WorkflowEventContext {
            user_id: 3,
            user_name: Some("admin".to_string()),
            revision_id: 7,
            transaction_id: 42,
            artifact: ArtifactInfo {
                id: 100,
                name: Some("Checkout flow".to_string()),
                project_id: 9,
                item_type_id: 12,
                predefined_type,
            },
            project_name: Some("Flagship".to_string()),
            modified_properties: vec![],
            artifact_url: Some("https://example.com/a/100".to_string()),
            base_url: Some("https://example.com".to_string()),
            ancestor_type_ids: vec![],
            property_user_ids: HashMap::from([(55, vec![10, 11])]),
        }
    }

    fn trigger(action: WorkflowEventAction) -> WorkflowEventTrigger {
        WorkflowEventTrigger { name: Some("t".to_string()), action }
    }

    #[tokio::test]
    async fn generate_tests_only_for_process_artifacts() {
        let users = FakeUsers::default();
        let triggers = WorkflowEventTriggers(vec![trigger(WorkflowEventAction::GenerateTestCases)]);

        let for_process = WorkflowEventsMessagesHelper::generate_messages(
            &context(PredefinedItemType::Process),
            &triggers,
            &users,
        )
        .await;
        assert_eq!(for_process.len(), 1);
        assert!(matches!(for_process[0], ActionMessage::GenerateTests(_)));

        let for_actor = WorkflowEventsMessagesHelper::generate_messages(
            &context(PredefinedItemType::Actor),
            &triggers,
            &users,
        )
        .await;
        assert!(for_actor.is_empty());
    }

    #[tokio::test]
    async fn generate_user_stories_gated_the_same_way() {
        let users = FakeUsers::default();
        let triggers =
            WorkflowEventTriggers(vec![trigger(WorkflowEventAction::GenerateUserStories)]);

        let for_document = WorkflowEventsMessagesHelper::generate_messages(
            &context(PredefinedItemType::Document),
            &triggers,
            &users,
        )
        .await;
        assert!(for_document.is_empty());
    }

    #[tokio::test]
    async fn generate_children_is_unconditional() {
        let users = FakeUsers::default();
        let triggers = WorkflowEventTriggers(vec![trigger(WorkflowEventAction::GenerateChildren(
            GenerateChildrenAction { child_count: 4, artifact_type_id: 12 },
        ))]);

        let messages = WorkflowEventsMessagesHelper::generate_messages(
            &context(PredefinedItemType::Actor),
            &triggers,
            &users,
        )
        .await;

        assert_eq!(messages.len(), 1);
        let ActionMessage::GenerateDescendants(message) = &messages[0] else {
            panic!("expected a generate-descendants message");
        };
        assert_eq!(message.child_count, 4);
        assert_eq!(message.desired_artifact_type_id, Some(12));
    }

    #[tokio::test]
    async fn email_recipients_resolve_through_the_users_repository() {
        let users = FakeUsers::default();
        users.users.lock().extend([
            UserInfo {
                user_id: 10,
                user_name: "alice".to_string(),
                email: Some("alice@example.com".to_string()),
            },
            UserInfo {
                user_id: 11,
                user_name: "bob".to_string(),
                email: None,
            },
        ]);

        let triggers = WorkflowEventTriggers(vec![trigger(WorkflowEventAction::EmailNotification(
            EmailNotificationAction {
                emails: vec!["watcher@example.com".to_string()],
                property_type_id: Some(55),
                message: Some("State changed".to_string()),
            },
        ))]);

        let messages = WorkflowEventsMessagesHelper::generate_messages(
            &context(PredefinedItemType::Process),
            &triggers,
            &users,
        )
        .await;

        assert_eq!(messages.len(), 1);
        let ActionMessage::Notification(message) = &messages[0] else {
            panic!("expected a notification message");
        };
        assert_eq!(
            message.to,
            vec!["watcher@example.com".to_string(), "alice@example.com".to_string()]
        );
        assert_eq!(message.message.as_deref(), Some("State changed"));
    }

    #[tokio::test]
    async fn failing_trigger_does_not_block_later_triggers() {
        let users = FakeUsers::default();
        users.fail.store(true, Ordering::SeqCst);

        let triggers = WorkflowEventTriggers(vec![
            trigger(WorkflowEventAction::EmailNotification(EmailNotificationAction {
                emails: vec![],
                property_type_id: Some(55),
                message: None,
            })),
            trigger(WorkflowEventAction::GenerateChildren(GenerateChildrenAction {
                child_count: 2,
                artifact_type_id: 12,
            })),
        ]);

        let messages = WorkflowEventsMessagesHelper::generate_messages(
            &context(PredefinedItemType::Process),
            &triggers,
            &users,
        )
        .await;

        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ActionMessage::GenerateDescendants(_)));
    }

    #[tokio::test]
    async fn property_change_and_webhook_triggers_map_one_to_one() {
        let users = FakeUsers::default();
        let triggers = WorkflowEventTriggers(vec![
            trigger(WorkflowEventAction::PropertyChange(PropertyChangeAction {
                property_type_id: 55,
                property_value: Some("Approved".to_string()),
            })),
            trigger(WorkflowEventAction::Webhook(WebhookAction {
                webhook_id: 77,
                url: Some("https://hooks.example.com/x".to_string()),
                security_info: None,
            })),
        ]);

        let messages = WorkflowEventsMessagesHelper::generate_messages(
            &context(PredefinedItemType::Process),
            &triggers,
            &users,
        )
        .await;

        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ActionMessage::PropertyChange(_)));
        assert!(matches!(messages[1], ActionMessage::Webhook(_)));
    }
}
