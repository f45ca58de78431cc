//! # Workflow Event Triggers
//!
//! Trigger definitions attached to a workflow state-transition event. Each
//! trigger carries one configured action; evaluating the collection produces
//! zero or more outbound action messages.

use serde::{Deserialize, Serialize};

/// Email notification configured on a transition.
///
/// Recipients are either the literal `emails` list or, when
/// `property_type_id` is set, the users stored in that associated-user
/// property on the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailNotificationAction {
    #[serde(default)]
    pub emails: Vec<String>,
    pub property_type_id: Option<i32>,
    pub message: Option<String>,
}

/// Create child artifacts of a given type under the transitioning artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateChildrenAction {
    pub child_count: u32,
    pub artifact_type_id: i32,
}

/// Overwrite one property on the transitioning artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChangeAction {
    pub property_type_id: i32,
    pub property_value: Option<String>,
}

/// Call out to an external endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookAction {
    pub webhook_id: i32,
    pub url: Option<String>,
    pub security_info: Option<String>,
}

/// The action variant configured on one trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WorkflowEventAction {
    EmailNotification(EmailNotificationAction),
    GenerateChildren(GenerateChildrenAction),
    GenerateTestCases,
    GenerateUserStories,
    PropertyChange(PropertyChangeAction),
    Webhook(WebhookAction),
}

/// One configured trigger on a state-transition event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEventTrigger {
    pub name: Option<String>,
    pub action: WorkflowEventAction,
}

/// Ordered collection of triggers, evaluated once per triggering event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEventTriggers(pub Vec<WorkflowEventTrigger>);

impl WorkflowEventTriggers {
    pub fn iter(&self) -> std::slice::Iter<'_, WorkflowEventTrigger> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
