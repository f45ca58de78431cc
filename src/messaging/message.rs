//! # Message Structures for Workflow Actions
//!
//! Defines the wire formats consumed by the dispatcher. Every message carries
//! a `transaction_id` correlating it to the database transaction that raised
//! it; the dispatcher refuses to act until that transaction is confirmed
//! committed.

use crate::errors::{ActionHandlerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Header carrying the tenant identifier on every inbound message
pub const TENANT_ID_HEADER: &str = "TenantId";
/// Header carrying the unique message identifier
pub const MESSAGE_ID_HEADER: &str = "MessageId";
/// Header carrying the publish timestamp
pub const TIME_SENT_HEADER: &str = "TimeSent";

/// Action kinds, one bit each, combined into the `supported_action_types`
/// configuration bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum MessageActionType {
    Notification = 1,
    GenerateDescendants = 2,
    GenerateTests = 4,
    GenerateUserStories = 8,
    StateTransition = 16,
    PropertyChange = 32,
    ArtifactsChanged = 64,
    ProjectsChanged = 128,
    UsersGroupsChanged = 256,
    PropertyItemTypesChanged = 512,
    WorkflowsChanged = 1024,
    Webhooks = 2048,
}

impl MessageActionType {
    /// Bitmask enabling every action kind
    pub const ALL: i64 = 4095;

    /// The bit this action kind occupies in the supported-types bitmask
    pub fn bit(self) -> i64 {
        self as i64
    }
}

impl std::fmt::Display for MessageActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Predefined (built-in) artifact item types relevant to message generation.
///
/// Only Process artifacts are eligible for test-case and user-story
/// generation; the other kinds exist so gating decisions can be expressed
/// and logged by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum PredefinedItemType {
    None = 0,
    TextualRequirement = 4101,
    Actor = 4104,
    UseCase = 4105,
    Glossary = 4109,
    Document = 4110,
    Process = 4114,
}

/// Change kind for the registry-changed message family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

/// A single property modified by the publish that raised a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedProperty {
    pub property_type_id: i32,
    pub name: Option<String>,
    pub value: Option<String>,
}

/// Standard headers attached to every bus message.
///
/// Tenant id and message id are mandatory; a message missing either is
/// undeliverable and must be dead-lettered, never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeaders {
    pub tenant_id: Option<String>,
    pub message_id: Option<String>,
    pub time_sent: Option<DateTime<Utc>>,
    /// Redelivery count maintained by the transport host
    #[serde(default)]
    pub retry_count: u32,
}

impl MessageHeaders {
    /// Create headers for a freshly published message
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            message_id: Some(Uuid::new_v4().to_string()),
            time_sent: Some(Utc::now()),
            retry_count: 0,
        }
    }

    /// Parse headers from a raw string map as delivered by a broker adapter
    pub fn from_map(raw: &HashMap<String, String>) -> Self {
        Self {
            tenant_id: raw.get(TENANT_ID_HEADER).cloned(),
            message_id: raw.get(MESSAGE_ID_HEADER).cloned(),
            time_sent: raw
                .get(TIME_SENT_HEADER)
                .and_then(|v| v.parse::<DateTime<Utc>>().ok()),
            retry_count: 0,
        }
    }

    pub fn require_tenant_id(&self) -> Result<&str> {
        self.tenant_id
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ActionHandlerError::header_not_found(TENANT_ID_HEADER))
    }

    pub fn require_message_id(&self) -> Result<&str> {
        self.message_id
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ActionHandlerError::header_not_found(MESSAGE_ID_HEADER))
    }
}

/// Email notification raised by a workflow trigger or property change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub transaction_id: i64,
    pub revision_id: i64,
    pub user_id: i32,
    pub artifact_id: i64,
    pub artifact_name: Option<String>,
    pub artifact_type_id: i32,
    pub artifact_type_predefined: PredefinedItemType,
    pub artifact_url: Option<String>,
    pub project_id: i64,
    pub project_name: Option<String>,
    pub modified_properties_information: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub from: Option<String>,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub blind_cc: Vec<String>,
    pub header: Option<String>,
}

/// Property-change side effects to apply after the originating publish commits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChangeMessage {
    pub transaction_id: i64,
    pub revision_id: i64,
    pub user_id: i32,
    pub artifact_id: i64,
    pub property_type_id: i32,
    pub is_system_property: bool,
    #[serde(default)]
    pub modified_properties: Vec<ModifiedProperty>,
}

/// Workflow state transition of a single artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransitionMessage {
    pub transaction_id: i64,
    pub revision_id: i64,
    pub user_id: i32,
    pub user_name: Option<String>,
    pub artifact_id: i64,
    pub workflow_id: i32,
    pub from_state_id: i32,
    pub to_state_id: i32,
    pub project_id: i64,
    pub project_name: Option<String>,
}

/// Request to create child artifacts under a published artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateDescendantsMessage {
    pub transaction_id: i64,
    pub revision_id: i64,
    pub user_id: i32,
    pub user_name: Option<String>,
    pub artifact_id: i64,
    pub project_id: i64,
    pub project_name: Option<String>,
    pub desired_artifact_type_id: Option<i32>,
    pub child_count: u32,
    #[serde(default)]
    pub ancestor_artifact_type_ids: Vec<i32>,
    pub base_host_uri: Option<String>,
}

/// Request to generate test cases for a process artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateTestsMessage {
    pub transaction_id: i64,
    pub revision_id: i64,
    pub user_id: i32,
    pub user_name: Option<String>,
    pub artifact_id: i64,
    pub project_id: i64,
    pub project_name: Option<String>,
    pub base_host_uri: Option<String>,
}

/// Request to generate user stories for a process artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateUserStoriesMessage {
    pub transaction_id: i64,
    pub revision_id: i64,
    pub user_id: i32,
    pub user_name: Option<String>,
    pub artifact_id: i64,
    pub project_id: i64,
    pub project_name: Option<String>,
    pub base_host_uri: Option<String>,
}

/// Artifacts created, updated or deleted by a committed publish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactsChangedMessage {
    pub transaction_id: i64,
    pub revision_id: i64,
    pub user_id: i32,
    pub change_type: ChangeType,
    #[serde(default)]
    pub artifact_ids: Vec<i64>,
}

/// Project set changed; downstream caches must revalidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectsChangedMessage {
    pub transaction_id: i64,
    pub revision_id: i64,
    pub change_type: ChangeType,
    #[serde(default)]
    pub project_ids: Vec<i64>,
}

/// Standard property or item types changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyItemTypesChangedMessage {
    pub transaction_id: i64,
    pub revision_id: i64,
    pub change_type: ChangeType,
    #[serde(default)]
    pub item_type_ids: Vec<i64>,
    #[serde(default)]
    pub property_type_ids: Vec<i64>,
}

/// Users or groups changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsersGroupsChangedMessage {
    pub transaction_id: i64,
    pub revision_id: i64,
    pub change_type: ChangeType,
    #[serde(default)]
    pub user_ids: Vec<i64>,
    #[serde(default)]
    pub group_ids: Vec<i64>,
}

/// Workflow definitions changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowsChangedMessage {
    pub transaction_id: i64,
    pub revision_id: i64,
    pub change_type: ChangeType,
    #[serde(default)]
    pub workflow_ids: Vec<i64>,
}

/// Outbound webhook raised by a workflow trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookMessage {
    pub transaction_id: i64,
    pub revision_id: i64,
    pub user_id: i32,
    pub webhook_id: i32,
    pub url: Option<String>,
    /// Serialized authentication information for the target endpoint
    pub security_info: Option<String>,
    pub payload: Option<serde_json::Value>,
}

/// The union of all bus-delivered action messages.
///
/// Internally tagged so adapters can route on `action_type` without
/// deserializing the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type")]
pub enum ActionMessage {
    Notification(NotificationMessage),
    GenerateDescendants(GenerateDescendantsMessage),
    GenerateTests(GenerateTestsMessage),
    GenerateUserStories(GenerateUserStoriesMessage),
    StateTransition(StateTransitionMessage),
    PropertyChange(PropertyChangeMessage),
    ArtifactsChanged(ArtifactsChangedMessage),
    ProjectsChanged(ProjectsChangedMessage),
    UsersGroupsChanged(UsersGroupsChangedMessage),
    PropertyItemTypesChanged(PropertyItemTypesChangedMessage),
    WorkflowsChanged(WorkflowsChangedMessage),
    Webhook(WebhookMessage),
}

impl ActionMessage {
    /// The action kind this message dispatches to
    pub fn action_type(&self) -> MessageActionType {
        match self {
            Self::Notification(_) => MessageActionType::Notification,
            Self::GenerateDescendants(_) => MessageActionType::GenerateDescendants,
            Self::GenerateTests(_) => MessageActionType::GenerateTests,
            Self::GenerateUserStories(_) => MessageActionType::GenerateUserStories,
            Self::StateTransition(_) => MessageActionType::StateTransition,
            Self::PropertyChange(_) => MessageActionType::PropertyChange,
            Self::ArtifactsChanged(_) => MessageActionType::ArtifactsChanged,
            Self::ProjectsChanged(_) => MessageActionType::ProjectsChanged,
            Self::UsersGroupsChanged(_) => MessageActionType::UsersGroupsChanged,
            Self::PropertyItemTypesChanged(_) => MessageActionType::PropertyItemTypesChanged,
            Self::WorkflowsChanged(_) => MessageActionType::WorkflowsChanged,
            Self::Webhook(_) => MessageActionType::Webhooks,
        }
    }

    /// The database transaction this message is correlated to
    pub fn transaction_id(&self) -> i64 {
        match self {
            Self::Notification(m) => m.transaction_id,
            Self::GenerateDescendants(m) => m.transaction_id,
            Self::GenerateTests(m) => m.transaction_id,
            Self::GenerateUserStories(m) => m.transaction_id,
            Self::StateTransition(m) => m.transaction_id,
            Self::PropertyChange(m) => m.transaction_id,
            Self::ArtifactsChanged(m) => m.transaction_id,
            Self::ProjectsChanged(m) => m.transaction_id,
            Self::UsersGroupsChanged(m) => m.transaction_id,
            Self::PropertyItemTypesChanged(m) => m.transaction_id,
            Self::WorkflowsChanged(m) => m.transaction_id,
            Self::Webhook(m) => m.transaction_id,
        }
    }

    /// Convert to JSON for queue storage
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Create from JSON delivered by a queue
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(json)?)
    }
}
