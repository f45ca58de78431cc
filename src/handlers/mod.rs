//! # Action Handlers
//!
//! The dispatch side of the pipeline: a common [`ActionHelper`] capability,
//! one implementation per message kind, a [`HandlerRegistry`] mapping action
//! types to helpers, and the [`dispatcher::MessageDispatcher`] that validates
//! and routes every inbound message.
//!
//! ## Helper contract
//!
//! `handle_action` returns `Ok(true)` when work was performed, `Ok(false)`
//! when there was nothing to do (empty input, missing precondition) and an
//! error only when the attempt genuinely failed. A `false` is a successfully
//! processed message, not an error.

pub mod artifacts_changed;
pub mod dispatcher;
pub mod jobs;
pub mod notifications;
pub mod property_change;
pub mod transaction_validator;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatcher::MessageDispatcher;
pub use transaction_validator::TransactionValidator;

use crate::errors::{ActionHandlerError, Result};
use crate::messaging::message::{ActionMessage, MessageActionType};
use crate::repositories::TenantRepositories;
use crate::tenant::TenantInformation;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// One unit of work for one message kind.
#[async_trait]
pub trait ActionHelper: Send + Sync {
    async fn handle_action(
        &self,
        tenant: &TenantInformation,
        message: &ActionMessage,
        repositories: &TenantRepositories,
    ) -> Result<bool>;
}

/// Error for a message routed to a helper of the wrong kind. Indicates a
/// registry wiring mistake, so it is fatal rather than retryable.
pub(crate) fn wrong_variant(helper: &str, message: &ActionMessage) -> ActionHandlerError {
    ActionHandlerError::unsupported_action_type(format!(
        "{helper} cannot handle {} messages",
        message.action_type()
    ))
}

/// Registry mapping message kinds to their action helpers.
pub struct HandlerRegistry {
    helpers: DashMap<MessageActionType, Arc<dyn ActionHelper>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            helpers: DashMap::new(),
        }
    }

    /// Create a registry wired with every built-in helper
    pub fn with_default_helpers() -> Self {
        let registry = Self::new();
        registry.register(
            MessageActionType::Notification,
            Arc::new(notifications::NotificationsActionHelper),
        );
        registry.register(
            MessageActionType::PropertyChange,
            Arc::new(property_change::PropertyChangeActionHelper),
        );
        registry.register(
            MessageActionType::GenerateDescendants,
            Arc::new(jobs::GenerateDescendantsActionHelper),
        );
        registry.register(
            MessageActionType::GenerateTests,
            Arc::new(jobs::GenerateTestsActionHelper),
        );
        registry.register(
            MessageActionType::GenerateUserStories,
            Arc::new(jobs::GenerateUserStoriesActionHelper),
        );
        registry.register(
            MessageActionType::StateTransition,
            Arc::new(jobs::StateTransitionActionHelper),
        );
        registry.register(
            MessageActionType::ArtifactsChanged,
            Arc::new(artifacts_changed::ArtifactsChangedActionHelper),
        );
        let registry_changed = Arc::new(artifacts_changed::RegistryChangedActionHelper);
        registry.register(MessageActionType::ProjectsChanged, registry_changed.clone());
        registry.register(
            MessageActionType::PropertyItemTypesChanged,
            registry_changed.clone(),
        );
        registry.register(
            MessageActionType::UsersGroupsChanged,
            registry_changed.clone(),
        );
        registry.register(MessageActionType::WorkflowsChanged, registry_changed);
        registry.register(
            MessageActionType::Webhooks,
            Arc::new(webhooks::WebhooksActionHelper),
        );
        registry
    }

    /// Register (or replace) the helper for an action type
    pub fn register(&self, action_type: MessageActionType, helper: Arc<dyn ActionHelper>) {
        if self.helpers.insert(action_type, helper).is_some() {
            info!(%action_type, "replaced registered action helper");
        }
    }

    /// Resolve the helper for an action type
    pub fn resolve(&self, action_type: MessageActionType) -> Option<Arc<dyn ActionHelper>> {
        self.helpers
            .get(&action_type)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_default_helpers()
    }
}
