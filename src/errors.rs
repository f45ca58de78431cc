//! # Error Types
//!
//! Structured error handling for the action-message pipeline using thiserror
//! for typed errors instead of `Box<dyn Error>` patterns.
//!
//! Errors split into two families that the transport host treats differently:
//!
//! - **Fatal** errors mean the message can never succeed (missing headers,
//!   unsupported action type, unknown tenant). These go to the error queue.
//! - **Transient** errors mean the message may succeed later (repository
//!   timeout, transport hiccup). These are redelivered by the host.

use thiserror::Error;

/// Errors produced while receiving, validating and dispatching action messages.
#[derive(Error, Debug)]
pub enum ActionHandlerError {
    #[error("Header value not found: {header}")]
    HeaderNotFound { header: String },

    #[error("Unsupported action type: {action_type} is not enabled in supported_action_types")]
    UnsupportedActionType { action_type: String },

    #[error("Entity not found: {entity}: {reason}")]
    EntityNotFound { entity: String, reason: String },

    #[error("Configuration error: {setting}: {message}")]
    Configuration { setting: String, message: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Repository error: {operation}: {message}")]
    Repository { operation: String, message: String },

    #[error("Transport error: {queue_name}: {operation}: {message}")]
    Transport {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("Shutting down: {operation} aborted")]
    ShuttingDown { operation: String },
}

impl ActionHandlerError {
    /// Create a header-not-found error for a required message header
    pub fn header_not_found(header: impl Into<String>) -> Self {
        Self::HeaderNotFound {
            header: header.into(),
        }
    }

    /// Create an unsupported-action-type error
    pub fn unsupported_action_type(action_type: impl Into<String>) -> Self {
        Self::UnsupportedActionType {
            action_type: action_type.into(),
        }
    }

    /// Create an entity-not-found error
    pub fn entity_not_found(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(setting: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            setting: setting.into(),
            message: message.into(),
        }
    }

    /// Create a message serialization error
    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    /// Create a repository error
    pub fn repository(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Repository {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a shutting-down error
    pub fn shutting_down(operation: impl Into<String>) -> Self {
        Self::ShuttingDown {
            operation: operation.into(),
        }
    }

    /// Whether this error is fatal for the message being processed.
    ///
    /// Fatal errors are dead-lettered by the transport host; everything else
    /// is eligible for redelivery.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HeaderNotFound { .. }
                | Self::UnsupportedActionType { .. }
                | Self::EntityNotFound { .. }
                | Self::Configuration { .. }
                | Self::MessageSerialization { .. }
        )
    }
}

impl From<serde_json::Error> for ActionHandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::message_serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ActionHandlerError>;
