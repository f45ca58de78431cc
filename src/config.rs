use crate::errors::{ActionHandlerError, Result};
use crate::messaging::message::MessageActionType;

/// Process-wide configuration for the action-message handling tier.
///
/// Built once at startup and passed explicitly into the dispatcher and
/// transport host, so independently configured instances can coexist in
/// tests.
#[derive(Debug, Clone)]
pub struct ActionHandlerConfig {
    /// Queue the transport host consumes action messages from
    pub message_queue: String,
    /// Dead-letter queue for messages that can never succeed
    pub error_queue: String,
    /// Maximum concurrent handler invocations
    pub max_concurrency: usize,
    /// Redeliveries allowed for a message before it is dead-lettered
    pub max_message_retries: u32,
    /// Tenant cache lifetime in minutes; zero disables caching
    pub cache_expiration_minutes: u64,
    /// Bitmask over [`MessageActionType`] bits enabling action kinds
    pub supported_action_types: i64,
    /// Maximum transaction-status polling attempts per message
    pub transaction_tries_max: u32,
    pub transaction_backoff_base_ms: u64,
    pub transaction_backoff_max_ms: u64,
    /// Connection string for the central tenants database
    pub database_url: String,
}

impl Default for ActionHandlerConfig {
    fn default() -> Self {
        Self {
            message_queue: "actions_queue".to_string(),
            error_queue: "actions_error_queue".to_string(),
            max_concurrency: 10,
            max_message_retries: 5,
            cache_expiration_minutes: 60,
            supported_action_types: MessageActionType::ALL,
            transaction_tries_max: 10,
            transaction_backoff_base_ms: 1000,
            transaction_backoff_max_ms: 60000,
            database_url: "postgresql://localhost/tenants_development".to_string(),
        }
    }
}

impl ActionHandlerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(queue) = std::env::var("ACTION_HANDLER_MESSAGE_QUEUE") {
            config.message_queue = queue;
        }

        if let Ok(queue) = std::env::var("ACTION_HANDLER_ERROR_QUEUE") {
            config.error_queue = queue;
        }

        if let Ok(value) = std::env::var("ACTION_HANDLER_MAX_CONCURRENCY") {
            config.max_concurrency = value.parse().map_err(|e| {
                ActionHandlerError::configuration("max_concurrency", format!("invalid value: {e}"))
            })?;
        }

        if let Ok(value) = std::env::var("ACTION_HANDLER_MAX_MESSAGE_RETRIES") {
            config.max_message_retries = value.parse().map_err(|e| {
                ActionHandlerError::configuration(
                    "max_message_retries",
                    format!("invalid value: {e}"),
                )
            })?;
        }

        if let Ok(value) = std::env::var("ACTION_HANDLER_CACHE_EXPIRATION_MINUTES") {
            config.cache_expiration_minutes = value.parse().map_err(|e| {
                ActionHandlerError::configuration(
                    "cache_expiration_minutes",
                    format!("invalid value: {e}"),
                )
            })?;
        }

        if let Ok(value) = std::env::var("ACTION_HANDLER_SUPPORTED_ACTION_TYPES") {
            config.supported_action_types = value.parse().map_err(|e| {
                ActionHandlerError::configuration(
                    "supported_action_types",
                    format!("invalid bitmask: {e}"),
                )
            })?;
        }

        if let Ok(value) = std::env::var("ACTION_HANDLER_TRANSACTION_TRIES_MAX") {
            config.transaction_tries_max = value.parse().map_err(|e| {
                ActionHandlerError::configuration(
                    "transaction_tries_max",
                    format!("invalid value: {e}"),
                )
            })?;
        }

        if let Ok(value) = std::env::var("ACTION_HANDLER_TRANSACTION_BACKOFF_BASE_MS") {
            config.transaction_backoff_base_ms = value.parse().map_err(|e| {
                ActionHandlerError::configuration(
                    "transaction_backoff_base_ms",
                    format!("invalid value: {e}"),
                )
            })?;
        }

        if let Ok(value) = std::env::var("ACTION_HANDLER_TRANSACTION_BACKOFF_MAX_MS") {
            config.transaction_backoff_max_ms = value.parse().map_err(|e| {
                ActionHandlerError::configuration(
                    "transaction_backoff_max_ms",
                    format!("invalid value: {e}"),
                )
            })?;
        }

        Ok(config)
    }

    /// Whether the given action type bit is set in the supported bitmask.
    pub fn is_action_type_supported(&self, action_type: MessageActionType) -> bool {
        self.supported_action_types & action_type.bit() != 0
    }
}
