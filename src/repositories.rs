//! # Repository Interfaces
//!
//! Narrow, trait-shaped seams over the tenant-scoped SQL stores. Handlers
//! only ever see these traits; the concrete sqlx implementations live in
//! [`crate::database`] and fakes live next to the tests that use them.

use crate::errors::{ActionHandlerError, Result};
use crate::messaging::message::{ChangeType, PropertyChangeMessage, WebhookMessage};
use crate::tenant::TenantInformation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Commit state of the database transaction that raised a message.
///
/// Polled, never stored; transient per-message state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum TransactionStatus {
    Uncommitted = 0,
    Committed = 1,
    RolledBack = 2,
}

impl TryFrom<i32> for TransactionStatus {
    type Error = ActionHandlerError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Uncommitted),
            1 => Ok(Self::Committed),
            2 => Ok(Self::RolledBack),
            other => Err(ActionHandlerError::repository(
                "get_transaction_status",
                format!("unknown transaction status value: {other}"),
            )),
        }
    }
}

/// Job kinds accepted by the background job queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    GenerateDescendants,
    GenerateProcessTests,
    GenerateUserStories,
    WorkflowTransition,
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Registry domains covered by the *Changed message family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryChangeKind {
    Projects,
    PropertyItemTypes,
    UsersGroups,
    Workflows,
}

/// Per-tenant SMTP configuration, fetched fresh before every send
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct EmailSettings {
    pub host_name: Option<String>,
    pub port: i32,
    pub enable_ssl: bool,
    pub authenticated_smtp: bool,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub sender_email_address: Option<String>,
}

/// SMTP client parameters derived from [`EmailSettings`]
#[derive(Debug, Clone, PartialEq)]
pub struct SmtpClientConfig {
    pub host: String,
    pub port: u16,
    pub enable_ssl: bool,
    pub authenticated: bool,
    pub user_name: String,
    pub password: String,
    pub sender: String,
}

impl SmtpClientConfig {
    /// Build a client config from tenant settings.
    ///
    /// Returns `None` when the host name is missing or blank, or when the
    /// stored port is outside the valid range. Callers treat both as "email
    /// not configured for this tenant" rather than an error.
    pub fn from_settings(settings: &EmailSettings) -> Option<Self> {
        let host = settings.host_name.as_deref()?.trim();
        if host.is_empty() {
            return None;
        }
        let port = u16::try_from(settings.port).ok()?;
        Some(Self {
            host: host.to_string(),
            port,
            enable_ssl: settings.enable_ssl,
            authenticated: settings.authenticated_smtp,
            user_name: settings.user_name.clone().unwrap_or_default(),
            password: settings.password.clone().unwrap_or_default(),
            sender: settings.sender_email_address.clone().unwrap_or_default(),
        })
    }
}

/// A rendered email handed to the notification store for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub blind_cc: Vec<String>,
    pub from: String,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

/// User row as looked up for email-notification recipients
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: i32,
    pub user_name: String,
    pub email: Option<String>,
}

/// Job-queue insert parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddJobMessage {
    pub job_type: JobType,
    pub user_id: i32,
    pub user_name: Option<String>,
    pub project_id: i64,
    pub project_name: Option<String>,
    pub host_uri: Option<String>,
    pub parameters: serde_json::Value,
}

/// Central tenants store
#[async_trait]
pub trait TenantsRepository: Send + Sync {
    /// Load the full tenant set in one call; no incremental refresh.
    async fn get_tenants(&self) -> Result<Vec<TenantInformation>>;
}

/// Transaction-status store scoped to a tenant database
#[async_trait]
pub trait BaseRepository: Send + Sync {
    async fn get_transaction_status(&self, transaction_id: i64) -> Result<TransactionStatus>;
}

/// Background job queue scoped to a tenant database
#[async_trait]
pub trait JobsRepository: Send + Sync {
    /// Enqueue a job record, returning its id when the store assigns one.
    async fn add_job_message(&self, job: AddJobMessage) -> Result<Option<i64>>;
}

/// Tenant user directory
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn get_existing_users_by_ids(&self, ids: &[i32]) -> Result<Vec<UserInfo>>;
}

/// Tenant notification (email) store
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn get_email_settings(&self) -> Result<Option<EmailSettings>>;
    async fn send_email(&self, smtp: &SmtpClientConfig, email: &OutgoingEmail) -> Result<()>;
}

/// Tenant artifact store: property-change side effects and change feeds
#[async_trait]
pub trait ArtifactsRepository: Send + Sync {
    async fn apply_property_change(&self, change: &PropertyChangeMessage) -> Result<()>;
    async fn queue_artifacts_changed(&self, change_type: ChangeType, ids: &[i64]) -> Result<()>;
    async fn queue_registry_changed(
        &self,
        kind: RegistryChangeKind,
        change_type: ChangeType,
        ids: &[i64],
    ) -> Result<()>;
}

/// Outbound webhook queue scoped to a tenant database
#[async_trait]
pub trait WebhooksRepository: Send + Sync {
    async fn queue_webhook(&self, message: &WebhookMessage) -> Result<()>;
}

/// The repository bundle a handler invocation works against, all scoped to
/// one tenant's database.
#[derive(Clone)]
pub struct TenantRepositories {
    pub base: Arc<dyn BaseRepository>,
    pub jobs: Arc<dyn JobsRepository>,
    pub users: Arc<dyn UsersRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub artifacts: Arc<dyn ArtifactsRepository>,
    pub webhooks: Arc<dyn WebhooksRepository>,
}

/// Maps a resolved tenant to its repository bundle.
///
/// The sqlx implementation keeps one lazy connection pool per tenant; tests
/// substitute fakes.
pub trait TenantRepositoryFactory: Send + Sync {
    fn create(&self, tenant: &TenantInformation) -> Result<TenantRepositories>;
}
