//! # SQL Repository Implementations
//!
//! sqlx-backed implementations of the repository traits. Each tenant gets a
//! lazily connected pool keyed by tenant id; the handlers above this layer
//! stay trait-only and never see SQL.

use crate::errors::{ActionHandlerError, Result};
use crate::messaging::message::{ChangeType, PropertyChangeMessage, WebhookMessage};
use crate::repositories::{
    AddJobMessage, ArtifactsRepository, BaseRepository, EmailSettings, JobsRepository,
    NotificationRepository, OutgoingEmail, RegistryChangeKind, SmtpClientConfig,
    TenantRepositories, TenantRepositoryFactory, TenantsRepository, TransactionStatus, UserInfo,
    UsersRepository, WebhooksRepository,
};
use crate::tenant::TenantInformation;
use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::debug;

fn query_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> ActionHandlerError {
    move |err| ActionHandlerError::repository(operation, err.to_string())
}

/// Central tenants store
pub struct SqlTenantsRepository {
    pool: PgPool,
}

impl SqlTenantsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantsRepository for SqlTenantsRepository {
    async fn get_tenants(&self) -> Result<Vec<TenantInformation>> {
        sqlx::query_as::<_, TenantInformation>(
            r"SELECT tenant_id, tenant_name, connection_string, package_name,
                     package_level, start_date, expiration_date
              FROM tenants",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_error("get_tenants"))
    }
}

/// Transaction-status store on a tenant database
pub struct SqlBaseRepository {
    pool: PgPool,
}

impl SqlBaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseRepository for SqlBaseRepository {
    async fn get_transaction_status(&self, transaction_id: i64) -> Result<TransactionStatus> {
        let status: Option<i32> =
            sqlx::query_scalar(r"SELECT status FROM transactions WHERE transaction_id = $1")
                .bind(transaction_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error("get_transaction_status"))?;

        match status {
            // Not visible yet: the publish may still be in flight.
            None => Ok(TransactionStatus::Uncommitted),
            Some(value) => TransactionStatus::try_from(value),
        }
    }
}

/// Background job queue on a tenant database
pub struct SqlJobsRepository {
    pool: PgPool,
}

impl SqlJobsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobsRepository for SqlJobsRepository {
    async fn add_job_message(&self, job: AddJobMessage) -> Result<Option<i64>> {
        let job_id: i64 = sqlx::query_scalar(
            r"INSERT INTO job_messages
                  (job_type, user_id, user_name, project_id, project_name,
                   host_uri, parameters, submitted_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, now())
              RETURNING job_message_id",
        )
        .bind(job.job_type.to_string())
        .bind(job.user_id)
        .bind(&job.user_name)
        .bind(job.project_id)
        .bind(&job.project_name)
        .bind(&job.host_uri)
        .bind(&job.parameters)
        .fetch_one(&self.pool)
        .await
        .map_err(query_error("add_job_message"))?;

        Ok(Some(job_id))
    }
}

/// Tenant user directory
pub struct SqlUsersRepository {
    pool: PgPool,
}

impl SqlUsersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsersRepository for SqlUsersRepository {
    async fn get_existing_users_by_ids(&self, ids: &[i32]) -> Result<Vec<UserInfo>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, UserInfo>(
            r"SELECT user_id, user_name, email FROM users WHERE user_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error("get_existing_users_by_ids"))
    }
}

/// Tenant notification store. Outgoing mail is queued into the tenant's mail
/// spool table; the SMTP relay drains it out of process.
pub struct SqlNotificationRepository {
    pool: PgPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn get_email_settings(&self) -> Result<Option<EmailSettings>> {
        sqlx::query_as::<_, EmailSettings>(
            r"SELECT host_name, port, enable_ssl, authenticated_smtp,
                     user_name, password, sender_email_address
              FROM email_settings
              LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error("get_email_settings"))
    }

    async fn send_email(&self, smtp: &SmtpClientConfig, email: &OutgoingEmail) -> Result<()> {
        sqlx::query(
            r"INSERT INTO outgoing_emails
                  (recipients, cc, blind_cc, sender, subject, body, is_html,
                   smtp_host, smtp_port, queued_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())",
        )
        .bind(&email.to)
        .bind(&email.cc)
        .bind(&email.blind_cc)
        .bind(&email.from)
        .bind(&email.subject)
        .bind(&email.body)
        .bind(email.is_html)
        .bind(&smtp.host)
        .bind(i32::from(smtp.port))
        .execute(&self.pool)
        .await
        .map_err(query_error("send_email"))?;
        Ok(())
    }
}

/// Tenant artifact store: property-change log and change feeds
pub struct SqlArtifactsRepository {
    pool: PgPool,
}

impl SqlArtifactsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactsRepository for SqlArtifactsRepository {
    async fn apply_property_change(&self, change: &PropertyChangeMessage) -> Result<()> {
        let properties = serde_json::to_value(&change.modified_properties)?;
        sqlx::query(
            r"INSERT INTO property_change_log
                  (artifact_id, revision_id, user_id, property_type_id,
                   is_system_property, properties, applied_at)
              VALUES ($1, $2, $3, $4, $5, $6, now())",
        )
        .bind(change.artifact_id)
        .bind(change.revision_id)
        .bind(change.user_id)
        .bind(change.property_type_id)
        .bind(change.is_system_property)
        .bind(&properties)
        .execute(&self.pool)
        .await
        .map_err(query_error("apply_property_change"))?;
        Ok(())
    }

    async fn queue_artifacts_changed(&self, change_type: ChangeType, ids: &[i64]) -> Result<()> {
        sqlx::query(
            r"INSERT INTO artifact_change_feed (change_type, artifact_ids, queued_at)
              VALUES ($1, $2, now())",
        )
        .bind(format!("{change_type:?}"))
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(query_error("queue_artifacts_changed"))?;
        Ok(())
    }

    async fn queue_registry_changed(
        &self,
        kind: RegistryChangeKind,
        change_type: ChangeType,
        ids: &[i64],
    ) -> Result<()> {
        sqlx::query(
            r"INSERT INTO registry_change_feed (kind, change_type, entity_ids, queued_at)
              VALUES ($1, $2, $3, now())",
        )
        .bind(format!("{kind:?}"))
        .bind(format!("{change_type:?}"))
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(query_error("queue_registry_changed"))?;
        Ok(())
    }
}

/// Outbound webhook queue on a tenant database
pub struct SqlWebhooksRepository {
    pool: PgPool,
}

impl SqlWebhooksRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhooksRepository for SqlWebhooksRepository {
    async fn queue_webhook(&self, message: &WebhookMessage) -> Result<()> {
        sqlx::query(
            r"INSERT INTO webhook_queue (webhook_id, url, security_info, payload, queued_at)
              VALUES ($1, $2, $3, $4, now())",
        )
        .bind(message.webhook_id)
        .bind(&message.url)
        .bind(&message.security_info)
        .bind(&message.payload)
        .execute(&self.pool)
        .await
        .map_err(query_error("queue_webhook"))?;
        Ok(())
    }
}

/// Builds the sqlx repository bundle for a tenant, keeping one lazily
/// connected pool per tenant id.
pub struct SqlTenantRepositoryFactory {
    pools: DashMap<String, PgPool>,
}

impl SqlTenantRepositoryFactory {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    fn pool_for(&self, tenant: &TenantInformation) -> Result<PgPool> {
        if let Some(pool) = self.pools.get(&tenant.tenant_id) {
            return Ok(pool.clone());
        }

        let pool = PgPool::connect_lazy(&tenant.connection_string).map_err(|err| {
            ActionHandlerError::repository(
                "connect_tenant_database",
                format!("tenant {}: {err}", tenant.tenant_id),
            )
        })?;
        debug!(tenant_id = %tenant.tenant_id, "created tenant connection pool");
        self.pools.insert(tenant.tenant_id.clone(), pool.clone());
        Ok(pool)
    }
}

impl Default for SqlTenantRepositoryFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantRepositoryFactory for SqlTenantRepositoryFactory {
    fn create(&self, tenant: &TenantInformation) -> Result<TenantRepositories> {
        let pool = self.pool_for(tenant)?;
        Ok(TenantRepositories {
            base: Arc::new(SqlBaseRepository::new(pool.clone())),
            jobs: Arc::new(SqlJobsRepository::new(pool.clone())),
            users: Arc::new(SqlUsersRepository::new(pool.clone())),
            notifications: Arc::new(SqlNotificationRepository::new(pool.clone())),
            artifacts: Arc::new(SqlArtifactsRepository::new(pool.clone())),
            webhooks: Arc::new(SqlWebhooksRepository::new(pool)),
        })
    }
}
