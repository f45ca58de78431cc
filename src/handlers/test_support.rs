//! Hand-rolled fakes shared by the handler tests: recording repositories,
//! a scripted transaction-status store and a counting action helper.

use crate::errors::{ActionHandlerError, Result};
use crate::messaging::message::{ActionMessage, ChangeType, PropertyChangeMessage, WebhookMessage};
use crate::repositories::{
    AddJobMessage, ArtifactsRepository, BaseRepository, EmailSettings, JobsRepository,
    NotificationRepository, OutgoingEmail, RegistryChangeKind, SmtpClientConfig,
    TenantRepositories, TenantRepositoryFactory, TenantsRepository, TransactionStatus, UserInfo,
    UsersRepository, WebhooksRepository,
};
use crate::tenant::TenantInformation;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn tenant(id: &str) -> TenantInformation {
    TenantInformation {
        tenant_id: id.to_string(),
        tenant_name: format!("{id} inc"),
        connection_string: format!("postgresql://db/{id}"),
        package_name: "enterprise".to_string(),
        package_level: 3,
        start_date: Utc::now(),
        expiration_date: None,
    }
}

pub struct ScriptedBase {
    statuses: Mutex<Vec<TransactionStatus>>,
    pub calls: AtomicUsize,
}

impl ScriptedBase {
    pub fn returning(statuses: Vec<TransactionStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BaseRepository for ScriptedBase {
    async fn get_transaction_status(&self, _transaction_id: i64) -> Result<TransactionStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock();
        if statuses.len() > 1 {
            Ok(statuses.remove(0))
        } else {
            Ok(statuses[0])
        }
    }
}

#[derive(Default)]
pub struct RecordingJobs {
    pub jobs: Mutex<Vec<AddJobMessage>>,
}

#[async_trait]
impl JobsRepository for RecordingJobs {
    async fn add_job_message(&self, job: AddJobMessage) -> Result<Option<i64>> {
        let mut jobs = self.jobs.lock();
        jobs.push(job);
        Ok(Some(jobs.len() as i64))
    }
}

#[derive(Default)]
pub struct FakeUsers {
    pub users: Mutex<Vec<UserInfo>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl UsersRepository for FakeUsers {
    async fn get_existing_users_by_ids(&self, ids: &[i32]) -> Result<Vec<UserInfo>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ActionHandlerError::repository(
                "get_existing_users_by_ids",
                "simulated failure",
            ));
        }
        Ok(self
            .users
            .lock()
            .iter()
            .filter(|user| ids.contains(&user.user_id))
            .cloned()
            .collect())
    }
}

pub struct RecordingNotifications {
    pub settings: Mutex<Option<EmailSettings>>,
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingNotifications {
    pub fn with_settings(settings: Option<EmailSettings>) -> Self {
        Self {
            settings: Mutex::new(settings),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl NotificationRepository for RecordingNotifications {
    async fn get_email_settings(&self) -> Result<Option<EmailSettings>> {
        Ok(self.settings.lock().clone())
    }

    async fn send_email(&self, _smtp: &SmtpClientConfig, email: &OutgoingEmail) -> Result<()> {
        self.sent.lock().push(email.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingArtifacts {
    pub property_changes: Mutex<Vec<PropertyChangeMessage>>,
    pub artifacts_changed: Mutex<Vec<(ChangeType, Vec<i64>)>>,
    pub registry_changed: Mutex<Vec<(RegistryChangeKind, ChangeType, Vec<i64>)>>,
}

#[async_trait]
impl ArtifactsRepository for RecordingArtifacts {
    async fn apply_property_change(&self, change: &PropertyChangeMessage) -> Result<()> {
        self.property_changes.lock().push(change.clone());
        Ok(())
    }

    async fn queue_artifacts_changed(&self, change_type: ChangeType, ids: &[i64]) -> Result<()> {
        self.artifacts_changed.lock().push((change_type, ids.to_vec()));
        Ok(())
    }

    async fn queue_registry_changed(
        &self,
        kind: RegistryChangeKind,
        change_type: ChangeType,
        ids: &[i64],
    ) -> Result<()> {
        self.registry_changed
            .lock()
            .push((kind, change_type, ids.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingWebhooks {
    pub queued: Mutex<Vec<WebhookMessage>>,
}

#[async_trait]
impl WebhooksRepository for RecordingWebhooks {
    async fn queue_webhook(&self, message: &WebhookMessage) -> Result<()> {
        self.queued.lock().push(message.clone());
        Ok(())
    }
}

/// All recording fakes for one tenant, plus the bundle handlers consume.
pub struct RecordingRepositories {
    pub base: Arc<ScriptedBase>,
    pub jobs: Arc<RecordingJobs>,
    pub users: Arc<FakeUsers>,
    pub notifications: Arc<RecordingNotifications>,
    pub artifacts: Arc<RecordingArtifacts>,
    pub webhooks: Arc<RecordingWebhooks>,
}

impl RecordingRepositories {
    pub fn new() -> Self {
        Self::with_statuses(vec![TransactionStatus::Committed])
    }

    pub fn with_statuses(statuses: Vec<TransactionStatus>) -> Self {
        Self {
            base: Arc::new(ScriptedBase::returning(statuses)),
            jobs: Arc::new(RecordingJobs::default()),
            users: Arc::new(FakeUsers::default()),
            notifications: Arc::new(RecordingNotifications::with_settings(Some(
                email_settings("smtp.example.com"),
            ))),
            artifacts: Arc::new(RecordingArtifacts::default()),
            webhooks: Arc::new(RecordingWebhooks::default()),
        }
    }

    pub fn bundle(&self) -> TenantRepositories {
        TenantRepositories {
            base: self.base.clone(),
            jobs: self.jobs.clone(),
            users: self.users.clone(),
            notifications: self.notifications.clone(),
            artifacts: self.artifacts.clone(),
            webhooks: self.webhooks.clone(),
        }
    }
}

pub fn email_settings(host: &str) -> EmailSettings {
    EmailSettings {
        host_name: Some(host.to_string()),
        port: 587,
        enable_ssl: true,
        authenticated_smtp: true,
        user_name: Some("mailer".to_string()),
        password: Some("secret".to_string()),
        sender_email_address: Some("noreply@example.com".to_string()),
    }
}

/// Factory handing every tenant the same recording bundle.
pub struct FakeRepositoryFactory {
    pub repositories: Arc<RecordingRepositories>,
}

impl TenantRepositoryFactory for FakeRepositoryFactory {
    fn create(&self, _tenant: &TenantInformation) -> Result<TenantRepositories> {
        Ok(self.repositories.bundle())
    }
}

/// Tenants store returning a fixed set.
pub struct FakeTenants {
    pub tenants: Vec<TenantInformation>,
}

#[async_trait]
impl TenantsRepository for FakeTenants {
    async fn get_tenants(&self) -> Result<Vec<TenantInformation>> {
        Ok(self.tenants.clone())
    }
}

/// Helper that records invocations and succeeds.
#[derive(Default)]
pub struct CountingHelper {
    pub calls: AtomicUsize,
}

#[async_trait]
impl super::ActionHelper for CountingHelper {
    async fn handle_action(
        &self,
        _tenant: &TenantInformation,
        _message: &ActionMessage,
        _repositories: &TenantRepositories,
    ) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}
