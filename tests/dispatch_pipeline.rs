//! End-to-end pipeline test: in-memory transport, transport host, dispatcher
//! and action helpers wired together against fake repositories.

use action_handler_core::config::ActionHandlerConfig;
use action_handler_core::errors::Result;
use action_handler_core::handlers::{ActionHelper, HandlerRegistry, MessageDispatcher};
use action_handler_core::messaging::message::{
    ActionMessage, ChangeType, GenerateTestsMessage, MessageActionType, MessageHeaders,
    PropertyChangeMessage, WebhookMessage,
};
use action_handler_core::repositories::{
    AddJobMessage, ArtifactsRepository, BaseRepository, EmailSettings, JobsRepository,
    NotificationRepository, OutgoingEmail, RegistryChangeKind, SmtpClientConfig,
    TenantRepositories, TenantRepositoryFactory, TenantsRepository, TransactionStatus, UserInfo,
    UsersRepository, WebhooksRepository,
};
use action_handler_core::tenant::{TenantInfoRetriever, TenantInformation};
use action_handler_core::transport::{InMemoryTransport, MessageTransport, TransportHost};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn tenant(id: &str) -> TenantInformation {
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

struct FixedTenants(Vec<TenantInformation>);

#[async_trait]
impl TenantsRepository for FixedTenants {
    async fn get_tenants(&self) -> Result<Vec<TenantInformation>> {
        Ok(self.0.clone())
    }
}

struct CommittedBase;

#[async_trait]
impl BaseRepository for CommittedBase {
    async fn get_transaction_status(&self, _transaction_id: i64) -> Result<TransactionStatus> {
        Ok(TransactionStatus::Committed)
    }
}

#[derive(Default)]
struct RecordingJobs {
    jobs: Mutex<Vec<AddJobMessage>>,
}

#[async_trait]
impl JobsRepository for RecordingJobs {
    async fn add_job_message(&self, job: AddJobMessage) -> Result<Option<i64>> {
        let mut jobs = self.jobs.lock();
        jobs.push(job);
        Ok(Some(jobs.len() as i64))
    }
}

struct NoUsers;

#[async_trait]
impl UsersRepository for NoUsers {
    async fn get_existing_users_by_ids(&self, _ids: &[i32]) -> Result<Vec<UserInfo>> {
        Ok(Vec::new())
    }
}

struct NoNotifications;

#[async_trait]
impl NotificationRepository for NoNotifications {
    async fn get_email_settings(&self) -> Result<Option<EmailSettings>> {
        Ok(None)
    }

    async fn send_email(&self, _smtp: &SmtpClientConfig, _email: &OutgoingEmail) -> Result<()> {
        Ok(())
    }
}

struct NoArtifacts;

#[async_trait]
impl ArtifactsRepository for NoArtifacts {
    async fn apply_property_change(&self, _change: &PropertyChangeMessage) -> Result<()> {
        Ok(())
    }

    async fn queue_artifacts_changed(&self, _change_type: ChangeType, _ids: &[i64]) -> Result<()> {
        Ok(())
    }

    async fn queue_registry_changed(
        &self,
        _kind: RegistryChangeKind,
        _change_type: ChangeType,
        _ids: &[i64],
    ) -> Result<()> {
        Ok(())
    }
}

struct NoWebhooks;

#[async_trait]
impl WebhooksRepository for NoWebhooks {
    async fn queue_webhook(&self, _message: &WebhookMessage) -> Result<()> {
        Ok(())
    }
}

struct FakeFactory {
    jobs: Arc<RecordingJobs>,
}

impl TenantRepositoryFactory for FakeFactory {
    fn create(&self, _tenant: &TenantInformation) -> Result<TenantRepositories> {
        Ok(TenantRepositories {
            base: Arc::new(CommittedBase),
            jobs: self.jobs.clone(),
            users: Arc::new(NoUsers),
            notifications: Arc::new(NoNotifications),
            artifacts: Arc::new(NoArtifacts),
            webhooks: Arc::new(NoWebhooks),
        })
    }
}

struct Pipeline {
    host: TransportHost,
    transport: Arc<InMemoryTransport>,
    jobs: Arc<RecordingJobs>,
    config: ActionHandlerConfig,
}

fn pipeline() -> Pipeline {
    let config = ActionHandlerConfig {
        transaction_tries_max: 2,
        transaction_backoff_base_ms: 1,
        transaction_backoff_max_ms: 2,
        max_message_retries: 1,
        ..Default::default()
    };

    let jobs = Arc::new(RecordingJobs::default());
    let tenant_info = Arc::new(TenantInfoRetriever::new(
        Arc::new(FixedTenants(vec![tenant("tenant0")])),
        60,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = Arc::new(MessageDispatcher::new(
        config.clone(),
        tenant_info,
        Arc::new(HandlerRegistry::with_default_helpers()),
        Arc::new(FakeFactory { jobs: jobs.clone() }),
        shutdown_rx,
    ));

    let transport = Arc::new(InMemoryTransport::new());
    let host = TransportHost::new(transport.clone(), dispatcher, config.clone(), shutdown_tx);

    Pipeline {
        host,
        transport,
        jobs,
        config,
    }
}

fn tests_message() -> ActionMessage {
    ActionMessage::GenerateTests(GenerateTestsMessage {
        transaction_id: 42,
        revision_id: 7,
        user_id: 3,
        user_name: None,
        artifact_id: 100,
        project_id: 9,
        project_name: None,
        base_host_uri: None,
    })
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn committed_message_flows_through_to_a_job_record() {
    let pipeline = pipeline();
    let receive_loop = pipeline.host.start().await.unwrap();

    pipeline
        .transport
        .send(
            &pipeline.config.message_queue,
            &tests_message(),
            &MessageHeaders::new("tenant0"),
        )
        .await
        .unwrap();

    let jobs = pipeline.jobs.clone();
    wait_until(move || !jobs.jobs.lock().is_empty()).await;

    pipeline.host.stop();
    receive_loop.await.unwrap();

    let jobs = pipeline.jobs.jobs.lock();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].user_id, 3);
}

#[tokio::test]
async fn message_without_tenant_header_is_dead_lettered() {
    let pipeline = pipeline();
    let mut error_queue = pipeline
        .transport
        .subscribe(&pipeline.config.error_queue)
        .await
        .unwrap();
    let receive_loop = pipeline.host.start().await.unwrap();

    let mut headers = MessageHeaders::new("tenant0");
    headers.tenant_id = None;
    pipeline
        .transport
        .send(&pipeline.config.message_queue, &tests_message(), &headers)
        .await
        .unwrap();

    let dead_lettered = tokio::time::timeout(Duration::from_secs(5), error_queue.recv())
        .await
        .expect("dead letter not observed")
        .expect("error queue closed");
    assert_eq!(dead_lettered.message, tests_message());
    assert!(pipeline.jobs.jobs.lock().is_empty());

    pipeline.host.stop();
    receive_loop.await.unwrap();
}

struct SlowHelper {
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

#[async_trait]
impl ActionHelper for SlowHelper {
    async fn handle_action(
        &self,
        _tenant: &TenantInformation,
        _message: &ActionMessage,
        _repositories: &TenantRepositories,
    ) -> Result<bool> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

#[tokio::test]
async fn stop_waits_for_in_flight_handler_work() {
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let config = ActionHandlerConfig {
        transaction_tries_max: 2,
        transaction_backoff_base_ms: 1,
        transaction_backoff_max_ms: 2,
        max_message_retries: 1,
        ..Default::default()
    };
    let jobs = Arc::new(RecordingJobs::default());
    let tenant_info = Arc::new(TenantInfoRetriever::new(
        Arc::new(FixedTenants(vec![tenant("tenant0")])),
        60,
    ));

    let registry = HandlerRegistry::new();
    registry.register(
        MessageActionType::GenerateTests,
        Arc::new(SlowHelper {
            started: started.clone(),
            finished: finished.clone(),
        }),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = Arc::new(MessageDispatcher::new(
        config.clone(),
        tenant_info,
        Arc::new(registry),
        Arc::new(FakeFactory { jobs }),
        shutdown_rx,
    ));
    let transport = Arc::new(InMemoryTransport::new());
    let host = TransportHost::new(transport.clone(), dispatcher, config.clone(), shutdown_tx);

    let receive_loop = host.start().await.unwrap();
    transport
        .send(
            &config.message_queue,
            &tests_message(),
            &MessageHeaders::new("tenant0"),
        )
        .await
        .unwrap();

    let started_watch = started.clone();
    wait_until(move || started_watch.load(Ordering::SeqCst) == 1).await;

    host.stop();
    receive_loop.await.unwrap();

    // The loop reports stopped only after the invocation ran to completion.
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_tenant_is_dead_lettered_not_retried() {
    let pipeline = pipeline();
    let mut error_queue = pipeline
        .transport
        .subscribe(&pipeline.config.error_queue)
        .await
        .unwrap();
    let receive_loop = pipeline.host.start().await.unwrap();

    pipeline
        .transport
        .send(
            &pipeline.config.message_queue,
            &tests_message(),
            &MessageHeaders::new("tenant-unknown"),
        )
        .await
        .unwrap();

    let dead_lettered = tokio::time::timeout(Duration::from_secs(5), error_queue.recv())
        .await
        .expect("dead letter not observed")
        .expect("error queue closed");
    assert_eq!(dead_lettered.headers.tenant_id.as_deref(), Some("tenant-unknown"));

    pipeline.host.stop();
    receive_loop.await.unwrap();
}
