//! # Action Handler Service
//!
//! Hosts the message-handling tier: wires the tenant cache, dispatcher and
//! transport host together and runs until interrupted.
//!
//! Uses the in-memory transport by default; deployments substitute a broker
//! adapter implementing `MessageTransport`.

use action_handler_core::config::ActionHandlerConfig;
use action_handler_core::database::{SqlTenantRepositoryFactory, SqlTenantsRepository};
use action_handler_core::handlers::{HandlerRegistry, MessageDispatcher};
use action_handler_core::logging::init_structured_logging;
use action_handler_core::tenant::TenantInfoRetriever;
use action_handler_core::transport::{InMemoryTransport, TransportHost};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config = ActionHandlerConfig::from_env()?;
    info!(
        queue = %config.message_queue,
        max_concurrency = config.max_concurrency,
        "action handler starting"
    );

    let tenants_pool = PgPool::connect_lazy(&config.database_url)?;
    let tenant_info = Arc::new(TenantInfoRetriever::new(
        Arc::new(SqlTenantsRepository::new(tenants_pool)),
        config.cache_expiration_minutes,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = Arc::new(MessageDispatcher::new(
        config.clone(),
        tenant_info,
        Arc::new(HandlerRegistry::with_default_helpers()),
        Arc::new(SqlTenantRepositoryFactory::new()),
        shutdown_rx,
    ));

    let transport = Arc::new(InMemoryTransport::new());
    let host = TransportHost::new(transport, dispatcher, config, shutdown_tx);
    let receive_loop = host.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    host.stop();
    receive_loop.await?;

    Ok(())
}
