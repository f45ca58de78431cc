#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Action Handler Core
//!
//! Multi-tenant workflow action-message handling tier. A workflow engine
//! publishes typed action messages correlated to database transactions; this
//! crate receives them, resolves the tenant, confirms the originating
//! transaction committed, and performs one unit of work per message (send a
//! notification, enqueue a job, fan out a change feed).
//!
//! ## Pipeline
//!
//! ```text
//! transport ─▶ MessageDispatcher ─▶ TransactionValidator ─▶ ActionHelper ─▶ repositories
//!                    │
//!                    └─ TenantInfoRetriever (expiring tenant cache)
//! ```
//!
//! ## Module Organization
//!
//! - [`messaging`] - wire contracts: the ActionMessage union and headers
//! - [`handlers`] - dispatcher, transaction validator and action helpers
//! - [`tenant`] - tenant metadata and the expiring tenant cache
//! - [`workflow`] - trigger definitions and outbound message generation
//! - [`transport`] - broker-agnostic transport seam and host loop
//! - [`repositories`] - trait seams over the tenant-scoped SQL stores
//! - [`database`] - sqlx implementations of those seams
//! - [`config`] - process configuration
//! - [`errors`] - structured error taxonomy (fatal vs transient)
//!
//! ## Error policy
//!
//! Missing headers, unsupported action types and unknown tenants are fatal:
//! the message is dead-lettered. Repository and transport failures are
//! transient: the host redelivers up to a retry budget. A helper returning
//! `false` is a successfully processed message with nothing to do.

pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod messaging;
pub mod repositories;
pub mod tenant;
pub mod transport;
pub mod workflow;

pub use config::ActionHandlerConfig;
pub use errors::{ActionHandlerError, Result};
pub use handlers::{ActionHelper, HandlerRegistry, MessageDispatcher, TransactionValidator};
pub use messaging::message::{ActionMessage, MessageActionType, MessageHeaders};
pub use repositories::{TenantRepositories, TenantRepositoryFactory, TransactionStatus};
pub use tenant::{TenantInfoRetriever, TenantInformation};
pub use transport::{InMemoryTransport, MessageTransport, TransportHost};
pub use workflow::{WorkflowEventTriggers, WorkflowEventsMessagesHelper};
