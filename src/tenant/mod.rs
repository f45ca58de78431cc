//! # Tenant Metadata
//!
//! Tenant connection metadata loaded from the central tenants store and
//! cached by [`retriever::TenantInfoRetriever`].

pub mod retriever;

pub use retriever::TenantInfoRetriever;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection metadata for one isolated customer deployment.
///
/// Read-only from the handler's perspective; the tenant id is the unique key
/// carried in message headers.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct TenantInformation {
    pub tenant_id: String,
    pub tenant_name: String,
    pub connection_string: String,
    pub package_name: String,
    pub package_level: i32,
    pub start_date: DateTime<Utc>,
    pub expiration_date: Option<DateTime<Utc>>,
}

impl TenantInformation {
    /// Whether the tenant's package has expired as of `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.map(|d| d < now).unwrap_or(false)
    }
}
