//! # Tenant Info Retriever
//!
//! Caches the full tenant map with a configurable expiration. The cache is
//! copy-on-write: readers clone an `Arc` snapshot and never observe a
//! partially refreshed map. A refresh races at worst with another refresh;
//! last write wins and both writers produce complete snapshots.

use crate::errors::Result;
use crate::repositories::TenantsRepository;
use crate::tenant::TenantInformation;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

struct CachedTenants {
    tenants: Arc<HashMap<String, TenantInformation>>,
    loaded_at: Instant,
}

/// Loads and caches per-tenant connection metadata.
pub struct TenantInfoRetriever {
    repository: Arc<dyn TenantsRepository>,
    cache_expiration: Duration,
    cache: RwLock<Option<CachedTenants>>,
}

impl TenantInfoRetriever {
    /// Create a retriever caching tenants for `cache_expiration_minutes`.
    /// Zero disables caching entirely.
    pub fn new(repository: Arc<dyn TenantsRepository>, cache_expiration_minutes: u64) -> Self {
        Self {
            repository,
            cache_expiration: Duration::from_secs(cache_expiration_minutes * 60),
            cache: RwLock::new(None),
        }
    }

    /// The current tenant map, keyed by tenant id.
    ///
    /// Served from cache inside the expiry window; reloaded from the tenants
    /// store in one call otherwise.
    pub async fn get_tenants(&self) -> Result<Arc<HashMap<String, TenantInformation>>> {
        if !self.cache_expiration.is_zero() {
            let guard = self.cache.read();
            if let Some(cached) = guard.as_ref() {
                if cached.loaded_at.elapsed() < self.cache_expiration {
                    return Ok(Arc::clone(&cached.tenants));
                }
            }
        }

        let rows = self.repository.get_tenants().await?;
        let tenants: Arc<HashMap<String, TenantInformation>> = Arc::new(
            rows.into_iter()
                .map(|tenant| (tenant.tenant_id.clone(), tenant))
                .collect(),
        );

        debug!(tenant_count = tenants.len(), "reloaded tenant cache");

        *self.cache.write() = Some(CachedTenants {
            tenants: Arc::clone(&tenants),
            loaded_at: Instant::now(),
        });

        Ok(tenants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

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

    struct CountingTenantsRepository {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TenantsRepository for CountingTenantsRepository {
        async fn get_tenants(&self) -> Result<Vec<TenantInformation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![tenant("tenant0"), tenant("tenant1")])
        }
    }

    #[tokio::test]
    async fn serves_from_cache_inside_expiry_window() {
        let repository = Arc::new(CountingTenantsRepository {
            calls: AtomicUsize::new(0),
        });
        let retriever = TenantInfoRetriever::new(repository.clone(), 60);

        let first = retriever.get_tenants().await.unwrap();
        let second = retriever.get_tenants().await.unwrap();

        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(repository.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reloads_after_expiry() {
        let repository = Arc::new(CountingTenantsRepository {
            calls: AtomicUsize::new(0),
        });
        let retriever = TenantInfoRetriever::new(repository.clone(), 60);

        retriever.get_tenants().await.unwrap();
        tokio::time::advance(Duration::from_secs(61 * 60)).await;
        retriever.get_tenants().await.unwrap();

        assert_eq!(repository.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_expiration_disables_caching() {
        let repository = Arc::new(CountingTenantsRepository {
            calls: AtomicUsize::new(0),
        });
        let retriever = TenantInfoRetriever::new(repository.clone(), 0);

        retriever.get_tenants().await.unwrap();
        retriever.get_tenants().await.unwrap();

        assert_eq!(repository.calls.load(Ordering::SeqCst), 2);
    }
}
