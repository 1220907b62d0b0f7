//! Cached catalog snapshot for assistant prompts.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use super::format_catalog;
use crate::db::{CatalogStore, RepositoryError};

/// Catalog text shared by every chat request for one minute.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<(), Arc<String>>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl CatalogCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    /// The formatted catalog, loading it from `store` on a miss.
    ///
    /// # Errors
    ///
    /// Returns the store error if the catalog cannot be loaded.
    pub async fn snapshot<S>(&self, store: &S) -> Result<Arc<String>, RepositoryError>
    where
        S: CatalogStore + ?Sized,
    {
        if let Some(snapshot) = self.cache.get(&()).await {
            return Ok(snapshot);
        }

        let products = store.list_products(None).await?;
        debug!(products = products.len(), "Catalog snapshot refreshed");
        let snapshot = Arc::new(format_catalog(&products));
        self.cache.insert((), Arc::clone(&snapshot)).await;
        Ok(snapshot)
    }
}
