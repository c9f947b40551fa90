// ABOUTME: Short-TTL cache of API definitions keyed by tenant and API key
// ABOUTME: Misses load through the ConfigStore; writes invalidate explicitly
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::cache::TtlCache;
use crate::database::ConfigStore;
use crate::errors::{AppError, AppResult};
use crate::models::{ApiDefinition, TenantKey};

type DefinitionKey = (TenantKey, String);

/// Cached view over persisted API definitions
pub struct ApiDefinitionCache {
    store: Arc<dyn ConfigStore>,
    cache: TtlCache<DefinitionKey, Arc<ApiDefinition>>,
}

impl ApiDefinitionCache {
    /// Create a cache over the given store
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: TtlCache::new(ttl),
        }
    }

    /// Fetch a definition, loading it on miss
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` when no definition exists (not cached), or
    /// `DatabaseError` if the store fails
    pub async fn get(&self, key: &TenantKey, api_key: &str) -> AppResult<Arc<ApiDefinition>> {
        let cache_key = (key.clone(), api_key.to_owned());
        if let Some(definition) = self.cache.get(&cache_key) {
            return Ok(definition);
        }

        let definition = self
            .store
            .get_api_definition(key, api_key)
            .await?
            .map(Arc::new)
            .ok_or_else(|| AppError::not_found("API definition"))?;

        debug!(tenant = %key, api_key, version = definition.version, "API definition loaded");
        self.cache.insert(cache_key, Arc::clone(&definition));
        Ok(definition)
    }

    /// Drop one cached definition
    pub fn invalidate(&self, key: &TenantKey, api_key: &str) {
        self.cache.invalidate(&(key.clone(), api_key.to_owned()));
    }

    /// Drop every cached definition belonging to a tenant
    pub fn invalidate_tenant(&self, key: &TenantKey) {
        self.cache.invalidate_where(|(tenant, _)| tenant == key);
    }
}
