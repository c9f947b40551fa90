// ABOUTME: Shared server resources wired once at startup and injected into every route
// ABOUTME: Owns the config store, vault, caches, pools, rate limiter, audit logger and gateway
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Server Resources
//!
//! Every cache and pool map lives here as an explicit instance rather than a
//! global. Routes receive `Arc<ServerResources>` as axum state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ServerConfig;
use crate::constants::defaults::RATE_LIMIT_PURGE_INTERVAL_SECS;
use crate::crypto::SecretVault;
use crate::database::{ConfigStore, Database};
use crate::errors::AppResult;
use crate::gateway::executor::{PoolExecutor, StatementExecutor};
use crate::gateway::Gateway;
use crate::rate_limiting::RateLimiter;
use crate::security::AuditLogger;
use crate::sql::PolicyValidator;
use crate::tenant::{ApiDefinitionCache, ApiDefinitionService, ConfigResolver, TenantConnectionManager};

/// Dependency container shared by all handlers
pub struct ServerResources {
    /// Effective configuration
    pub config: ServerConfig,
    /// Config store
    pub database: Database,
    /// Secret vault for stored credentials
    pub vault: Arc<SecretVault>,
    /// Tenant context resolver
    pub resolver: Arc<ConfigResolver>,
    /// API definition cache
    pub api_cache: Arc<ApiDefinitionCache>,
    /// API definition writes
    pub api_service: ApiDefinitionService,
    /// Tenant pools
    pub connections: Arc<TenantConnectionManager>,
    /// Per-caller request windows
    pub rate_limiter: Arc<RateLimiter>,
    /// Audit trail
    pub audit: Arc<AuditLogger>,
    /// Request pipeline
    pub gateway: Gateway,
}

impl ServerResources {
    /// Connect the config store and wire every component
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty master secret or `DatabaseError` if
    /// the config store cannot be opened
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        let database = Database::new(&config.database_url).await?;
        Self::with_database(config, database)
    }

    /// Wire every component over an already open config store
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty master secret
    pub fn with_database(config: ServerConfig, database: Database) -> AppResult<Self> {
        let connections = Arc::new(TenantConnectionManager::new(config.pool.clone()));
        let executor = Arc::new(PoolExecutor::new(Arc::clone(&connections)));
        Self::assemble(config, database, connections, executor)
    }

    /// Wire every component with a custom statement executor
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty master secret
    pub fn with_executor(
        config: ServerConfig,
        database: Database,
        executor: Arc<dyn StatementExecutor>,
    ) -> AppResult<Self> {
        let connections = Arc::new(TenantConnectionManager::new(config.pool.clone()));
        Self::assemble(config, database, connections, executor)
    }

    fn assemble(
        config: ServerConfig,
        database: Database,
        connections: Arc<TenantConnectionManager>,
        executor: Arc<dyn StatementExecutor>,
    ) -> AppResult<Self> {
        let vault = Arc::new(SecretVault::new(&config.master_secret)?);
        let store: Arc<dyn ConfigStore> = Arc::new(database.clone());
        let validator = PolicyValidator::default();

        let resolver = Arc::new(ConfigResolver::new(
            Arc::clone(&store),
            Arc::clone(&vault),
            config.default_policy.clone(),
            config.cache.config_ttl,
        ));
        let api_cache = Arc::new(ApiDefinitionCache::new(store, config.cache.api_ttl));
        let api_service = ApiDefinitionService::new(
            database.clone(),
            Arc::clone(&resolver),
            Arc::clone(&api_cache),
            validator.clone(),
        );
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let audit = Arc::new(AuditLogger::new(&config.audit));

        let gateway = Gateway::new(
            Arc::clone(&resolver),
            Arc::clone(&api_cache),
            executor,
            Arc::clone(&rate_limiter),
            Arc::clone(&audit),
            validator,
            config.envelope.clone(),
        );

        info!(
            audit_log = %audit.path().display(),
            config_ttl_secs = config.cache.config_ttl.as_secs(),
            api_ttl_secs = config.cache.api_ttl.as_secs(),
            "server resources initialized"
        );

        Ok(Self {
            config,
            database,
            vault,
            resolver,
            api_cache,
            api_service,
            connections,
            rate_limiter,
            audit,
            gateway,
        })
    }

    /// Start background maintenance (rate-limit window purge)
    #[must_use]
    pub fn spawn_background_tasks(&self) -> JoinHandle<()> {
        Arc::clone(&self.rate_limiter)
            .spawn_purge_task(Duration::from_secs(RATE_LIMIT_PURGE_INTERVAL_SECS))
    }

    /// Release tenant pools
    pub async fn shutdown(&self) {
        self.connections.close_all().await;
    }
}
