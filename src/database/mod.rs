// ABOUTME: SQLite configuration store for tenant connection rows and API definitions
// ABOUTME: Owns the pool, runs embedded migrations, and implements the ConfigStore trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Config Store
//!
//! The gateway never writes tenant configuration on the request path. Rows are
//! written by the administrative collaborator (or the admin routes) and read
//! through [`ConfigStore`] by the resolver and API-definition cache.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::config::redact_url;
use crate::errors::{AppError, AppResult};
use crate::models::{ApiDefinition, TenantKey};

/// API definition persistence
pub mod api_definitions;
/// Tenant configuration persistence
pub mod tenant_configs;

pub use tenant_configs::TenantConfigRecord;

/// Read access to persisted configuration
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the raw (still encrypted) configuration row for a tenant
    async fn get_tenant_config(&self, key: &TenantKey) -> AppResult<Option<TenantConfigRecord>>;

    /// Load one API definition
    async fn get_api_definition(
        &self,
        key: &TenantKey,
        api_key: &str,
    ) -> AppResult<Option<ApiDefinition>>;
}

/// SQLite-backed configuration database
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect, creating the database file if needed, and run migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the URL is invalid, the connection fails or a
    /// migration fails
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::database(format!("Invalid database URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::database(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        // Every in-memory connection is its own database
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        info!(url = %redact_url(database_url), "config store connected");

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run embedded migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if any migration fails
    pub async fn migrate(&self) -> AppResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl ConfigStore for Database {
    async fn get_tenant_config(&self, key: &TenantKey) -> AppResult<Option<TenantConfigRecord>> {
        self.load_tenant_config(key).await
    }

    async fn get_api_definition(
        &self,
        key: &TenantKey,
        api_key: &str,
    ) -> AppResult<Option<ApiDefinition>> {
        self.load_api_definition(key, api_key).await
    }
}
