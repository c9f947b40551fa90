// ABOUTME: Tenant config resolver turning stored rows into decrypted in-memory contexts
// ABOUTME: TTL-cached by normalized tenant key with force refresh and explicit invalidation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Config Resolver
//!
//! A [`TenantContext`] is the only place decrypted credentials live. It is
//! built on cache miss from a [`TenantConfigRecord`], shared as `Arc`, and
//! dropped (zeroizing its secrets) once no request holds it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use sqlx::postgres::PgConnectOptions;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::cache::TtlCache;
use crate::crypto::SecretVault;
use crate::database::{ConfigStore, TenantConfigRecord};
use crate::errors::{AppError, AppResult};
use crate::models::{Policy, PolicyOverrides, TenantKey};

/// Tenant database connection parameters with an in-memory password
#[derive(Clone)]
pub struct ConnectionParams {
    /// Host name
    pub host: String,
    /// Port
    pub port: u16,
    /// User name
    pub user: String,
    /// Decrypted password
    pub password: Zeroizing<String>,
    /// Database name
    pub database: String,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionParams {
    /// Stable digest over every parameter; changes when credentials rotate
    #[must_use]
    pub fn signature(&self) -> String {
        let port = self.port.to_be_bytes();
        let parts: [&[u8]; 5] = [
            self.host.as_bytes(),
            &port,
            self.user.as_bytes(),
            self.password.as_bytes(),
            self.database.as_bytes(),
        ];
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part);
        }
        hex::encode(hasher.finalize())
    }

    /// Driver connect options
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .application_name("sqlgate")
    }
}

/// Everything the gateway needs to serve one tenant
#[derive(Debug, Clone)]
pub struct TenantContext {
    /// Tenant identity
    pub key: TenantKey,
    /// Tenant database connection
    pub connection: ConnectionParams,
    /// Effective policy (defaults merged with tenant overrides)
    pub policy: Policy,
    /// Tenant envelope passphrase overriding the global one
    pub envelope_passphrase: Option<Zeroizing<String>>,
    /// Reject plaintext bodies for this tenant
    pub require_envelope: bool,
}

/// Resolves tenant keys to cached contexts
pub struct ConfigResolver {
    store: Arc<dyn ConfigStore>,
    vault: Arc<SecretVault>,
    defaults: Policy,
    cache: TtlCache<TenantKey, Arc<TenantContext>>,
}

impl ConfigResolver {
    /// Create a resolver
    #[must_use]
    pub fn new(
        store: Arc<dyn ConfigStore>,
        vault: Arc<SecretVault>,
        defaults: Policy,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            vault,
            defaults,
            cache: TtlCache::new(ttl),
        }
    }

    /// Resolve a tenant, serving a fresh cached context unless `force_refresh`
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for unknown tenants (never cached),
    /// `CryptoFailure` if a stored secret cannot be decrypted, and
    /// `ConfigError` for an invalid stored policy
    pub async fn resolve(&self, key: &TenantKey, force_refresh: bool) -> AppResult<Arc<TenantContext>> {
        if !force_refresh {
            if let Some(context) = self.cache.get(key) {
                return Ok(context);
            }
        }

        let record = self
            .store
            .get_tenant_config(key)
            .await?
            .ok_or_else(|| AppError::not_found("tenant configuration"))?;

        let context = Arc::new(self.build_context(record)?);
        self.cache.insert(key.clone(), Arc::clone(&context));
        debug!(tenant = %key, "tenant context loaded");
        Ok(context)
    }

    /// Drop a cached tenant so the next request reloads it
    pub fn invalidate(&self, key: &TenantKey) {
        if self.cache.invalidate(key) {
            info!(tenant = %key, "tenant context invalidated");
        }
    }

    /// Drop every cached tenant
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    /// Global default policy
    #[must_use]
    pub const fn default_policy(&self) -> &Policy {
        &self.defaults
    }

    fn build_context(&self, record: TenantConfigRecord) -> AppResult<TenantContext> {
        let overrides = PolicyOverrides::from_json_str(&record.policy_json).map_err(|e| {
            warn!(tenant = %record.key, error = %e.message, "stored policy is invalid");
            AppError::config("tenant policy is invalid")
        })?;

        let password = self.vault.decrypt(&record.db_password_enc).inspect_err(|_| {
            warn!(tenant = %record.key, "tenant database password failed to decrypt");
        })?;

        let envelope_passphrase = record
            .envelope_secret_enc
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|enc| self.vault.decrypt(enc))
            .transpose()
            .inspect_err(|_| {
                warn!(tenant = %record.key, "tenant envelope secret failed to decrypt");
            })?;

        Ok(TenantContext {
            connection: ConnectionParams {
                host: record.db_host,
                port: record.db_port,
                user: record.db_user,
                password,
                database: record.db_name,
            },
            policy: self.defaults.merged_with(&overrides),
            envelope_passphrase,
            require_envelope: record.require_envelope,
            key: record.key,
        })
    }
}
