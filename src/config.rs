// ABOUTME: Environment-driven server configuration with per-area sub-structs
// ABOUTME: Parses SQLGATE_* variables with typed defaults and validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Configuration
//!
//! All configuration comes from the process environment. Each concern gets its
//! own struct with a `Default` so tests can build configs without touching env.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::constants::{defaults, env_vars};
use crate::errors::{AppError, AppResult};
use crate::models::{Policy, PolicyOverrides};

/// Cache TTLs
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Tenant config cache TTL
    pub config_ttl: Duration,
    /// API definition cache TTL
    pub api_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            config_ttl: Duration::from_secs(defaults::CONFIG_CACHE_TTL_SECS),
            api_ttl: Duration::from_secs(defaults::API_CACHE_TTL_SECS),
        }
    }
}

/// Fixed-window rate limit settings
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per caller per window; zero disables limiting
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: defaults::RATE_LIMIT_MAX,
            window: Duration::from_secs(defaults::RATE_LIMIT_WINDOW_SECS),
        }
    }
}

/// Tenant pool settings
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Upper bound on physical connections per tenant
    pub max_connections: u32,
    /// Connect timeout used by probes
    pub probe_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: defaults::POOL_MAX_CONNECTIONS,
            probe_timeout: Duration::from_secs(defaults::PROBE_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Request envelope settings
#[derive(Clone, Default)]
pub struct EnvelopeConfig {
    /// Global passphrase, overridable per tenant
    pub passphrase: Option<Zeroizing<String>>,
    /// Reject plaintext bodies for every tenant
    pub require_envelope: bool,
}

impl fmt::Debug for EnvelopeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeConfig")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("require_envelope", &self.require_envelope)
            .finish()
    }
}

/// Audit log settings
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Append-only JSONL file
    pub log_path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(defaults::AUDIT_LOG_PATH),
        }
    }
}

/// Complete server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Config store URL
    pub database_url: String,
    /// Vault key material
    pub master_secret: Zeroizing<String>,
    /// Bearer token for admin routes; admin routes are disabled when absent
    pub admin_token: Option<Zeroizing<String>>,
    /// Global default policy
    pub default_policy: Policy,
    /// Cache TTLs
    pub cache: CacheConfig,
    /// Rate limiting
    pub rate_limit: RateLimitConfig,
    /// Tenant pools
    pub pool: PoolConfig,
    /// Request envelopes
    pub envelope: EnvelopeConfig,
    /// Audit log
    pub audit: AuditConfig,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_port", &self.http_port)
            .field("database_url", &redact_url(&self.database_url))
            .field("master_secret", &"[REDACTED]")
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[REDACTED]"))
            .field("default_policy", &self.default_policy)
            .field("cache", &self.cache)
            .field("rate_limit", &self.rate_limit)
            .field("pool", &self.pool)
            .field("envelope", &self.envelope)
            .field("audit", &self.audit)
            .finish()
    }
}

impl ServerConfig {
    /// Configuration with defaults and the given master secret
    #[must_use]
    pub fn with_master_secret(master_secret: &str) -> Self {
        Self {
            http_port: defaults::HTTP_PORT,
            database_url: defaults::DATABASE_URL.to_owned(),
            master_secret: Zeroizing::new(master_secret.to_owned()),
            admin_token: None,
            default_policy: Policy::default(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            pool: PoolConfig::default(),
            envelope: EnvelopeConfig::default(),
            audit: AuditConfig::default(),
        }
    }

    /// Load configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the master secret is missing or any variable
    /// cannot be parsed
    pub fn from_env() -> AppResult<Self> {
        let master_secret = non_empty_var(env_vars::MASTER_SECRET).ok_or_else(|| {
            AppError::config(format!("{} must be set", env_vars::MASTER_SECRET))
        })?;

        let default_policy = match non_empty_var(env_vars::DEFAULT_POLICY) {
            Some(raw) => {
                let overrides = PolicyOverrides::from_json_str(&raw).map_err(|e| {
                    AppError::config(format!("{}: {}", env_vars::DEFAULT_POLICY, e.message))
                })?;
                Policy::default().merged_with(&overrides)
            }
            None => Policy::default(),
        };

        Ok(Self {
            http_port: parse_var(env_vars::HTTP_PORT, defaults::HTTP_PORT)?,
            database_url: non_empty_var(env_vars::DATABASE_URL)
                .unwrap_or_else(|| defaults::DATABASE_URL.to_owned()),
            master_secret: Zeroizing::new(master_secret),
            admin_token: non_empty_var(env_vars::ADMIN_TOKEN).map(Zeroizing::new),
            default_policy,
            cache: CacheConfig {
                config_ttl: Duration::from_secs(parse_var(
                    env_vars::CONFIG_CACHE_TTL_SECS,
                    defaults::CONFIG_CACHE_TTL_SECS,
                )?),
                api_ttl: Duration::from_secs(parse_var(
                    env_vars::API_CACHE_TTL_SECS,
                    defaults::API_CACHE_TTL_SECS,
                )?),
            },
            rate_limit: RateLimitConfig {
                max_requests: parse_var(env_vars::RATE_LIMIT_MAX, defaults::RATE_LIMIT_MAX)?,
                window: Duration::from_secs(parse_var(
                    env_vars::RATE_LIMIT_WINDOW_SECS,
                    defaults::RATE_LIMIT_WINDOW_SECS,
                )?),
            },
            pool: PoolConfig {
                max_connections: parse_var(
                    env_vars::POOL_MAX_CONNECTIONS,
                    defaults::POOL_MAX_CONNECTIONS,
                )?
                .max(1),
                ..PoolConfig::default()
            },
            envelope: EnvelopeConfig {
                passphrase: non_empty_var(env_vars::ENVELOPE_PASSPHRASE).map(Zeroizing::new),
                require_envelope: parse_bool_var(env_vars::REQUIRE_ENVELOPE)?,
            },
            audit: AuditConfig {
                log_path: non_empty_var(env_vars::AUDIT_LOG_PATH)
                    .map_or_else(|| PathBuf::from(defaults::AUDIT_LOG_PATH), PathBuf::from),
            },
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> AppResult<T>
where
    T::Err: fmt::Display,
{
    match non_empty_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| AppError::config(format!("{name}: {e}"))),
        None => Ok(default),
    }
}

fn parse_bool_var(name: &str) -> AppResult<bool> {
    match non_empty_var(name).map(|v| v.to_lowercase()).as_deref() {
        None | Some("0" | "false" | "no" | "off") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some(other) => Err(AppError::config(format!(
            "{name}: expected a boolean, got {other}"
        ))),
    }
}

/// Strip credentials from a connection URL before it is logged
#[must_use]
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_owned();
    };
    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://[REDACTED]@{host}"),
        None => url.to_owned(),
    }
}
