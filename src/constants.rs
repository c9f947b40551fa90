// ABOUTME: Application constants for environment variables, defaults and wire names
// ABOUTME: Centralizes literals shared by configuration, routes and the gateway pipeline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

/// Environment variable names
pub mod env_vars {
    /// HTTP listen port
    pub const HTTP_PORT: &str = "SQLGATE_HTTP_PORT";
    /// Config store URL
    pub const DATABASE_URL: &str = "SQLGATE_DATABASE_URL";
    /// Vault key material
    pub const MASTER_SECRET: &str = "SQLGATE_MASTER_SECRET";
    /// Global envelope passphrase
    pub const ENVELOPE_PASSPHRASE: &str = "SQLGATE_ENVELOPE_PASSPHRASE";
    /// Reject plaintext bodies globally
    pub const REQUIRE_ENVELOPE: &str = "SQLGATE_REQUIRE_ENVELOPE";
    /// Bearer token for admin and audit routes
    pub const ADMIN_TOKEN: &str = "SQLGATE_ADMIN_TOKEN";
    /// Tenant config cache TTL
    pub const CONFIG_CACHE_TTL_SECS: &str = "SQLGATE_CONFIG_CACHE_TTL_SECS";
    /// API definition cache TTL
    pub const API_CACHE_TTL_SECS: &str = "SQLGATE_API_CACHE_TTL_SECS";
    /// Requests allowed per window
    pub const RATE_LIMIT_MAX: &str = "SQLGATE_RATE_LIMIT_MAX";
    /// Rate limit window length
    pub const RATE_LIMIT_WINDOW_SECS: &str = "SQLGATE_RATE_LIMIT_WINDOW_SECS";
    /// Per-tenant pool ceiling
    pub const POOL_MAX_CONNECTIONS: &str = "SQLGATE_POOL_MAX_CONNECTIONS";
    /// Audit JSONL file
    pub const AUDIT_LOG_PATH: &str = "SQLGATE_AUDIT_LOG_PATH";
    /// Global default policy document
    pub const DEFAULT_POLICY: &str = "SQLGATE_DEFAULT_POLICY";
    /// `text` or `json`
    pub const LOG_FORMAT: &str = "SQLGATE_LOG_FORMAT";
}

/// Default configuration values
pub mod defaults {
    /// HTTP listen port
    pub const HTTP_PORT: u16 = 8088;
    /// Config store URL
    pub const DATABASE_URL: &str = "sqlite:./data/sqlgate.db";
    /// Tenant config cache TTL in seconds
    pub const CONFIG_CACHE_TTL_SECS: u64 = 60;
    /// API definition cache TTL in seconds
    pub const API_CACHE_TTL_SECS: u64 = 30;
    /// Requests allowed per window
    pub const RATE_LIMIT_MAX: u32 = 120;
    /// Window length in seconds
    pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;
    /// Per-tenant pool ceiling
    pub const POOL_MAX_CONNECTIONS: u32 = 10;
    /// Audit JSONL file
    pub const AUDIT_LOG_PATH: &str = "./data/audit.jsonl";
    /// Connect timeout for administrative probes
    pub const PROBE_CONNECT_TIMEOUT_SECS: u64 = 8;
    /// Interval between rate limiter purges
    pub const RATE_LIMIT_PURGE_INTERVAL_SECS: u64 = 60;
    /// Request body ceiling in bytes
    pub const MAX_BODY_BYTES: usize = 1024 * 1024;
}

/// Audit pipeline limits
pub mod audit {
    /// Characters kept in a statement preview
    pub const PREVIEW_CHARS: usize = 240;
    /// Records returned when a query has no limit
    pub const DEFAULT_QUERY_LIMIT: usize = 100;
    /// Hard ceiling on records returned
    pub const MAX_QUERY_LIMIT: usize = 1000;
}

/// Template parameter limits
pub mod params {
    /// Default string `maxLength`
    pub const DEFAULT_MAX_STRING_LENGTH: usize = 1000;
    /// Truthy strings accepted for boolean parameters
    pub const TRUTHY: [&str; 3] = ["true", "1", "yes"];
}

/// HTTP header names
pub mod headers {
    /// Caller identity set by the fronting auth layer
    pub const ACTOR: &str = "x-sqlgate-actor";
    /// Caller role set by the fronting auth layer
    pub const ROLE: &str = "x-sqlgate-role";
    /// Proxy client address
    pub const FORWARDED_FOR: &str = "x-forwarded-for";
    /// Request id echoed on responses
    pub const REQUEST_ID: &str = "x-request-id";
    /// Seconds until the rate limit window resets
    pub const RETRY_AFTER: &str = "retry-after";
}

/// Rate limit key used when no caller identity is available
pub const ANONYMOUS_CALLER: &str = "anonymous";
