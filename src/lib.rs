// ABOUTME: Main library entry point for the sqlgate multi-tenant SQL gateway
// ABOUTME: Policy-enforced ad-hoc SQL and templated API execution with a durable audit trail
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

#![deny(unsafe_code)]

//! # sqlgate
//!
//! A gateway that executes SQL on behalf of many tenants, each a
//! (project, environment) pair with its own PostgreSQL database, credentials
//! and policy.
//!
//! ## Request flow
//!
//! 1. Resolve the tenant context (cached, decrypted in memory)
//! 2. Check the caller's rate-limit window
//! 3. Unwrap an encrypted request envelope when present
//! 4. Validate: full policy checks for ad-hoc SQL, or parameter validation,
//!    template rendering and a tenant policy re-check for templated APIs
//! 5. Execute on the tenant's bounded pool with bound parameters
//! 6. Write exactly one audit record
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sqlgate::config::ServerConfig;
//! use sqlgate::errors::AppResult;
//! use sqlgate::resources::ServerResources;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     let resources = ServerResources::new(config).await?;
//!     println!("audit log at {}", resources.audit.path().display());
//!     Ok(())
//! }
//! ```

/// Environment-driven configuration
pub mod config;

/// Application constants and defaults
pub mod constants;

/// Secret vault and request envelope codec
pub mod crypto;

/// SQLite config store for tenant rows and API definitions
pub mod database;

/// Error types
pub mod errors;

/// Request pipeline
pub mod gateway;

/// Tracing subscriber setup
pub mod logging;

/// Data models
pub mod models;

/// Per-caller fixed-window rate limiting
pub mod rate_limiting;

/// Dependency container
pub mod resources;

/// HTTP routes
pub mod routes;

/// Audit pipeline
pub mod security;

/// Statement classification, policy validation and value binding
pub mod sql;

/// Parameter validation, template rendering and result shaping
pub mod templates;

/// Tenant resolution, API definition cache and connection pools
pub mod tenant;
