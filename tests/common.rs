// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Quiet tracing, in-memory config stores, seeded tenants and wired server resources
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `sqlgate`

use std::env;
use std::sync::{Arc, Once};

use chrono::Utc;
use sqlgate::config::ServerConfig;
use sqlgate::database::{Database, TenantConfigRecord};
use sqlgate::gateway::executor::StatementExecutor;
use sqlgate::models::TenantKey;
use sqlgate::resources::ServerResources;
use tempfile::TempDir;

pub const MASTER_SECRET: &str = "test-master-secret";
pub const ADMIN_TOKEN: &str = "test-admin-token";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Server config pointing the audit log into `dir`, with an admin token set
pub fn test_config(dir: &TempDir) -> ServerConfig {
    let mut config = ServerConfig::with_master_secret(MASTER_SECRET);
    config.database_url = "sqlite::memory:".to_owned();
    config.admin_token = Some(zeroize::Zeroizing::new(ADMIN_TOKEN.to_owned()));
    config.audit.log_path = dir.path().join("audit.jsonl");
    config
}

/// Wired resources over a fresh in-memory config store
pub async fn create_test_resources(config: ServerConfig) -> Arc<ServerResources> {
    init_test_logging();
    let database = Database::new("sqlite::memory:").await.unwrap();
    Arc::new(ServerResources::with_database(config, database).unwrap())
}

/// Wired resources whose gateway executes through `executor`
pub async fn create_test_resources_with_executor(
    config: ServerConfig,
    executor: Arc<dyn StatementExecutor>,
) -> Arc<ServerResources> {
    init_test_logging();
    let database = Database::new("sqlite::memory:").await.unwrap();
    Arc::new(ServerResources::with_executor(config, database, executor).unwrap())
}

/// Tenant row whose database is never reachable in tests
pub fn tenant_record(
    resources: &ServerResources,
    project: &str,
    environment: &str,
    policy_json: &str,
) -> TenantConfigRecord {
    TenantConfigRecord {
        key: TenantKey::new(project, environment).unwrap(),
        db_host: "127.0.0.1".to_owned(),
        db_port: 1,
        db_user: "app".to_owned(),
        db_password_enc: resources.vault.encrypt("tenant-password").unwrap(),
        db_name: project.to_owned(),
        policy_json: policy_json.to_owned(),
        envelope_secret_enc: None,
        require_envelope: false,
        updated_at: Utc::now(),
    }
}

/// Insert a tenant with the given policy overrides
pub async fn seed_tenant(
    resources: &ServerResources,
    project: &str,
    environment: &str,
    policy_json: &str,
) -> TenantKey {
    let record = tenant_record(resources, project, environment, policy_json);
    resources.database.upsert_tenant_config(&record).await.unwrap();
    record.key
}
