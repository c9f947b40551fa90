// ABOUTME: Tenant configuration rows with encrypted credential columns
// ABOUTME: Load and upsert operations against the tenant_configs table
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::TenantKey;

/// Persisted tenant configuration; secret columns hold vault ciphertext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantConfigRecord {
    /// Tenant identity
    pub key: TenantKey,
    /// Database host
    pub db_host: String,
    /// Database port
    pub db_port: u16,
    /// Database user
    pub db_user: String,
    /// Vault-encrypted database password
    pub db_password_enc: String,
    /// Database name
    pub db_name: String,
    /// Sparse policy overrides (JSON)
    pub policy_json: String,
    /// Vault-encrypted per-tenant envelope passphrase
    pub envelope_secret_enc: Option<String>,
    /// Reject plaintext request bodies for this tenant
    pub require_envelope: bool,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

fn row_to_record(row: &SqliteRow) -> AppResult<TenantConfigRecord> {
    let project: String = row.get("project");
    let environment: String = row.get("environment");
    let port: i64 = row.get("db_port");
    let updated_at: String = row.get("updated_at");

    Ok(TenantConfigRecord {
        key: TenantKey::new(&project, &environment)?,
        db_host: row.get("db_host"),
        db_port: u16::try_from(port)
            .map_err(|_| AppError::database(format!("Invalid port stored for {project}")))?,
        db_user: row.get("db_user"),
        db_password_enc: row.get("db_password_enc"),
        db_name: row.get("db_name"),
        policy_json: row.get("policy_json"),
        envelope_secret_enc: row.get("envelope_secret_enc"),
        require_envelope: row.get::<i64, _>("require_envelope") != 0,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| AppError::database(format!("Invalid updated_at: {e}")))?
            .with_timezone(&Utc),
    })
}

impl Database {
    /// Load a tenant configuration row
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or the row is corrupt
    pub async fn load_tenant_config(&self, key: &TenantKey) -> AppResult<Option<TenantConfigRecord>> {
        let row = sqlx::query(
            r"
            SELECT project, environment, db_host, db_port, db_user, db_password_enc, db_name,
                   policy_json, envelope_secret_enc, require_envelope, updated_at
            FROM tenant_configs
            WHERE project = $1 AND environment = $2
            ",
        )
        .bind(&key.project)
        .bind(&key.environment)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get tenant config: {e}")))?;

        row.map(|r| row_to_record(&r)).transpose()
    }

    /// Insert or replace a tenant configuration row
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the write fails
    pub async fn upsert_tenant_config(&self, record: &TenantConfigRecord) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO tenant_configs (
                project, environment, db_host, db_port, db_user, db_password_enc, db_name,
                policy_json, envelope_secret_enc, require_envelope, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (project, environment) DO UPDATE SET
                db_host = excluded.db_host,
                db_port = excluded.db_port,
                db_user = excluded.db_user,
                db_password_enc = excluded.db_password_enc,
                db_name = excluded.db_name,
                policy_json = excluded.policy_json,
                envelope_secret_enc = excluded.envelope_secret_enc,
                require_envelope = excluded.require_envelope,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&record.key.project)
        .bind(&record.key.environment)
        .bind(&record.db_host)
        .bind(i64::from(record.db_port))
        .bind(&record.db_user)
        .bind(&record.db_password_enc)
        .bind(&record.db_name)
        .bind(&record.policy_json)
        .bind(&record.envelope_secret_enc)
        .bind(i64::from(record.require_envelope))
        .bind(record.updated_at.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to save tenant config: {e}")))?;

        Ok(())
    }
}
