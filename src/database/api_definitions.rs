// ABOUTME: API definition persistence with monotonic versioning
// ABOUTME: Load, list, upsert (version + 1) and delete against api_definitions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{ApiDefinition, ApiDefinitionInput, TenantKey};

const SELECT_COLUMNS: &str = r"
    SELECT project, environment, api_key, sql_template, statement_type, params_schema_json,
           result_mapping_json, auth_mode, status, version, updated_at
    FROM api_definitions
";

fn decode_text<T: DeserializeOwned>(column: &str, raw: String) -> AppResult<T> {
    serde_json::from_value(Value::String(raw))
        .map_err(|e| AppError::database(format!("Invalid {column} stored: {e}")))
}

fn decode_json<T: DeserializeOwned>(column: &str, raw: &str) -> AppResult<T> {
    serde_json::from_str(raw).map_err(|e| AppError::database(format!("Invalid {column} stored: {e}")))
}

fn row_to_definition(row: &SqliteRow) -> AppResult<ApiDefinition> {
    let params_schema: String = row.get("params_schema_json");
    let result_mapping: String = row.get("result_mapping_json");
    let updated_at: String = row.get("updated_at");

    Ok(ApiDefinition {
        project: row.get("project"),
        environment: row.get("environment"),
        api_key: row.get("api_key"),
        sql_template: row.get("sql_template"),
        statement_type: decode_text("statement_type", row.get("statement_type"))?,
        params_schema: decode_json("params_schema_json", &params_schema)?,
        result_mapping: decode_json("result_mapping_json", &result_mapping)?,
        auth_mode: decode_text("auth_mode", row.get("auth_mode"))?,
        status: decode_text("status", row.get("status"))?,
        version: row.get("version"),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| AppError::database(format!("Invalid updated_at: {e}")))?
            .with_timezone(&Utc),
    })
}

impl Database {
    /// Load one API definition
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or the row is corrupt
    pub async fn load_api_definition(
        &self,
        key: &TenantKey,
        api_key: &str,
    ) -> AppResult<Option<ApiDefinition>> {
        let sql = format!("{SELECT_COLUMNS} WHERE project = $1 AND environment = $2 AND api_key = $3");
        let row = sqlx::query(&sql)
            .bind(&key.project)
            .bind(&key.environment)
            .bind(api_key)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get API definition: {e}")))?;

        row.map(|r| row_to_definition(&r)).transpose()
    }

    /// List a tenant's API definitions ordered by key
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or a row is corrupt
    pub async fn list_api_definitions(&self, key: &TenantKey) -> AppResult<Vec<ApiDefinition>> {
        let sql = format!("{SELECT_COLUMNS} WHERE project = $1 AND environment = $2 ORDER BY api_key");
        let rows = sqlx::query(&sql)
            .bind(&key.project)
            .bind(&key.environment)
            .fetch_all(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to list API definitions: {e}")))?;

        rows.iter().map(row_to_definition).collect()
    }

    /// Insert a definition at version 1 or replace it at the next version
    ///
    /// Callers are expected to have validated the input first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if serialization or the write fails
    pub async fn upsert_api_definition(
        &self,
        key: &TenantKey,
        api_key: &str,
        input: &ApiDefinitionInput,
    ) -> AppResult<ApiDefinition> {
        let params_schema = serde_json::to_string(&input.params_schema)
            .map_err(|e| AppError::internal(format!("Failed to serialize params schema: {e}")))?;
        let result_mapping = serde_json::to_string(&input.result_mapping)
            .map_err(|e| AppError::internal(format!("Failed to serialize result mapping: {e}")))?;
        let now = Utc::now();

        let row = sqlx::query(
            r"
            INSERT INTO api_definitions (
                project, environment, api_key, sql_template, statement_type, params_schema_json,
                result_mapping_json, auth_mode, status, version, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 1, $10)
            ON CONFLICT (project, environment, api_key) DO UPDATE SET
                sql_template = excluded.sql_template,
                statement_type = excluded.statement_type,
                params_schema_json = excluded.params_schema_json,
                result_mapping_json = excluded.result_mapping_json,
                auth_mode = excluded.auth_mode,
                status = excluded.status,
                version = api_definitions.version + 1,
                updated_at = excluded.updated_at
            RETURNING version
            ",
        )
        .bind(&key.project)
        .bind(&key.environment)
        .bind(api_key)
        .bind(&input.sql_template)
        .bind(input.statement_type.as_str())
        .bind(&params_schema)
        .bind(&result_mapping)
        .bind(input.auth_mode.as_str())
        .bind(input.status.as_str())
        .bind(now.to_rfc3339())
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to save API definition: {e}")))?;

        Ok(ApiDefinition {
            project: key.project.clone(),
            environment: key.environment.clone(),
            api_key: api_key.to_owned(),
            sql_template: input.sql_template.clone(),
            statement_type: input.statement_type,
            params_schema: input.params_schema.clone(),
            result_mapping: input.result_mapping.clone(),
            auth_mode: input.auth_mode,
            status: input.status,
            version: row.get("version"),
            updated_at: now,
        })
    }

    /// Delete a definition; returns whether it existed
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the write fails
    pub async fn delete_api_definition(&self, key: &TenantKey, api_key: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM api_definitions WHERE project = $1 AND environment = $2 AND api_key = $3",
        )
        .bind(&key.project)
        .bind(&key.environment)
        .bind(api_key)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to delete API definition: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}
