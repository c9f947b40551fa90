// ABOUTME: Statement executor trait and the tenant-pool implementation with positional binds
// ABOUTME: SELECT returns decoded rows; data-modifying statements return affected counts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgPool;

use crate::errors::{AppError, AppResult};
use crate::models::StatementType;
use crate::sql::{bind_values, row_to_json, SqlValue};
use crate::tenant::{TenantConnectionManager, TenantContext};

/// What a statement produced
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Decoded result rows
    Rows(Vec<Map<String, Value>>),
    /// Rows touched by a data-modifying statement
    Affected(u64),
}

/// Runs a validated statement for a tenant
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute one statement with its bound values
    ///
    /// # Errors
    ///
    /// Returns `ExecutionFailed` when the database rejects the statement
    async fn execute(
        &self,
        context: &TenantContext,
        statement_type: StatementType,
        sql: &str,
        values: &[SqlValue],
    ) -> AppResult<ExecutionOutcome>;
}

/// Executes on the tenant's pooled PostgreSQL connection
pub struct PoolExecutor {
    connections: Arc<TenantConnectionManager>,
}

impl PoolExecutor {
    /// Execute through the given pool manager
    #[must_use]
    pub const fn new(connections: Arc<TenantConnectionManager>) -> Self {
        Self { connections }
    }
}

#[async_trait]
impl StatementExecutor for PoolExecutor {
    async fn execute(
        &self,
        context: &TenantContext,
        statement_type: StatementType,
        sql: &str,
        values: &[SqlValue],
    ) -> AppResult<ExecutionOutcome> {
        let pool = self.connections.get_pool(context);
        execute(&pool, statement_type, sql, values).await
    }
}

/// Execute one statement; values are always sent as bound parameters
///
/// # Errors
///
/// Returns `ExecutionFailed` with the driver's message
pub async fn execute(
    pool: &PgPool,
    statement_type: StatementType,
    sql: &str,
    values: &[SqlValue],
) -> AppResult<ExecutionOutcome> {
    let query = bind_values(sqlx::query(sql), values);

    if statement_type == StatementType::Select {
        let rows = query.fetch_all(pool).await.map_err(driver_error)?;
        Ok(ExecutionOutcome::Rows(rows.iter().map(row_to_json).collect()))
    } else {
        let result = query.execute(pool).await.map_err(driver_error)?;
        Ok(ExecutionOutcome::Affected(result.rows_affected()))
    }
}

fn driver_error(e: sqlx::Error) -> AppError {
    let message = e
        .as_database_error()
        .map_or_else(|| e.to_string(), |db| db.message().to_owned());
    AppError::execution(message)
}
