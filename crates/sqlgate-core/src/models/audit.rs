// ABOUTME: Audit record and audit query types for the gateway audit trail
// ABOUTME: One immutable record per attempt, filtered retrieval via AuditQuery
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one gateway attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Executed successfully
    Ok,
    /// Rejected by policy, validation or envelope checks
    Blocked,
    /// Execution failed
    Error,
    /// Rejected by the rate limiter
    RateLimited,
}

impl AuditStatus {
    /// Stored text form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Blocked => "blocked",
            Self::Error => "error",
            Self::RateLimited => "rate_limited",
        }
    }
}

/// Write-once audit record (one JSON line in the audit log)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Request identifier echoed to the caller
    pub request_id: String,
    /// When the outcome was known
    pub timestamp: DateTime<Utc>,
    /// Outcome
    pub status: AuditStatus,
    /// Tenant project
    pub project: String,
    /// Tenant environment
    pub environment: String,
    /// Caller identity, if any
    #[serde(default)]
    pub actor: Option<String>,
    /// Caller role, if any
    #[serde(default)]
    pub role: Option<String>,
    /// Endpoint label (`sql` or `api:<key>`)
    pub endpoint: String,
    /// Classified statement type, when known
    #[serde(default)]
    pub statement_type: Option<String>,
    /// Referenced tables, when known
    #[serde(default)]
    pub tables: Vec<String>,
    /// Truncated statement preview
    #[serde(default)]
    pub preview: Option<String>,
    /// Number of bound parameters
    #[serde(default)]
    pub param_count: usize,
    /// Rows returned by a SELECT
    #[serde(default)]
    pub row_count: Option<u64>,
    /// Rows affected by a write
    #[serde(default)]
    pub affected_rows: Option<u64>,
    /// Elapsed milliseconds
    pub duration_ms: u64,
    /// Error text for blocked or failed attempts
    #[serde(default)]
    pub error: Option<String>,
}

/// Filters for audit retrieval; all present filters must match
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    /// Outcome filter
    pub status: Option<AuditStatus>,
    /// Actor filter
    pub actor: Option<String>,
    /// Role filter
    pub role: Option<String>,
    /// Statement type filter
    pub statement_type: Option<String>,
    /// Request id filter
    pub request_id: Option<String>,
    /// Inclusive lower time bound
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper time bound
    pub to: Option<DateTime<Utc>>,
    /// Maximum records returned
    pub limit: Option<usize>,
}

impl AuditQuery {
    /// Whether a record satisfies every present filter
    #[must_use]
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if self.status.is_some_and(|s| s != record.status) {
            return false;
        }
        if !matches_opt(self.actor.as_deref(), record.actor.as_deref()) {
            return false;
        }
        if !matches_opt(self.role.as_deref(), record.role.as_deref()) {
            return false;
        }
        if !matches_opt(
            self.statement_type.as_deref(),
            record.statement_type.as_deref(),
        ) {
            return false;
        }
        if self
            .request_id
            .as_deref()
            .is_some_and(|id| id != record.request_id)
        {
            return false;
        }
        if self.from.is_some_and(|from| record.timestamp < from) {
            return false;
        }
        if self.to.is_some_and(|to| record.timestamp > to) {
            return false;
        }
        true
    }
}

fn matches_opt(filter: Option<&str>, value: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(wanted) => value.is_some_and(|v| v.eq_ignore_ascii_case(wanted)),
    }
}
