// ABOUTME: Append-only JSONL audit trail with one record per gateway attempt
// ABOUTME: Write failures are logged and swallowed; queries scan newest-first with filters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Audit Pipeline
//!
//! Records are serialized one per line and appended under a process-wide lock
//! so concurrent writers never interleave. Nothing ever rewrites the file.
//! Retrieval is a linear reverse scan; unparsable lines are skipped.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::AuditConfig;
use crate::constants::audit::{DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT, PREVIEW_CHARS};
use crate::errors::{AppError, AppResult};
pub use crate::models::{AuditQuery, AuditRecord, AuditStatus};

/// Collapse whitespace and truncate a statement for the audit preview
#[must_use]
pub fn statement_preview(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}

/// Audit writer and reader over one JSONL file
pub struct AuditLogger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditLogger {
    /// Logger appending to the configured file; nothing is opened until the first write
    #[must_use]
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            path: config.log_path.clone(),
            write_lock: Mutex::new(()),
        }
    }

    /// Audit file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record; never fails the caller
    pub async fn record(&self, record: &AuditRecord) {
        Self::log_to_structured_logger(record);
        if let Err(e) = self.append(record).await {
            error!(
                request_id = %record.request_id,
                error = %e,
                "Failed to write audit record"
            );
        }
    }

    fn log_to_structured_logger(record: &AuditRecord) {
        match record.status {
            AuditStatus::Ok => debug!(
                request_id = %record.request_id,
                project = %record.project,
                environment = %record.environment,
                endpoint = %record.endpoint,
                duration_ms = record.duration_ms,
                "gateway call succeeded"
            ),
            AuditStatus::Blocked | AuditStatus::RateLimited => info!(
                request_id = %record.request_id,
                project = %record.project,
                environment = %record.environment,
                status = record.status.as_str(),
                actor = ?record.actor,
                reason = ?record.error,
                "gateway call rejected"
            ),
            AuditStatus::Error => warn!(
                request_id = %record.request_id,
                project = %record.project,
                environment = %record.environment,
                endpoint = %record.endpoint,
                error = ?record.error,
                "gateway call failed"
            ),
        }
    }

    async fn append(&self, record: &AuditRecord) -> AppResult<()> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| AppError::internal(format!("Failed to serialize audit record: {e}")))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::internal(format!("Failed to create audit directory: {e}"))
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AppError::internal(format!("Failed to open audit log: {e}")))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::internal(format!("Failed to append audit record: {e}")))?;
        file.flush()
            .await
            .map_err(|e| AppError::internal(format!("Failed to flush audit log: {e}")))?;
        Ok(())
    }

    /// Newest-first records matching every filter, bounded by the query limit
    ///
    /// # Errors
    ///
    /// Returns `InternalError` if the audit file exists but cannot be read
    pub async fn query(&self, query: &AuditQuery) -> AppResult<Vec<AuditRecord>> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT);

        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::internal(format!("Failed to read audit log: {e}"))),
        };

        Ok(contents
            .lines()
            .rev()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<AuditRecord>(line).ok())
            .filter(|record| query.matches(record))
            .take(limit)
            .collect())
    }
}
