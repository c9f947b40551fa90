// ABOUTME: Tenant identity type keyed by project and environment
// ABOUTME: Normalizes identifiers so cache and pool lookups never diverge on case or whitespace
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Longest accepted project or environment identifier
const MAX_SEGMENT_LEN: usize = 64;

/// One (project, environment) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantKey {
    /// Project identifier (normalized)
    pub project: String,
    /// Environment identifier (normalized)
    pub environment: String,
}

impl TenantKey {
    /// Build a normalized tenant key
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if either segment is empty, too long, or contains
    /// characters outside `[a-z0-9_-]` after normalization
    pub fn new(project: &str, environment: &str) -> AppResult<Self> {
        Ok(Self {
            project: normalize_segment("project", project)?,
            environment: normalize_segment("environment", environment)?,
        })
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.environment)
    }
}

fn normalize_segment(label: &str, raw: &str) -> AppResult<String> {
    let value = raw.trim().to_lowercase();
    if value.is_empty() {
        return Err(AppError::invalid_input(format!("{label} is required")));
    }
    if value.len() > MAX_SEGMENT_LEN {
        return Err(AppError::invalid_input(format!("{label} is too long")));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(AppError::invalid_input(format!(
            "{label} contains invalid characters"
        )));
    }
    Ok(value)
}
