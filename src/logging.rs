// ABOUTME: Tracing subscriber setup with env-filter and optional JSON output
// ABOUTME: Quiets noisy dependency targets and honours RUST_LOG / SQLGATE_LOG_FORMAT
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use std::env;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::constants::env_vars;
use crate::errors::{AppError, AppResult};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable text
    Text,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Parse a format name; anything unrecognised is text
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "json" | "jsonl" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Format selected by `SQLGATE_LOG_FORMAT`
    #[must_use]
    pub fn from_env() -> Self {
        env::var(env_vars::LOG_FORMAT).map_or(Self::Text, |v| Self::parse(&v))
    }
}

fn build_env_filter() -> AppResult<EnvFilter> {
    let base = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned());
    let mut directives = vec![base];
    for (target, level) in [
        ("sqlx", "warn"),
        ("sqlparser", "warn"),
        ("hyper", "warn"),
        ("tower_http", "info"),
    ] {
        directives.push(format!("{target}={level}"));
    }
    let filter = directives.join(",");
    EnvFilter::try_new(&filter)
        .map_err(|e| AppError::config(format!("invalid tracing filter '{filter}': {e}")))
}

/// Install the global tracing subscriber
///
/// # Errors
///
/// Returns `ConfigError` if the filter is invalid or a subscriber is already set
pub fn init_logging(format: LogFormat) -> AppResult<()> {
    let filter = build_env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        #[cfg(feature = "json-logs")]
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        #[cfg(not(feature = "json-logs"))]
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };

    result.map_err(|e| AppError::config(format!("failed to install tracing subscriber: {e}")))
}
