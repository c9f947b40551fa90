// ABOUTME: One bounded PostgreSQL pool per tenant, replaced when credentials rotate
// ABOUTME: Stale pools close in the background; probes use a one-off timed connection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Tenant Connection Manager
//!
//! Pools are keyed by [`TenantKey`] and tagged with the signature of the
//! connection parameters they were built from. A changed signature means the
//! tenant's credentials rotated: the new pool is installed first and the old
//! one is closed on a spawned task so the current request never waits on it.
//!
//! Pools are created lazily, so no physical connection is opened until the
//! first statement runs.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::Connection;
use tracing::{debug, info, warn};

use super::resolver::{ConnectionParams, TenantContext};
use crate::config::PoolConfig;
use crate::models::TenantKey;

struct PoolEntry {
    signature: String,
    pool: PgPool,
}

/// Outcome of a connectivity probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    /// Whether `SELECT 1` succeeded within the timeout
    pub ok: bool,
    /// Wall time spent
    pub latency_ms: u64,
    /// Driver error or timeout description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Owns every tenant pool in the process
pub struct TenantConnectionManager {
    config: PoolConfig,
    pools: DashMap<TenantKey, PoolEntry>,
}

impl TenantConnectionManager {
    /// Create an empty manager
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            pools: DashMap::new(),
        }
    }

    /// Pool for a tenant, created or replaced as needed
    ///
    /// Must be called from within a Tokio runtime; a replaced pool is closed on
    /// a spawned task.
    #[must_use]
    pub fn get_pool(&self, context: &TenantContext) -> PgPool {
        let signature = context.connection.signature();

        match self.pools.entry(context.key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().signature == signature {
                    return occupied.get().pool.clone();
                }
                let pool = self.build_pool(&context.connection);
                let stale = occupied.insert(PoolEntry {
                    signature,
                    pool: pool.clone(),
                });
                info!(tenant = %context.key, "connection parameters changed, replacing tenant pool");
                tokio::spawn(async move {
                    stale.pool.close().await;
                });
                pool
            }
            Entry::Vacant(vacant) => {
                let pool = self.build_pool(&context.connection);
                vacant.insert(PoolEntry {
                    signature,
                    pool: pool.clone(),
                });
                debug!(tenant = %context.key, "tenant pool created");
                pool
            }
        }
    }

    /// Number of live tenant pools
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Close and forget every pool (process shutdown)
    pub async fn close_all(&self) {
        let keys: Vec<TenantKey> = self.pools.iter().map(|entry| entry.key().clone()).collect();
        let mut closed = 0_usize;
        for key in keys {
            if let Some((_, entry)) = self.pools.remove(&key) {
                entry.pool.close().await;
                closed += 1;
            }
        }
        info!(pools = closed, "tenant pools closed");
    }

    /// Open a one-off connection and run `SELECT 1` under the probe timeout
    pub async fn probe(&self, context: &TenantContext) -> ProbeReport {
        let started = Instant::now();
        let options = context.connection.connect_options();

        let outcome = tokio::time::timeout(self.config.probe_timeout, async {
            let mut connection = PgConnection::connect_with(&options).await?;
            sqlx::query("SELECT 1").execute(&mut connection).await?;
            connection.close().await
        })
        .await;

        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "connection timed out after {}s",
                self.config.probe_timeout.as_secs()
            )),
        };

        if let Some(reason) = &error {
            warn!(tenant = %context.key, latency_ms, error = %reason, "tenant probe failed");
        } else {
            info!(tenant = %context.key, latency_ms, "tenant probe succeeded");
        }

        ProbeReport {
            ok: error.is_none(),
            latency_ms,
            error,
        }
    }

    fn build_pool(&self, params: &ConnectionParams) -> PgPool {
        PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Some(Duration::from_secs(300)))
            .connect_lazy_with(params.connect_options())
    }
}
