// ABOUTME: Liveness endpoint for load balancers and orchestrators
// ABOUTME: Reports process health without touching tenant databases
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

/// Health routes
pub struct HealthRoutes;

impl HealthRoutes {
    /// GET /health
    pub fn routes() -> Router {
        Router::new().route("/health", get(Self::handle_health))
    }

    async fn handle_health() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }
}
