// ABOUTME: HTTP route assembly for the gateway server
// ABOUTME: Merges health, gateway and admin routes and applies tracing and body limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! Route modules contain only route definitions and thin handlers that
//! delegate to the gateway, the resolver and the admin services.

use std::sync::Arc;

use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

use crate::constants::defaults::MAX_BODY_BYTES;
use crate::resources::ServerResources;

/// Admin hooks and audit queries
pub mod admin;
/// Gateway execution routes
pub mod gateway;
/// Liveness
pub mod health;

pub use admin::AdminRoutes;
pub use gateway::GatewayRoutes;
pub use health::HealthRoutes;

/// Complete application router
pub fn router(resources: &Arc<ServerResources>) -> Router {
    Router::new()
        .merge(HealthRoutes::routes())
        .merge(GatewayRoutes::routes(Arc::clone(resources)))
        .merge(AdminRoutes::routes(Arc::clone(resources)))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
}
