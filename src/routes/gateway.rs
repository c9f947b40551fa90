// ABOUTME: HTTP surface for ad-hoc SQL execution and templated API calls
// ABOUTME: Extracts tenant and caller identity, delegates to the gateway pipeline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::Value;

use crate::constants::headers as header_names;
use crate::errors::{AppError, ErrorCode};
use crate::gateway::CallerIdentity;
use crate::models::TenantKey;
use crate::resources::ServerResources;

/// Gateway execution routes
pub struct GatewayRoutes;

impl GatewayRoutes {
    /// Create all gateway routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/:project/:environment/sql", post(Self::handle_sql))
            .route(
                "/api/v1/:project/:environment/apis/:api_key",
                post(Self::handle_api),
            )
            .with_state(resources)
    }

    /// Handle POST /api/v1/:project/:environment/sql
    async fn handle_sql(
        State(resources): State<Arc<ServerResources>>,
        Path((project, environment)): Path<(String, String)>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let outcome = async {
            let key = TenantKey::new(&project, &environment)?;
            let body = parse_body(&body)?;
            resources
                .gateway
                .execute_sql(&key, &caller_from_headers(&headers), body)
                .await
        }
        .await;

        match outcome {
            Ok(response) => {
                let request_id = response.request_id.clone();
                with_request_id(Json(response).into_response(), Some(&request_id))
            }
            Err(e) => error_response(e),
        }
    }

    /// Handle POST /api/v1/:project/:environment/apis/:api_key
    async fn handle_api(
        State(resources): State<Arc<ServerResources>>,
        Path((project, environment, api_key)): Path<(String, String, String)>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let outcome = async {
            let key = TenantKey::new(&project, &environment)?;
            let body = parse_body(&body)?;
            resources
                .gateway
                .call_api(&key, &api_key, &caller_from_headers(&headers), body)
                .await
        }
        .await;

        match outcome {
            Ok(response) => {
                let request_id = response.request_id.clone();
                with_request_id(Json(response).into_response(), Some(&request_id))
            }
            Err(e) => error_response(e),
        }
    }
}

/// Caller identity from the headers set by the fronting auth layer
#[must_use]
pub fn caller_from_headers(headers: &HeaderMap) -> CallerIdentity {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    CallerIdentity::new(
        header(header_names::ACTOR),
        header(header_names::ROLE),
        header(header_names::FORWARDED_FOR),
    )
}

fn parse_body(body: &Bytes) -> Result<Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|_| AppError::invalid_input("request body must be valid JSON"))
}

fn with_request_id(mut response: Response, request_id: Option<&str>) -> Response {
    if let Some(value) = request_id.and_then(|id| HeaderValue::from_str(id).ok()) {
        response.headers_mut().insert(header_names::REQUEST_ID, value);
    }
    response
}

/// Error response carrying the request id header and, when rate limited, `Retry-After`
fn error_response(error: AppError) -> Response {
    let retry_after = (error.code == ErrorCode::RateLimitExceeded)
        .then(|| {
            error
                .details
                .as_ref()
                .and_then(|d| d.get("retryAfterSeconds"))
                .and_then(Value::as_u64)
        })
        .flatten();
    let request_id = error.request_id.clone();

    let mut response = with_request_id(error.into_response(), request_id.as_deref());
    if let Some(value) = retry_after.and_then(|s| HeaderValue::from_str(&s.to_string()).ok()) {
        response.headers_mut().insert(header_names::RETRY_AFTER, value);
    }
    response
}
