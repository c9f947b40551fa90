// ABOUTME: Administrative hooks: cache invalidation, API definition writes, probes and audit queries
// ABOUTME: Guarded by a static bearer token compared in constant time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::{ApiDefinitionInput, AuditQuery, TenantKey};
use crate::resources::ServerResources;

/// Admin and audit routes
pub struct AdminRoutes;

impl AdminRoutes {
    /// Create all admin routes; every handler authenticates before reading its input
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/v1/admin/:project/:environment/invalidate",
                post(Self::handle_invalidate),
            )
            .route(
                "/api/v1/admin/:project/:environment/probe",
                post(Self::handle_probe),
            )
            .route(
                "/api/v1/admin/:project/:environment/apis",
                get(Self::handle_list_apis),
            )
            .route(
                "/api/v1/admin/:project/:environment/apis/:api_key",
                put(Self::handle_save_api).delete(Self::handle_delete_api),
            )
            .route("/api/v1/audit", get(Self::handle_audit_query))
            .with_state(resources)
    }

    /// Check the bearer token against the configured admin token
    fn authenticate(headers: &HeaderMap, resources: &ServerResources) -> Result<(), AppError> {
        let Some(expected) = resources.config.admin_token.as_ref() else {
            return Err(AppError::permission_denied("admin routes are disabled"));
        };

        let supplied = headers
            .get("authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::auth_required("Missing bearer token"))?;

        if bool::from(supplied.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(())
        } else {
            warn!("admin request rejected: invalid token");
            Err(AppError::auth_required("Invalid bearer token"))
        }
    }

    /// Handle POST /api/v1/admin/:project/:environment/invalidate
    async fn handle_invalidate(
        State(resources): State<Arc<ServerResources>>,
        Path((project, environment)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        Self::authenticate(&headers, &resources)?;
        let key = TenantKey::new(&project, &environment)?;

        resources.resolver.invalidate(&key);
        resources.api_cache.invalidate_tenant(&key);
        info!(tenant = %key, "tenant caches invalidated by admin");

        Ok(Json(json!({ "ok": true, "tenant": key.to_string() })).into_response())
    }

    /// Handle POST /api/v1/admin/:project/:environment/probe
    async fn handle_probe(
        State(resources): State<Arc<ServerResources>>,
        Path((project, environment)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        Self::authenticate(&headers, &resources)?;
        let key = TenantKey::new(&project, &environment)?;

        let context = resources.resolver.resolve(&key, true).await?;
        let report = resources.connections.probe(&context).await;

        Ok(Json(report).into_response())
    }

    /// Handle GET /api/v1/admin/:project/:environment/apis
    async fn handle_list_apis(
        State(resources): State<Arc<ServerResources>>,
        Path((project, environment)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        Self::authenticate(&headers, &resources)?;
        let key = TenantKey::new(&project, &environment)?;

        let definitions = resources.api_service.list(&key).await?;
        Ok(Json(json!({ "ok": true, "apis": definitions })).into_response())
    }

    /// Handle PUT /api/v1/admin/:project/:environment/apis/:api_key
    async fn handle_save_api(
        State(resources): State<Arc<ServerResources>>,
        Path((project, environment, api_key)): Path<(String, String, String)>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response, AppError> {
        Self::authenticate(&headers, &resources)?;
        let key = TenantKey::new(&project, &environment)?;
        let input: ApiDefinitionInput = serde_json::from_slice(&body)
            .map_err(|e| AppError::invalid_input(format!("invalid API definition: {e}")))?;

        let definition = resources.api_service.save(&key, &api_key, &input).await?;
        Ok(Json(json!({ "ok": true, "api": definition })).into_response())
    }

    /// Handle DELETE /api/v1/admin/:project/:environment/apis/:api_key
    async fn handle_delete_api(
        State(resources): State<Arc<ServerResources>>,
        Path((project, environment, api_key)): Path<(String, String, String)>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        Self::authenticate(&headers, &resources)?;
        let key = TenantKey::new(&project, &environment)?;

        resources.api_service.delete(&key, &api_key).await?;
        Ok(Json(json!({ "ok": true })).into_response())
    }

    /// Handle GET /api/v1/audit
    async fn handle_audit_query(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        uri: Uri,
    ) -> Result<Response, AppError> {
        Self::authenticate(&headers, &resources)?;
        let Query(query) = Query::<AuditQuery>::try_from_uri(&uri)
            .map_err(|e| AppError::invalid_input(e.body_text()))?;

        let records = resources.audit.query(&query).await?;
        Ok(Json(json!({
            "ok": true,
            "count": records.len(),
            "records": records,
        }))
        .into_response())
    }
}
