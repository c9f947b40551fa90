// ABOUTME: Gateway pipeline for ad-hoc SQL and templated API calls
// ABOUTME: Runs the ordered stages, executes on the tenant pool and audits every attempt once
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Gateway
//!
//! Both entry points follow the same shape: resolve the tenant, run the
//! stages in order, then write exactly one audit record for the outcome.
//! An unknown tenant is the only outcome that is not audited, since there is
//! no tenant scope to attribute it to.
//!
//! Ad-hoc path: rate limit, envelope, body parse, full policy validation,
//! execute. Templated path: rate limit, definition lookup, auth mode,
//! envelope, parameter validation and render, tenant policy re-check, execute,
//! shape.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EnvelopeConfig;
use crate::constants::ANONYMOUS_CALLER;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{AuditRecord, AuditStatus, StatementType, TenantKey};
use crate::rate_limiting::RateLimiter;
use crate::security::{statement_preview, AuditLogger};
use crate::sql::PolicyValidator;
use crate::templates::shape_rows;
use crate::tenant::{ApiDefinitionCache, ConfigResolver, TenantContext};

/// Statement execution against tenant pools
pub mod executor;
/// Individual pipeline stages
pub mod stages;

use executor::{ExecutionOutcome, StatementExecutor};
use stages::{Rejection, Stage, StageResult};

/// Caller identity as asserted by the fronting auth layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Authenticated actor
    pub actor: Option<String>,
    /// Actor's role
    pub role: Option<String>,
    /// Client address chain
    pub forwarded_for: Option<String>,
}

impl CallerIdentity {
    /// Build an identity, treating blank values as absent
    #[must_use]
    pub fn new(actor: Option<String>, role: Option<String>, forwarded_for: Option<String>) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        }
        Self {
            actor: clean(actor),
            role: clean(role),
            forwarded_for: clean(forwarded_for),
        }
    }

    /// Actor, else the first forwarded address, else the anonymous bucket
    #[must_use]
    pub fn rate_limit_key(&self) -> &str {
        if let Some(actor) = &self.actor {
            return actor;
        }
        self.forwarded_for
            .as_deref()
            .and_then(|chain| chain.split(',').next())
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .unwrap_or(ANONYMOUS_CALLER)
    }
}

/// Successful gateway response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    /// Always true
    pub ok: bool,
    /// Statement class
    #[serde(rename = "type")]
    pub statement_type: StatementType,
    /// Called API (templated path only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Definition version that served the call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Rows returned by a SELECT
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    /// Rows touched by a data-modifying statement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
    /// Rows, shaped data, or null for data-modifying statements
    pub data: Value,
    /// Correlates with the audit record
    pub request_id: String,
}

struct Completed {
    statement_type: StatementType,
    row_count: Option<u64>,
    affected_rows: Option<u64>,
    data: Value,
    api: Option<(String, i64)>,
}

impl Completed {
    fn from_outcome(
        statement_type: StatementType,
        outcome: ExecutionOutcome,
        shape: impl FnOnce(Vec<serde_json::Map<String, Value>>) -> Value,
    ) -> Self {
        match outcome {
            ExecutionOutcome::Rows(rows) => Self {
                statement_type,
                row_count: Some(rows.len() as u64),
                affected_rows: None,
                data: shape(rows),
                api: None,
            },
            ExecutionOutcome::Affected(count) => Self {
                statement_type,
                row_count: None,
                affected_rows: Some(count),
                data: Value::Null,
                api: None,
            },
        }
    }
}

/// Audit facts gathered while the stages run
struct Attempt {
    request_id: String,
    started: Instant,
    key: TenantKey,
    actor: Option<String>,
    role: Option<String>,
    endpoint: String,
    statement_type: Option<StatementType>,
    tables: Vec<String>,
    preview: Option<String>,
    param_count: usize,
}

impl Attempt {
    fn begin(key: &TenantKey, caller: &CallerIdentity, endpoint: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            started: Instant::now(),
            key: key.clone(),
            actor: caller.actor.clone(),
            role: caller.role.clone(),
            endpoint,
            statement_type: None,
            tables: Vec::new(),
            preview: None,
            param_count: 0,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn into_record(
        self,
        status: AuditStatus,
        completed: Option<&Completed>,
        error: Option<&AppError>,
    ) -> AuditRecord {
        let duration_ms = self.elapsed_ms();
        AuditRecord {
            request_id: self.request_id,
            timestamp: Utc::now(),
            status,
            project: self.key.project,
            environment: self.key.environment,
            actor: self.actor,
            role: self.role,
            endpoint: self.endpoint,
            statement_type: self.statement_type.map(|t| t.as_str().to_owned()),
            tables: self.tables,
            preview: self.preview,
            param_count: self.param_count,
            row_count: completed.and_then(|c| c.row_count),
            affected_rows: completed.and_then(|c| c.affected_rows),
            duration_ms,
            error: error.map(|e| e.message.clone()),
        }
    }
}

/// The execution gateway
pub struct Gateway {
    resolver: Arc<ConfigResolver>,
    api_cache: Arc<ApiDefinitionCache>,
    executor: Arc<dyn StatementExecutor>,
    rate_limiter: Arc<RateLimiter>,
    audit: Arc<AuditLogger>,
    validator: PolicyValidator,
    envelope: EnvelopeConfig,
}

impl Gateway {
    /// Assemble the pipeline from its shared components
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        resolver: Arc<ConfigResolver>,
        api_cache: Arc<ApiDefinitionCache>,
        executor: Arc<dyn StatementExecutor>,
        rate_limiter: Arc<RateLimiter>,
        audit: Arc<AuditLogger>,
        validator: PolicyValidator,
        envelope: EnvelopeConfig,
    ) -> Self {
        Self {
            resolver,
            api_cache,
            executor,
            rate_limiter,
            audit,
            validator,
            envelope,
        }
    }

    /// Validate and execute ad-hoc SQL for a tenant
    ///
    /// # Errors
    ///
    /// Returns the rejecting stage's error, tagged with the request id
    pub async fn execute_sql(
        &self,
        key: &TenantKey,
        caller: &CallerIdentity,
        body: Value,
    ) -> AppResult<GatewayResponse> {
        let attempt = Attempt::begin(key, caller, "sql".to_owned());
        let (context, mut attempt) = self.resolve(key, attempt).await?;

        let result = self.run_sql(&context, caller, body, &mut attempt).await;
        self.finish(attempt, result).await
    }

    /// Validate parameters for a templated API and execute it
    ///
    /// # Errors
    ///
    /// Returns the rejecting stage's error, tagged with the request id
    pub async fn call_api(
        &self,
        key: &TenantKey,
        api_key: &str,
        caller: &CallerIdentity,
        body: Value,
    ) -> AppResult<GatewayResponse> {
        let attempt = Attempt::begin(key, caller, format!("api:{api_key}"));
        let (context, mut attempt) = self.resolve(key, attempt).await?;

        let result = self
            .run_api(&context, api_key, caller, body, &mut attempt)
            .await;
        self.finish(attempt, result).await
    }

    async fn resolve(
        &self,
        key: &TenantKey,
        attempt: Attempt,
    ) -> AppResult<(Arc<TenantContext>, Attempt)> {
        match self.resolver.resolve(key, false).await {
            Ok(context) => Ok((context, attempt)),
            Err(e) if e.code == ErrorCode::ResourceNotFound => {
                debug!(tenant = %key, request_id = %attempt.request_id, "unknown tenant");
                Err(e.with_request_id(attempt.request_id))
            }
            Err(e) => Err(self.reject(attempt, Rejection::from_error(Stage::Resolve, e)).await),
        }
    }

    async fn run_sql(
        &self,
        context: &TenantContext,
        caller: &CallerIdentity,
        body: Value,
        attempt: &mut Attempt,
    ) -> StageResult<Completed> {
        stages::check_rate_limit(&self.rate_limiter, &rate_limit_key(&context.key, caller))?;
        let body = stages::decode_envelope(body, context, &self.envelope)?;

        let call = stages::parse_sql_call(body)?;
        let values = call.bind_values();
        attempt.preview = Some(statement_preview(&call.sql));
        attempt.param_count = values.len();

        let validated = stages::validate_sql(&self.validator, &call, caller, &context.policy)?;
        attempt.statement_type = Some(validated.statement_type);
        attempt.tables.clone_from(&validated.tables);

        let outcome = self
            .executor
            .execute(context, validated.statement_type, &call.sql, &values)
            .await
            .map_err(|e| Rejection::failed(Stage::Execute, e))?;

        Ok(Completed::from_outcome(
            validated.statement_type,
            outcome,
            |rows| Value::Array(rows.into_iter().map(Value::Object).collect()),
        ))
    }

    async fn run_api(
        &self,
        context: &TenantContext,
        api_key: &str,
        caller: &CallerIdentity,
        body: Value,
        attempt: &mut Attempt,
    ) -> StageResult<Completed> {
        stages::check_rate_limit(&self.rate_limiter, &rate_limit_key(&context.key, caller))?;

        let definition = self
            .api_cache
            .get(&context.key, api_key)
            .await
            .map_err(|e| Rejection::from_error(Stage::LoadDefinition, e))?;
        attempt.statement_type = Some(definition.statement_type);
        attempt.preview = Some(statement_preview(&definition.sql_template));

        stages::authorize_api(&definition, caller, &context.policy)?;
        let body = stages::decode_envelope(body, context, &self.envelope)?;

        let prepared =
            stages::prepare_api_call(&definition, body, &context.policy, &self.validator)?;
        attempt.param_count = prepared.rendered.values.len();
        attempt.tables.clone_from(&prepared.validated.tables);

        let statement_type = prepared.validated.statement_type;
        let outcome = self
            .executor
            .execute(
                context,
                statement_type,
                &prepared.rendered.sql,
                &prepared.rendered.values,
            )
            .await
            .map_err(|e| Rejection::failed(Stage::Execute, e))?;

        let mut completed = Completed::from_outcome(statement_type, outcome, |rows| {
            shape_rows(rows, &definition.result_mapping)
        });
        completed.api = Some((definition.api_key.clone(), definition.version));
        Ok(completed)
    }

    async fn finish(
        &self,
        attempt: Attempt,
        result: StageResult<Completed>,
    ) -> AppResult<GatewayResponse> {
        match result {
            Ok(completed) => {
                let request_id = attempt.request_id.clone();
                info!(
                    request_id = %request_id,
                    project = %attempt.key.project,
                    environment = %attempt.key.environment,
                    endpoint = %attempt.endpoint,
                    duration_ms = attempt.elapsed_ms(),
                    "gateway call completed"
                );
                self.audit
                    .record(&attempt.into_record(AuditStatus::Ok, Some(&completed), None))
                    .await;

                let (api_key, version) = completed.api.unzip();
                Ok(GatewayResponse {
                    ok: true,
                    statement_type: completed.statement_type,
                    api_key,
                    version,
                    row_count: completed.row_count,
                    affected_rows: completed.affected_rows,
                    data: completed.data,
                    request_id,
                })
            }
            Err(rejection) => Err(self.reject(attempt, rejection).await),
        }
    }

    async fn reject(&self, attempt: Attempt, rejection: Rejection) -> AppError {
        let request_id = attempt.request_id.clone();
        debug!(
            request_id = %request_id,
            stage = %rejection.stage,
            status = rejection.status.as_str(),
            "gateway stage rejected request"
        );
        self.audit
            .record(&attempt.into_record(rejection.status, None, Some(&rejection.error)))
            .await;
        rejection.error.with_request_id(request_id)
    }
}

fn rate_limit_key(key: &TenantKey, caller: &CallerIdentity) -> String {
    format!("{key}:{}", caller.rate_limit_key())
}
