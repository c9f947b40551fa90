// ABOUTME: Ordered request stages for the gateway pipeline
// ABOUTME: Each stage returns its output or a Rejection tagged with stage and audit status
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Pipeline Stages
//!
//! Every stage is a plain function so it can be tested on its own. A stage
//! either yields the value the next stage needs or a [`Rejection`] that ends
//! the request and decides how the attempt is audited.

use std::fmt;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::CallerIdentity;
use crate::config::EnvelopeConfig;
use crate::crypto::decode_body;
use crate::errors::{AppError, ErrorCode};
use crate::models::{ApiDefinition, ApiStatus, AuditStatus, AuthMode, Policy};
use crate::rate_limiting::{RateLimitDecision, RateLimiter};
use crate::sql::{PolicyValidator, SqlValue, ValidatedStatement, ValidationScope};
use crate::templates::{param_errors_to_app_error, render, validate_params, RenderedStatement};
use crate::tenant::TenantContext;

/// Pipeline stage names, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Tenant context lookup
    Resolve,
    /// Per-caller request window
    RateLimit,
    /// API definition lookup
    LoadDefinition,
    /// API auth mode check
    Authorize,
    /// Envelope unwrapping
    Envelope,
    /// Body, parameter and policy validation
    Validate,
    /// Statement execution
    Execute,
}

impl Stage {
    /// Log label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::RateLimit => "rate_limit",
            Self::LoadDefinition => "load_definition",
            Self::Authorize => "authorize",
            Self::Envelope => "envelope",
            Self::Validate => "validate",
            Self::Execute => "execute",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal stage failure
#[derive(Debug, Clone)]
pub struct Rejection {
    /// Stage that rejected the request
    pub stage: Stage,
    /// How the attempt is audited
    pub status: AuditStatus,
    /// Caller-facing error
    pub error: AppError,
}

impl Rejection {
    /// Caller or policy fault, audited as blocked
    #[must_use]
    pub const fn blocked(stage: Stage, error: AppError) -> Self {
        Self {
            stage,
            status: AuditStatus::Blocked,
            error,
        }
    }

    /// Downstream or configuration failure, audited as error
    #[must_use]
    pub const fn failed(stage: Stage, error: AppError) -> Self {
        Self {
            stage,
            status: AuditStatus::Error,
            error,
        }
    }

    /// Classify an error by its code: caller and policy faults are blocked,
    /// everything else is an error
    #[must_use]
    pub fn from_error(stage: Stage, error: AppError) -> Self {
        match error.code {
            ErrorCode::InvalidInput
            | ErrorCode::PolicyViolation
            | ErrorCode::CryptoFailure
            | ErrorCode::ResourceNotFound
            | ErrorCode::AuthRequired
            | ErrorCode::PermissionDenied => Self::blocked(stage, error),
            ErrorCode::RateLimitExceeded => Self {
                stage,
                status: AuditStatus::RateLimited,
                error,
            },
            ErrorCode::ExecutionFailed
            | ErrorCode::ConfigError
            | ErrorCode::DatabaseError
            | ErrorCode::InternalError => Self::failed(stage, error),
        }
    }
}

/// Stage result
pub type StageResult<T> = Result<T, Rejection>;

/// Ad-hoc execution body
#[derive(Debug, Clone, Deserialize)]
pub struct SqlCall {
    /// Statement text
    pub sql: String,
    /// Positional values for `$1..$n`
    #[serde(default)]
    pub params: Vec<Value>,
}

impl SqlCall {
    /// Positional bind values
    #[must_use]
    pub fn bind_values(&self) -> Vec<SqlValue> {
        self.params.iter().cloned().map(SqlValue::from_json).collect()
    }
}

/// Rendered templated call ready to execute
#[derive(Debug, Clone)]
pub struct PreparedCall {
    /// Parameterized statement and its values
    pub rendered: RenderedStatement,
    /// Statement re-validated against the current tenant policy
    pub validated: ValidatedStatement,
}

/// Count the request against the caller's window
///
/// # Errors
///
/// Rejects with `RateLimitExceeded` carrying retry metadata in `details`
pub fn check_rate_limit(limiter: &RateLimiter, caller_key: &str) -> StageResult<RateLimitDecision> {
    let decision = limiter.check(caller_key);
    if decision.is_rate_limited {
        return Err(Rejection::from_error(
            Stage::RateLimit,
            AppError::rate_limited("rate limit exceeded").with_details(json!({
                "limit": decision.limit,
                "retryAfterSeconds": decision.retry_after_seconds,
                "resetAt": decision.reset_at,
            })),
        ));
    }
    Ok(decision)
}

/// Unwrap an envelope with the tenant passphrase, falling back to the global one
///
/// # Errors
///
/// Rejects (blocked) on a generic crypto failure or a required-but-missing envelope
pub fn decode_envelope(
    body: Value,
    context: &TenantContext,
    envelope: &EnvelopeConfig,
) -> StageResult<Value> {
    let passphrase = context
        .envelope_passphrase
        .as_ref()
        .or(envelope.passphrase.as_ref())
        .map(|p| p.as_str());
    let require = context.require_envelope || envelope.require_envelope;

    decode_body(body, passphrase, require)
        .map(crate::crypto::DecodedBody::into_value)
        .map_err(|e| Rejection::blocked(Stage::Envelope, e))
}

/// Parse the ad-hoc body
///
/// # Errors
///
/// Rejects (blocked) when the body is not `{sql, params?}`
pub fn parse_sql_call(body: Value) -> StageResult<SqlCall> {
    serde_json::from_value::<SqlCall>(body).map_err(|_| {
        Rejection::blocked(
            Stage::Validate,
            AppError::invalid_input(
                "body must be an object with a 'sql' string and optional 'params' array",
            ),
        )
    })
}

/// Full policy validation for an ad-hoc statement
///
/// # Errors
///
/// Rejects (blocked) with the validator's reason
pub fn validate_sql(
    validator: &PolicyValidator,
    call: &SqlCall,
    caller: &CallerIdentity,
    policy: &Policy,
) -> StageResult<ValidatedStatement> {
    validator
        .validate(&call.sql, caller.role.as_deref(), policy)
        .map_err(|e| Rejection::blocked(Stage::Validate, e))
}

/// Apply the definition's status and auth mode to the caller
///
/// # Errors
///
/// Rejects (blocked) with not-found for disabled definitions and
/// `AuthRequired` when an anonymous caller is not allowed
pub fn authorize_api(
    definition: &ApiDefinition,
    caller: &CallerIdentity,
    policy: &Policy,
) -> StageResult<()> {
    if definition.status == ApiStatus::Disabled {
        return Err(Rejection::blocked(
            Stage::Authorize,
            AppError::not_found("API definition"),
        ));
    }

    let anonymous_allowed = definition.auth_mode == AuthMode::Public && policy.public_access;
    if caller.actor.is_none() && !anonymous_allowed {
        return Err(Rejection::blocked(
            Stage::Authorize,
            AppError::auth_required("caller identity required"),
        ));
    }
    Ok(())
}

/// Validate caller parameters, render the template and re-check tenant policy
///
/// # Errors
///
/// Rejects (blocked) with the full parameter error list, a missing-parameter
/// render error, or a tenant policy violation
pub fn prepare_api_call(
    definition: &ApiDefinition,
    body: Value,
    policy: &Policy,
    validator: &PolicyValidator,
) -> StageResult<PreparedCall> {
    let raw = match body {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        _ => {
            return Err(Rejection::blocked(
                Stage::Validate,
                AppError::invalid_input("parameters must be a JSON object"),
            ))
        }
    };

    let params = validate_params(&definition.params_schema, &raw)
        .map_err(|errors| Rejection::blocked(Stage::Validate, param_errors_to_app_error(&errors)))?;

    let rendered = render(&definition.sql_template, &params)
        .map_err(|e| Rejection::blocked(Stage::Validate, e))?;

    let validated = validator
        .validate_scoped(&rendered.sql, ValidationScope::TenantOnly, policy)
        .map_err(|e| Rejection::blocked(Stage::Validate, e))?;

    Ok(PreparedCall {
        rendered,
        validated,
    })
}
