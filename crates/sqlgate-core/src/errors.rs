// ABOUTME: Unified error type shared by every gateway component
// ABOUTME: ErrorCode taxonomy, AppError constructors, and the uniform HTTP error envelope
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Gateway Errors
//!
//! Every fallible operation in the gateway returns [`AppResult`]. The
//! [`ErrorCode`] decides both the HTTP status and how the failure is audited.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Generic message used for every envelope or secret failure (no oracle)
pub const GENERIC_CRYPTO_MESSAGE: &str = "invalid request envelope";

/// Error taxonomy for the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed input or schema violation
    InvalidInput,
    /// Statement type, table, role or limit rule violated
    PolicyViolation,
    /// Envelope decode or secret decrypt failure
    CryptoFailure,
    /// Underlying tenant database failure
    ExecutionFailed,
    /// Caller exceeded its request window
    RateLimitExceeded,
    /// Tenant, API definition or other resource does not exist
    ResourceNotFound,
    /// Caller identity required but missing
    AuthRequired,
    /// Caller identity present but not allowed
    PermissionDenied,
    /// Configuration is missing or invalid
    ConfigError,
    /// Config store failure
    DatabaseError,
    /// Anything else
    InternalError,
}

impl ErrorCode {
    /// HTTP status code for this error class
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidInput | Self::CryptoFailure => 400,
            Self::AuthRequired => 401,
            Self::PolicyViolation | Self::PermissionDenied => 403,
            Self::ResourceNotFound => 404,
            Self::RateLimitExceeded => 429,
            Self::ExecutionFailed
            | Self::ConfigError
            | Self::DatabaseError
            | Self::InternalError => 500,
        }
    }

    /// Stable string form used in logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::PolicyViolation => "policy_violation",
            Self::CryptoFailure => "crypto_failure",
            Self::ExecutionFailed => "execution_failed",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::ResourceNotFound => "resource_not_found",
            Self::AuthRequired => "auth_required",
            Self::PermissionDenied => "permission_denied",
            Self::ConfigError => "config_error",
            Self::DatabaseError => "database_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway error carrying a code, a caller-safe message and optional details
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct AppError {
    /// Error class
    pub code: ErrorCode,
    /// Caller-safe message
    pub message: String,
    /// Request the error belongs to, when known
    pub request_id: Option<String>,
    /// Structured details (parameter validation list)
    pub details: Option<serde_json::Value>,
}

/// Result alias used across the gateway
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create an error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: None,
            details: None,
        }
    }

    /// Malformed input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Policy rejection with a specific reason
    pub fn policy_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PolicyViolation, message)
    }

    /// Crypto failure; the message shown to callers is always generic
    #[must_use]
    pub fn crypto() -> Self {
        Self::new(ErrorCode::CryptoFailure, GENERIC_CRYPTO_MESSAGE)
    }

    /// Tenant database failure with the driver message
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExecutionFailed, message)
    }

    /// Rate limit exceeded
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimitExceeded, message)
    }

    /// Named resource was not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Caller identity missing
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthRequired, message)
    }

    /// Caller identity rejected
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// Configuration problem
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Config store failure
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Internal failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Attach the request id
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach structured details
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Uniform error envelope `{ok:false, error, requestId?, details?}`
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            ok: false,
            error: self.message.clone(),
            request_id: self.request_id.clone(),
            details: self.details.clone(),
        }
    }
}

/// Serialized error envelope
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Always false
    pub ok: bool,
    /// Caller-safe message
    pub error: String,
    /// Request id when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Structured details when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(feature = "http-response")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.code.http_status())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(self.to_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::PolicyViolation.http_status(), 403);
        assert_eq!(ErrorCode::RateLimitExceeded.http_status(), 429);
        assert_eq!(ErrorCode::CryptoFailure.http_status(), 400);
        assert_eq!(ErrorCode::ResourceNotFound.http_status(), 404);
    }

    #[test]
    fn test_crypto_message_is_generic() {
        let err = AppError::crypto();
        assert_eq!(err.message, GENERIC_CRYPTO_MESSAGE);
    }

    #[test]
    fn test_error_body_shape() {
        let body = AppError::policy_violation("SELECT must include LIMIT.")
            .with_request_id("req-1")
            .to_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "SELECT must include LIMIT.");
        assert_eq!(json["requestId"], "req-1");
        assert!(json.get("details").is_none());
    }
}
