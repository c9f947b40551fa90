// ABOUTME: API definition models for templated business calls
// ABOUTME: Parameter schema, result mapping, auth mode and lifecycle status
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::policy::StatementType;

/// Declared type of a template parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Text, length and enum checked
    String,
    /// Whole number
    Integer,
    /// Finite floating point number
    Number,
    /// Boolean or truthy string
    Boolean,
    /// Timestamp or date text
    Datetime,
}

/// One declared parameter of an API definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    /// Placeholder name used as `:name` in the template
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Whether the caller must supply a value
    #[serde(default)]
    pub required: bool,
    /// Value substituted when the caller omits the parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Inclusive lower bound for numeric types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Accepted values for string parameters
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    /// Maximum string length in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

/// Output shape for read-only calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultShape {
    /// Array of rows
    #[default]
    List,
    /// First row or null
    Single,
    /// First column of the first row or null
    Scalar,
}

/// Result mapping applied to rows returned by a templated SELECT
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMapping {
    /// Output shape
    #[serde(default)]
    pub shape: ResultShape,
    /// Column to alias renames; unmapped columns keep their names
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// How callers authenticate to an API definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Caller identity is required
    #[default]
    Token,
    /// Anonymous calls allowed when the tenant policy permits public access
    Public,
}

/// Lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    /// Callable
    #[default]
    Active,
    /// Hidden from callers
    Disabled,
}

impl AuthMode {
    /// Stored text form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Public => "public",
        }
    }
}

impl ApiStatus {
    /// Stored text form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }
}

/// A persisted, versioned API definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDefinition {
    /// Owning project
    pub project: String,
    /// Owning environment
    pub environment: String,
    /// Unique key within the tenant
    pub api_key: String,
    /// SQL text with `:name` placeholders
    pub sql_template: String,
    /// Declared statement type, verified at save time
    pub statement_type: StatementType,
    /// Ordered parameter schema
    pub params_schema: Vec<ParamSpec>,
    /// Output shaping for SELECT calls
    pub result_mapping: ResultMapping,
    /// Caller authentication mode
    pub auth_mode: AuthMode,
    /// Lifecycle status
    pub status: ApiStatus,
    /// Monotonic version, incremented on every save
    pub version: i64,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Body accepted by the administrative save operation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDefinitionInput {
    /// SQL text with `:name` placeholders
    pub sql_template: String,
    /// Declared statement type
    pub statement_type: StatementType,
    /// Ordered parameter schema
    #[serde(default)]
    pub params_schema: Vec<ParamSpec>,
    /// Output shaping
    #[serde(default)]
    pub result_mapping: ResultMapping,
    /// Caller authentication mode
    #[serde(default)]
    pub auth_mode: AuthMode,
    /// Lifecycle status
    #[serde(default)]
    pub status: ApiStatus,
}
