// ABOUTME: Parameter validator for templated API calls with typed coercion
// ABOUTME: Closed-world schema check that collects every violation before failing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::constants::params::{DEFAULT_MAX_STRING_LENGTH, TRUTHY};
use crate::errors::AppError;
use crate::models::{ParamSpec, ParamType};
use crate::sql::values::parse_temporal;
use crate::sql::SqlValue;

/// Validated parameter values keyed by declared name
pub type ValidatedParams = BTreeMap<String, SqlValue>;

/// One parameter violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamError {
    /// Parameter name (from the schema or the offending key)
    pub param: String,
    /// What is wrong
    pub message: String,
}

impl ParamError {
    fn new(param: &str, message: impl Into<String>) -> Self {
        Self {
            param: param.to_owned(),
            message: message.into(),
        }
    }
}

/// Turn a violation list into the caller-facing error with structured details
#[must_use]
pub fn param_errors_to_app_error(errors: &[ParamError]) -> AppError {
    AppError::invalid_input("parameter validation failed").with_details(json!(errors))
}

/// Validate raw caller parameters against a schema
///
/// # Errors
///
/// Returns every violation found; never stops at the first one
pub fn validate_params(
    schema: &[ParamSpec],
    raw: &Map<String, Value>,
) -> Result<ValidatedParams, Vec<ParamError>> {
    let mut errors = Vec::new();
    let mut validated = ValidatedParams::new();

    for key in raw.keys() {
        if !schema.iter().any(|spec| &spec.name == key) {
            errors.push(ParamError::new(key, "unknown parameter"));
        }
    }

    for spec in schema {
        let supplied = raw.get(&spec.name).filter(|v| !is_empty(v));
        let value = match (supplied, &spec.default) {
            (Some(value), _) => value,
            (None, _) if spec.required => {
                errors.push(ParamError::new(&spec.name, "is required"));
                continue;
            }
            (None, Some(default)) if !is_empty(default) => default,
            (None, _) => continue,
        };

        match coerce(spec, value) {
            Ok(coerced) => {
                validated.insert(spec.name.clone(), coerced);
            }
            Err(message) => errors.push(ParamError::new(&spec.name, message)),
        }
    }

    if errors.is_empty() {
        Ok(validated)
    } else {
        Err(errors)
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn coerce(spec: &ParamSpec, value: &Value) -> Result<SqlValue, String> {
    match spec.param_type {
        ParamType::Integer => {
            let n = coerce_integer(value).ok_or_else(|| "must be an integer".to_owned())?;
            #[allow(clippy::cast_precision_loss)]
            check_range(spec, n as f64)?;
            Ok(SqlValue::Int(n))
        }
        ParamType::Number => {
            let n = coerce_number(value).ok_or_else(|| "must be a number".to_owned())?;
            check_range(spec, n)?;
            Ok(SqlValue::Float(n))
        }
        ParamType::Boolean => coerce_boolean(value)
            .map(SqlValue::Bool)
            .ok_or_else(|| "must be a boolean".to_owned()),
        ParamType::Datetime => match value {
            Value::String(s) if parse_temporal(s).is_some() => Ok(SqlValue::DateTime(s.clone())),
            _ => Err("must be a valid datetime".to_owned()),
        },
        ParamType::String => {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err("must be a string".to_owned()),
            };
            let max_length = spec.max_length.unwrap_or(DEFAULT_MAX_STRING_LENGTH);
            if text.chars().count() > max_length {
                return Err(format!("must be at most {max_length} characters"));
            }
            if let Some(allowed) = &spec.allowed_values {
                if !allowed.iter().any(|a| a == &text) {
                    return Err(format!("must be one of: {}", allowed.join(", ")));
                }
            }
            Ok(SqlValue::Text(text))
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral_f64_to_i64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral_f64_to_i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(integral_f64_to_i64))
        }
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn coerce_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let lowered = s.trim().to_lowercase();
            Some(TRUTHY.contains(&lowered.as_str()))
        }
        Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
        _ => None,
    }
}

fn check_range(spec: &ParamSpec, n: f64) -> Result<(), String> {
    if let Some(min) = spec.min {
        if n < min {
            return Err(format!("must be >= {min}"));
        }
    }
    if let Some(max) = spec.max {
        if n > max {
            return Err(format!("must be <= {max}"));
        }
    }
    Ok(())
}
