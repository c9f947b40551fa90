// ABOUTME: Bound parameter values and PostgreSQL row conversion to JSON
// ABOUTME: Typed binding for positional placeholders and column-type aware row decoding
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo};
use tracing::warn;

/// A value bound to one positional placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// Double precision
    Float(f64),
    /// Text
    Text(String),
    /// Timestamp or date text, bound with a temporal type when it parses
    DateTime(String),
    /// JSON document
    Json(Value),
}

impl SqlValue {
    /// Convert an ad-hoc JSON parameter into a bind value
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            Value::String(s) => {
                if looks_like_timestamp(&s) && parse_temporal(&s).is_some() {
                    Self::DateTime(s)
                } else {
                    Self::Text(s)
                }
            }
            other @ (Value::Object(_) | Value::Array(_)) => Self::Json(other),
        }
    }

    /// JSON form used in logs and tests
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Text(s) | Self::DateTime(s) => Value::String(s.clone()),
            Self::Json(v) => v.clone(),
        }
    }
}

/// Parsed temporal value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temporal {
    /// Instant with offset
    Instant(DateTime<Utc>),
    /// Timestamp without zone
    Local(NaiveDateTime),
    /// Calendar date
    Date(NaiveDate),
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DDTHH:MM:SS[.f]` or a date
#[must_use]
pub fn parse_temporal(raw: &str) -> Option<Temporal> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Temporal::Instant(dt.with_timezone(&Utc)));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Temporal::Local(ndt));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(Temporal::Date)
}

fn looks_like_timestamp(s: &str) -> bool {
    s.len() >= 19 && (s.contains('T') || s.contains(' '))
}

/// Bind values to a query in positional order
#[must_use]
pub fn bind_values<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    values: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in values {
        query = match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::DateTime(s) => match parse_temporal(s) {
                Some(Temporal::Instant(dt)) => query.bind(dt),
                Some(Temporal::Local(ndt)) => query.bind(ndt),
                Some(Temporal::Date(date)) => query.bind(date),
                None => query.bind(s.clone()),
            },
            SqlValue::Json(v) => query.bind(v.clone()),
        };
    }
    query
}

/// Convert a PostgreSQL row into a JSON object keyed by column name
#[must_use]
pub fn row_to_json(row: &PgRow) -> Map<String, Value> {
    let mut object = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value = column_value(row, i, column.type_info().name());
        object.insert(column.name().to_owned(), value);
    }
    object
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

fn column_value(row: &PgRow, i: usize, type_name: &str) -> Value {
    match type_name {
        "INT2" => row
            .try_get::<Option<i16>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::Number(i64::from(v).into())),
        "INT4" => row
            .try_get::<Option<i32>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::Number(i64::from(v).into())),
        "INT8" => row
            .try_get::<Option<i64>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::Number(v.into())),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| float_value(f64::from(v))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, float_value),
        "NUMERIC" => row
            .try_get::<Option<sqlx::types::Decimal>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, |d| {
                d.to_string()
                    .parse::<f64>()
                    .map_or_else(|_| Value::String(d.to_string()), float_value)
            }),
        "BOOL" => row
            .try_get::<Option<bool>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Bool),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" => row
            .try_get::<Option<String>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::String),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| {
                Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::String(v.to_rfc3339())),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::String(v.format("%Y-%m-%d").to_string())),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::String(v.format("%H:%M:%S%.f").to_string())),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(i)
            .ok()
            .flatten()
            .unwrap_or(Value::Null),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::String(v.to_string())),
        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(i)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::String(STANDARD.encode(v))),
        other => {
            if let Ok(v) = row.try_get::<Option<String>, _>(i) {
                v.map_or(Value::Null, Value::String)
            } else {
                warn!(column_type = other, "unhandled column type, returning null");
                Value::Null
            }
        }
    }
}
