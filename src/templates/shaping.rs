// ABOUTME: Result shaping for templated SELECT calls
// ABOUTME: Applies field aliases then list, single or scalar output shapes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use serde_json::{Map, Value};

use crate::models::{ResultMapping, ResultShape};

/// Apply a result mapping to decoded rows
#[must_use]
pub fn shape_rows(rows: Vec<Map<String, Value>>, mapping: &ResultMapping) -> Value {
    let rows: Vec<Map<String, Value>> = if mapping.fields.is_empty() {
        rows
    } else {
        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(column, value)| {
                        let name = mapping.fields.get(&column).cloned().unwrap_or(column);
                        (name, value)
                    })
                    .collect()
            })
            .collect()
    };

    match mapping.shape {
        ResultShape::List => Value::Array(rows.into_iter().map(Value::Object).collect()),
        ResultShape::Single => rows
            .into_iter()
            .next()
            .map_or(Value::Null, Value::Object),
        ResultShape::Scalar => rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next().map(|(_, value)| value))
            .unwrap_or(Value::Null),
    }
}
