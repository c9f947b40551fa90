// ABOUTME: SQL policy layer: statement classification, policy validation and bind values
// ABOUTME: Everything that inspects or parameterizes tenant SQL lives under this module
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

/// Statement classifier trait and the sqlparser implementation
pub mod classifier;
/// Policy validator
pub mod validator;
/// Bind values and row conversion
pub mod values;

pub use classifier::{ClassifiedStatement, RowLimit, SqlParserClassifier, StatementClassifier};
pub use validator::{PolicyValidator, ValidatedStatement, ValidationScope};
pub use values::{bind_values, row_to_json, SqlValue};
