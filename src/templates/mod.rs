// ABOUTME: Templated API support: parameter validation, rendering and result shaping
// ABOUTME: Turns an API definition plus caller parameters into a bound statement
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

/// Parameter schema validation and coercion
pub mod params;
/// `:name` to `$n` rendering
pub mod render;
/// Result shaping
pub mod shaping;

pub use params::{param_errors_to_app_error, validate_params, ParamError, ValidatedParams};
pub use render::{placeholder_names, render, RenderedStatement};
pub use shaping::shape_rows;
