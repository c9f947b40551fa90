// ABOUTME: Error types re-exported from sqlgate-core for use throughout the server crate
// ABOUTME: AppError, ErrorCode and AppResult with axum response support enabled
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

pub use sqlgate_core::errors::*;
