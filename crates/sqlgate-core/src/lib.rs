// ABOUTME: Core types crate shared by the gateway server and its tooling
// ABOUTME: Canonical DTOs for tenants, policies, API definitions, audit records and errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # sqlgate-core
//!
//! Data types with no runtime dependencies beyond serde. The server crate
//! re-exports everything here so callers normally import from `sqlgate`.

/// Shared error type and HTTP error envelope
pub mod errors;

/// Canonical data models
pub mod models;

pub use errors::{AppError, AppResult, ErrorCode};
