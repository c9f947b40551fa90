// ABOUTME: Security-sensitive subsystems of the gateway
// ABOUTME: Currently the append-only audit pipeline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

/// Audit trail
pub mod audit;

pub use audit::{statement_preview, AuditLogger};
