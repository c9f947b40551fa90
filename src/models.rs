// ABOUTME: Data models re-exported from sqlgate-core (canonical definitions)
// ABOUTME: Tenant keys, policies, API definitions, envelopes and audit records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

pub use sqlgate_core::models::*;
