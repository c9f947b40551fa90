// ABOUTME: Tenant-scoped state: config resolution, API definitions and connection pools
// ABOUTME: Every cache here is an explicit instance injected through ServerResources
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

/// API definition cache
pub mod api_cache;
/// Definition-time validation and persistence of API definitions
pub mod api_service;
/// TTL cache primitive
pub mod cache;
/// Per-tenant connection pools
pub mod connections;
/// Tenant config resolver
pub mod resolver;

pub use api_cache::ApiDefinitionCache;
pub use api_service::{validate_definition, ApiDefinitionService};
pub use cache::TtlCache;
pub use connections::{ProbeReport, TenantConnectionManager};
pub use resolver::{ConfigResolver, ConnectionParams, TenantContext};
