// ABOUTME: Canonical data models shared across the gateway
// ABOUTME: Re-exports tenant, policy, API definition, audit and envelope DTOs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

/// API definition (templated business call) types
pub mod api_definition;
/// Audit record and audit query types
pub mod audit;
/// Encrypted request envelope wire shape
pub mod envelope;
/// Tenant policy types
pub mod policy;
/// Tenant identity
pub mod tenant;

pub use api_definition::{
    ApiDefinition, ApiDefinitionInput, ApiStatus, AuthMode, ParamSpec, ParamType, ResultMapping,
    ResultShape,
};
pub use audit::{AuditQuery, AuditRecord, AuditStatus};
pub use envelope::EncryptedEnvelope;
pub use policy::{Policy, PolicyOverrides, RoleTableRule, StatementType};
pub use tenant::TenantKey;
