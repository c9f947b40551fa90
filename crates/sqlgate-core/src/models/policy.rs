// ABOUTME: Tenant SQL policy model with boundary normalization and default merging
// ABOUTME: Statement types, table allow-lists, role table rules and SELECT limit settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Policy
//!
//! A [`Policy`] is always fully populated and normalized. Tenant rows carry a
//! sparse [`PolicyOverrides`] document which is merged over the global defaults
//! field by field: an absent field inherits the default.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Default ceiling for SELECT row limits
pub const DEFAULT_MAX_SELECT_LIMIT: u64 = 1000;

/// Statement classes the gateway knows how to authorize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementType {
    /// Read-only query
    Select,
    /// Row insertion
    Insert,
    /// Row update
    Update,
    /// Row deletion
    Delete,
}

impl StatementType {
    /// Lower-case name used in policies, audit records and responses
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "select" => Ok(Self::Select),
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(AppError::invalid_input(format!(
                "unknown statement type: {other}"
            ))),
        }
    }
}

/// Table rule attached to a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRoleRule", into = "RawRoleRule")]
pub enum RoleTableRule {
    /// Role may touch any table the tenant allows
    All,
    /// Role may only touch these tables
    Tables(BTreeSet<String>),
}

impl RoleTableRule {
    /// Whether this rule permits the given (normalized) table
    #[must_use]
    pub fn permits(&self, table: &str) -> bool {
        match self {
            Self::All => true,
            Self::Tables(tables) => tables.contains(table),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawRoleRule {
    One(String),
    Many(Vec<String>),
}

impl From<RawRoleRule> for RoleTableRule {
    fn from(raw: RawRoleRule) -> Self {
        let entries = match raw {
            RawRoleRule::One(value) => vec![value],
            RawRoleRule::Many(values) => values,
        };
        if entries.iter().any(|e| e.trim() == "*") {
            return Self::All;
        }
        Self::Tables(normalize_tables(entries))
    }
}

impl From<RoleTableRule> for RawRoleRule {
    fn from(rule: RoleTableRule) -> Self {
        match rule {
            RoleTableRule::All => Self::One("*".to_owned()),
            RoleTableRule::Tables(tables) => Self::Many(tables.into_iter().collect()),
        }
    }
}

/// Effective, normalized policy for one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Statement types the tenant may run
    pub allowed_statement_types: BTreeSet<StatementType>,
    /// Tables the tenant may touch; empty means unrestricted
    pub allowed_tables: BTreeSet<String>,
    /// Role to table rule map; empty means no role restriction
    pub role_tables: BTreeMap<String, RoleTableRule>,
    /// Whether SELECT statements must carry a row limit
    pub require_select_limit: bool,
    /// Largest accepted SELECT row limit
    pub max_select_limit: u64,
    /// Whether public API definitions may be called anonymously
    pub public_access: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            allowed_statement_types: BTreeSet::from([StatementType::Select]),
            allowed_tables: BTreeSet::new(),
            role_tables: BTreeMap::new(),
            require_select_limit: true,
            max_select_limit: DEFAULT_MAX_SELECT_LIMIT,
            public_access: false,
        }
    }
}

impl Policy {
    /// Merge tenant overrides over these defaults field by field
    #[must_use]
    pub fn merged_with(&self, overrides: &PolicyOverrides) -> Self {
        Self {
            allowed_statement_types: overrides
                .allowed_statement_types
                .clone()
                .unwrap_or_else(|| self.allowed_statement_types.clone()),
            allowed_tables: overrides
                .allowed_tables
                .clone()
                .unwrap_or_else(|| self.allowed_tables.clone()),
            role_tables: overrides
                .role_tables
                .clone()
                .unwrap_or_else(|| self.role_tables.clone()),
            require_select_limit: overrides
                .require_select_limit
                .unwrap_or(self.require_select_limit),
            max_select_limit: overrides.max_select_limit.unwrap_or(self.max_select_limit),
            public_access: overrides.public_access.unwrap_or(self.public_access),
        }
    }

    /// Look up the rule for a role; the role name is normalized first
    #[must_use]
    pub fn role_rule(&self, role: &str) -> Option<&RoleTableRule> {
        self.role_tables.get(&role.trim().to_lowercase())
    }
}

/// Sparse policy document as stored per tenant (JSON, camelCase)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPolicy")]
pub struct PolicyOverrides {
    /// Override for allowed statement types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_statement_types: Option<BTreeSet<StatementType>>,
    /// Override for allowed tables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_tables: Option<BTreeSet<String>>,
    /// Override for role table rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_tables: Option<BTreeMap<String, RoleTableRule>>,
    /// Override for the SELECT limit requirement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_select_limit: Option<bool>,
    /// Override for the SELECT limit ceiling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_select_limit: Option<u64>,
    /// Override for anonymous public API access
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_access: Option<bool>,
}

impl PolicyOverrides {
    /// Parse a stored policy document; blank input means no overrides
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the document is not valid policy JSON
    pub fn from_json_str(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
            .map_err(|e| AppError::invalid_input(format!("invalid policy document: {e}")))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPolicy {
    allowed_statement_types: Option<Vec<String>>,
    allowed_tables: Option<Vec<String>>,
    role_tables: Option<BTreeMap<String, RoleTableRule>>,
    require_select_limit: Option<bool>,
    max_select_limit: Option<u64>,
    public_access: Option<bool>,
}

impl TryFrom<RawPolicy> for PolicyOverrides {
    type Error = AppError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        let allowed_statement_types = raw
            .allowed_statement_types
            .map(|types| {
                types
                    .iter()
                    .map(|t| t.parse::<StatementType>())
                    .collect::<AppResult<BTreeSet<_>>>()
            })
            .transpose()?;

        let role_tables = raw.role_tables.map(|roles| {
            roles
                .into_iter()
                .map(|(role, rule)| (role.trim().to_lowercase(), rule))
                .collect()
        });

        Ok(Self {
            allowed_statement_types,
            allowed_tables: raw.allowed_tables.map(normalize_tables),
            role_tables,
            require_select_limit: raw.require_select_limit,
            max_select_limit: raw.max_select_limit,
            public_access: raw.public_access,
        })
    }
}

/// Normalize a table name: trim, lower-case, strip any schema qualifier
#[must_use]
pub fn normalize_table_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    lowered
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .trim_matches('"')
        .to_owned()
}

fn normalize_tables(raw: Vec<String>) -> BTreeSet<String> {
    raw.iter()
        .map(|t| normalize_table_name(t))
        .filter(|t| !t.is_empty())
        .collect()
}
