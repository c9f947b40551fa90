// ABOUTME: SQL policy validator enforcing statement types, table and role rules, and row limits
// ABOUTME: Decides from the parsed statement structure only, never from substring matching
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Policy Validator
//!
//! Checks run in a fixed order so the first violated rule produces the
//! rejection message:
//!
//! 1. parse (single statement, supported kind)
//! 2. nested data-modifying statements
//! 3. statement type allow-list
//! 4. tenant table allow-list
//! 5. role table rule
//! 6. SELECT row limit

use std::sync::Arc;

use serde::Serialize;

use super::classifier::{ClassifiedStatement, RowLimit, SqlParserClassifier, StatementClassifier};
use crate::errors::{AppError, AppResult};
use crate::models::{Policy, StatementType};

/// Statement accepted by the validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedStatement {
    /// Statement class
    pub statement_type: StatementType,
    /// Referenced tables
    pub tables: Vec<String>,
}

/// Which rule groups to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationScope<'a> {
    /// Every rule, with the caller's role when one is supplied
    Full {
        /// Calling role
        role: Option<&'a str>,
    },
    /// Statement type and tenant table allow-list only (templated call re-check)
    TenantOnly,
}

/// Policy validator over a pluggable statement classifier
#[derive(Clone)]
pub struct PolicyValidator {
    classifier: Arc<dyn StatementClassifier>,
}

impl Default for PolicyValidator {
    fn default() -> Self {
        Self::new(Arc::new(SqlParserClassifier))
    }
}

impl PolicyValidator {
    /// Create a validator over the given classifier
    #[must_use]
    pub fn new(classifier: Arc<dyn StatementClassifier>) -> Self {
        Self { classifier }
    }

    /// Validate an ad-hoc statement for a caller
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` or `PolicyViolation` with a specific reason
    pub fn validate(
        &self,
        sql: &str,
        role: Option<&str>,
        policy: &Policy,
    ) -> AppResult<ValidatedStatement> {
        self.validate_scoped(sql, ValidationScope::Full { role }, policy)
    }

    /// Validate with an explicit rule scope
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` or `PolicyViolation` with a specific reason
    pub fn validate_scoped(
        &self,
        sql: &str,
        scope: ValidationScope<'_>,
        policy: &Policy,
    ) -> AppResult<ValidatedStatement> {
        let classified = self.classifier.classify(sql)?;

        if classified.has_nested_dml {
            return Err(AppError::policy_violation(
                "nested data-modifying statements not allowed",
            ));
        }

        check_statement_type(&classified, policy)?;
        check_tenant_tables(&classified, policy)?;

        if let ValidationScope::Full { role } = scope {
            if let Some(role) = role.map(str::trim).filter(|r| !r.is_empty()) {
                check_role_tables(&classified, role, policy)?;
            }
            if classified.statement_type == StatementType::Select {
                check_select_limit(classified.limit, policy)?;
            }
        }

        Ok(ValidatedStatement {
            statement_type: classified.statement_type,
            tables: classified.tables,
        })
    }
}

fn check_statement_type(classified: &ClassifiedStatement, policy: &Policy) -> AppResult<()> {
    if policy
        .allowed_statement_types
        .contains(&classified.statement_type)
    {
        Ok(())
    } else {
        Err(AppError::policy_violation(format!(
            "statement type '{}' not allowed",
            classified.statement_type
        )))
    }
}

fn check_tenant_tables(classified: &ClassifiedStatement, policy: &Policy) -> AppResult<()> {
    if policy.allowed_tables.is_empty() {
        return Ok(());
    }
    let denied: Vec<&str> = classified
        .tables
        .iter()
        .filter(|t| !policy.allowed_tables.contains(*t))
        .map(String::as_str)
        .collect();
    if denied.is_empty() {
        Ok(())
    } else {
        Err(AppError::policy_violation(format!(
            "table(s) not allowed: {}",
            denied.join(", ")
        )))
    }
}

fn check_role_tables(classified: &ClassifiedStatement, role: &str, policy: &Policy) -> AppResult<()> {
    if policy.role_tables.is_empty() {
        return Ok(());
    }
    let role = role.to_lowercase();
    let Some(rule) = policy.role_rule(&role) else {
        return Err(AppError::policy_violation(format!(
            "role '{role}' has no table access"
        )));
    };
    let denied: Vec<&str> = classified
        .tables
        .iter()
        .filter(|t| !rule.permits(t))
        .map(String::as_str)
        .collect();
    if denied.is_empty() {
        Ok(())
    } else {
        Err(AppError::policy_violation(format!(
            "role '{role}' may not access table(s): {}",
            denied.join(", ")
        )))
    }
}

fn check_select_limit(limit: RowLimit, policy: &Policy) -> AppResult<()> {
    if !policy.require_select_limit {
        return Ok(());
    }
    match limit {
        RowLimit::Absent => Err(AppError::policy_violation("SELECT must include LIMIT.")),
        RowLimit::NonLiteral => Err(AppError::policy_violation(
            "LIMIT must be a numeric literal",
        )),
        RowLimit::Literal(value) if value > policy.max_select_limit => {
            Err(AppError::policy_violation(format!(
                "SELECT LIMIT {value} exceeds maximum of {}.",
                policy.max_select_limit
            )))
        }
        RowLimit::Literal(_) => Ok(()),
    }
}
