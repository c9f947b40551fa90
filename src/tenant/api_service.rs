// ABOUTME: Definition-time validation and persistence for templated API definitions
// ABOUTME: Only templates that pass the full policy validator with their declared type are saved
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Map;
use tracing::info;

use super::api_cache::ApiDefinitionCache;
use super::resolver::ConfigResolver;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{ApiDefinition, ApiDefinitionInput, ParamSpec, Policy, TenantKey};
use crate::sql::{PolicyValidator, SqlValue, ValidatedStatement, ValidationScope};
use crate::templates::{placeholder_names, render, validate_params, ValidatedParams};

fn api_key_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").ok())
        .as_ref()
}

fn param_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
}

fn matches(pattern: Option<&'static Regex>, value: &str) -> AppResult<bool> {
    pattern
        .map(|regex| regex.is_match(value))
        .ok_or_else(|| AppError::internal("validation pattern failed to compile"))
}

/// Check an API definition before it may be persisted
///
/// The template is rendered with placeholder values and run through every
/// policy rule except role rules; the classified statement type must equal the
/// declared one.
///
/// # Errors
///
/// Returns `InvalidInput` for a bad key, schema or template, and
/// `PolicyViolation` when the rendered statement breaks the tenant policy
pub fn validate_definition(
    api_key: &str,
    input: &ApiDefinitionInput,
    policy: &Policy,
    validator: &PolicyValidator,
) -> AppResult<ValidatedStatement> {
    if !matches(api_key_pattern(), api_key)? {
        return Err(AppError::invalid_input("invalid API key"));
    }

    validate_schema(&input.params_schema)?;

    let placeholders = placeholder_names(&input.sql_template);
    let declared: BTreeSet<&str> = input.params_schema.iter().map(|p| p.name.as_str()).collect();
    if let Some(undeclared) = placeholders.iter().find(|name| !declared.contains(name.as_str())) {
        return Err(AppError::invalid_input(format!(
            "undeclared placeholder: {undeclared}"
        )));
    }

    let dummies: ValidatedParams = placeholders
        .into_iter()
        .map(|name| (name, SqlValue::Null))
        .collect();
    let rendered = render(&input.sql_template, &dummies)?;

    let validated =
        validator.validate_scoped(&rendered.sql, ValidationScope::Full { role: None }, policy)?;

    if validated.statement_type != input.statement_type {
        return Err(AppError::invalid_input(format!(
            "declared statement type '{}' does not match '{}'",
            input.statement_type, validated.statement_type
        )));
    }

    Ok(validated)
}

fn validate_schema(schema: &[ParamSpec]) -> AppResult<()> {
    let mut seen = BTreeSet::new();
    for spec in schema {
        if !matches(param_name_pattern(), &spec.name)? {
            return Err(AppError::invalid_input(format!(
                "invalid parameter name: {}",
                spec.name
            )));
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(AppError::invalid_input(format!(
                "duplicate parameter: {}",
                spec.name
            )));
        }
        if spec.default.is_some() {
            // Defaults go through the same coercion a caller value would
            let optional = ParamSpec {
                required: false,
                ..spec.clone()
            };
            if let Err(errors) = validate_params(std::slice::from_ref(&optional), &Map::new()) {
                let reason = errors
                    .first()
                    .map_or("is invalid", |error| error.message.as_str());
                return Err(AppError::invalid_input(format!(
                    "invalid default for {}: {reason}",
                    spec.name
                )));
            }
        }
    }
    Ok(())
}

/// Administrative writes over API definitions
pub struct ApiDefinitionService {
    database: Database,
    resolver: Arc<ConfigResolver>,
    cache: Arc<ApiDefinitionCache>,
    validator: PolicyValidator,
}

impl ApiDefinitionService {
    /// Create the service
    #[must_use]
    pub const fn new(
        database: Database,
        resolver: Arc<ConfigResolver>,
        cache: Arc<ApiDefinitionCache>,
        validator: PolicyValidator,
    ) -> Self {
        Self {
            database,
            resolver,
            cache,
            validator,
        }
    }

    /// Validate against the tenant's current policy and persist at the next version
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown tenant, any validation error
    /// from [`validate_definition`], or `DatabaseError`
    pub async fn save(
        &self,
        key: &TenantKey,
        api_key: &str,
        input: &ApiDefinitionInput,
    ) -> AppResult<ApiDefinition> {
        let context = self.resolver.resolve(key, true).await?;
        let validated = validate_definition(api_key, input, &context.policy, &self.validator)?;

        let definition = self.database.upsert_api_definition(key, api_key, input).await?;
        self.cache.invalidate(key, api_key);

        info!(
            tenant = %key,
            api_key,
            version = definition.version,
            tables = ?validated.tables,
            "API definition saved"
        );
        Ok(definition)
    }

    /// Remove a definition
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if it did not exist, or `DatabaseError`
    pub async fn delete(&self, key: &TenantKey, api_key: &str) -> AppResult<()> {
        let existed = self.database.delete_api_definition(key, api_key).await?;
        self.cache.invalidate(key, api_key);
        if !existed {
            return Err(AppError::not_found("API definition"));
        }
        info!(tenant = %key, api_key, "API definition deleted");
        Ok(())
    }

    /// Every definition of a tenant
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the store fails
    pub async fn list(&self, key: &TenantKey) -> AppResult<Vec<ApiDefinition>> {
        self.database.list_api_definitions(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::models::{ParamType, StatementType};
    use serde_json::json;

    fn input(template: &str, statement_type: StatementType, schema: Vec<ParamSpec>) -> ApiDefinitionInput {
        ApiDefinitionInput {
            sql_template: template.to_owned(),
            statement_type,
            params_schema: schema,
            result_mapping: crate::models::ResultMapping::default(),
            auth_mode: crate::models::AuthMode::Token,
            status: crate::models::ApiStatus::Active,
        }
    }

    fn spec(name: &str, param_type: ParamType) -> ParamSpec {
        ParamSpec {
            name: name.to_owned(),
            param_type,
            required: true,
            default: None,
            min: None,
            max: None,
            allowed_values: None,
            max_length: None,
        }
    }

    #[test]
    fn test_valid_definition_passes() {
        let validated = validate_definition(
            "recent-orders",
            &input(
                "select * from orders where user_id = :userId limit 20",
                StatementType::Select,
                vec![spec("userId", ParamType::Integer)],
            ),
            &Policy::default(),
            &PolicyValidator::default(),
        )
        .unwrap();
        assert_eq!(validated.tables, vec!["orders"]);
    }

    #[test]
    fn test_undeclared_placeholder_rejected() {
        let err = validate_definition(
            "recent",
            &input(
                "select * from orders where user_id = :userId limit 20",
                StatementType::Select,
                Vec::new(),
            ),
            &Policy::default(),
            &PolicyValidator::default(),
        )
        .unwrap_err();
        assert_eq!(err.message, "undeclared placeholder: userId");
    }

    #[test]
    fn test_declared_type_must_match() {
        let policy = Policy {
            allowed_statement_types: [StatementType::Select, StatementType::Delete]
                .into_iter()
                .collect(),
            ..Policy::default()
        };
        let err = validate_definition(
            "purge",
            &input("delete from orders", StatementType::Select, Vec::new()),
            &policy,
            &PolicyValidator::default(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(err.message.contains("does not match"));
    }

    #[test]
    fn test_template_must_satisfy_policy() {
        let err = validate_definition(
            "all-orders",
            &input("select * from orders", StatementType::Select, Vec::new()),
            &Policy::default(),
            &PolicyValidator::default(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::PolicyViolation);
        assert_eq!(err.message, "SELECT must include LIMIT.");
    }

    #[test]
    fn test_schema_checks() {
        let template = "select * from t where a = :a limit 1";
        let duplicate = input(
            template,
            StatementType::Select,
            vec![spec("a", ParamType::String), spec("a", ParamType::String)],
        );
        let err = validate_definition("k", &duplicate, &Policy::default(), &PolicyValidator::default())
            .unwrap_err();
        assert_eq!(err.message, "duplicate parameter: a");

        let mut bad_default = spec("a", ParamType::Integer);
        bad_default.default = Some(json!("seven"));
        let err = validate_definition(
            "k",
            &input(template, StatementType::Select, vec![bad_default]),
            &Policy::default(),
            &PolicyValidator::default(),
        )
        .unwrap_err();
        assert_eq!(err.message, "invalid default for a: must be an integer");

        let err = validate_definition(
            "bad key!",
            &input(template, StatementType::Select, vec![spec("a", ParamType::String)]),
            &Policy::default(),
            &PolicyValidator::default(),
        )
        .unwrap_err();
        assert_eq!(err.message, "invalid API key");
    }
}
