// ABOUTME: Policy validator and template pipeline behaviour from the caller's point of view
// ABOUTME: Limit ceilings, stacked statements, role intersections and parameter rendering
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Map, Value};
use sqlgate::errors::ErrorCode;
use sqlgate::models::{ParamSpec, Policy, PolicyOverrides, RoleTableRule, StatementType};
use sqlgate::sql::{PolicyValidator, SqlValue};
use sqlgate::templates::{placeholder_names, render, validate_params};

fn policy(json: &str) -> Policy {
    Policy::default().merged_with(&PolicyOverrides::from_json_str(json).unwrap())
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

#[test]
fn test_select_without_limit_is_rejected() {
    let policy = policy(
        r#"{"allowedStatementTypes":["select"],"requireSelectLimit":true,"maxSelectLimit":500}"#,
    );
    let err = PolicyValidator::default()
        .validate("select * from orders", None, &policy)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PolicyViolation);
    assert_eq!(err.message, "SELECT must include LIMIT.");
}

#[test]
fn test_select_with_limit_is_accepted() {
    let policy = policy(
        r#"{"allowedStatementTypes":["select"],"requireSelectLimit":true,"maxSelectLimit":500}"#,
    );
    let validated = PolicyValidator::default()
        .validate("select * from orders limit 10", None, &policy)
        .unwrap();
    assert_eq!(validated.statement_type, StatementType::Select);
    assert_eq!(validated.tables, vec!["orders"]);
}

#[test]
fn test_limit_ceiling_boundaries() {
    let policy = policy(r#"{"maxSelectLimit":500}"#);
    let validator = PolicyValidator::default();

    assert!(validator
        .validate("select id from orders limit 500", None, &policy)
        .is_ok());
    let err = validator
        .validate("select id from orders limit 501", None, &policy)
        .unwrap_err();
    assert_eq!(err.message, "SELECT LIMIT 501 exceeds maximum of 500.");
}

#[test]
fn test_limit_keyword_in_literal_does_not_count() {
    let err = PolicyValidator::default()
        .validate(
            "select * from orders where note = 'limit 5' -- limit 5",
            None,
            &Policy::default(),
        )
        .unwrap_err();
    assert_eq!(err.message, "SELECT must include LIMIT.");
}

#[test]
fn test_stacked_statements_rejected_regardless_of_policy() {
    let permissive = policy(
        r#"{"allowedStatementTypes":["select","insert","update","delete"],"requireSelectLimit":false}"#,
    );
    for sql in [
        "select 1; select 2",
        "select * from orders limit 1; delete from orders",
    ] {
        let err = PolicyValidator::default()
            .validate(sql, None, &permissive)
            .unwrap_err();
        assert_eq!(err.message, "multiple statements not allowed");
    }
}

#[test]
fn test_role_rule_rejects_outside_table() {
    let policy = policy(r#"{"roleTables":{"analyst":["users","orders"]}}"#);
    let err = PolicyValidator::default()
        .validate("select * from products limit 5", Some("analyst"), &policy)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PolicyViolation);
    assert!(err.message.contains("products"));
    assert!(err.message.contains("analyst"));
}

#[test]
fn test_role_rule_is_stricter_than_tenant_tables() {
    let mut policy = Policy::default();
    policy.allowed_tables = BTreeSet::from(["orders".to_owned(), "products".to_owned()]);
    policy.role_tables = BTreeMap::from([(
        "analyst".to_owned(),
        RoleTableRule::Tables(BTreeSet::from(["orders".to_owned()])),
    )]);

    let validator = PolicyValidator::default();
    assert!(validator
        .validate("select * from products limit 5", None, &policy)
        .is_ok());
    assert!(validator
        .validate("select * from products limit 5", Some("analyst"), &policy)
        .is_err());
    assert!(validator
        .validate("select * from orders limit 5", Some("ANALYST"), &policy)
        .is_ok());
}

#[test]
fn test_wildcard_role_permits_any_table() {
    let policy = policy(r#"{"roleTables":{"admin":"*"}}"#);
    assert!(PolicyValidator::default()
        .validate("select * from anything limit 1", Some("admin"), &policy)
        .is_ok());
}

#[test]
fn test_schema_qualified_table_is_normalized() {
    let policy = policy(r#"{"allowedTables":["orders"]}"#);
    let validated = PolicyValidator::default()
        .validate("select * from Public.ORDERS limit 1", None, &policy)
        .unwrap();
    assert_eq!(validated.tables, vec!["orders"]);
}

#[test]
fn test_integer_param_is_coerced_and_bound() {
    let schema: Vec<ParamSpec> =
        serde_json::from_value(json!([{"name": "userId", "type": "integer", "required": true}]))
            .unwrap();
    let template = "select * from orders where user_id = :userId limit 20";

    let params = validate_params(&schema, &object(json!({"userId": "7"}))).unwrap();
    let rendered = render(template, &params).unwrap();

    assert_eq!(
        rendered.sql,
        "select * from orders where user_id = $1 limit 20"
    );
    assert_eq!(rendered.values, vec![SqlValue::Int(7)]);
    assert_eq!(rendered.values.len(), placeholder_names(template).len());
}

#[test]
fn test_param_errors_are_collected() {
    let schema: Vec<ParamSpec> = serde_json::from_value(json!([
        {"name": "userId", "type": "integer", "required": true},
        {"name": "status", "type": "string", "enum": ["open", "closed"]},
        {"name": "since", "type": "datetime"}
    ]))
    .unwrap();

    let errors = validate_params(
        &schema,
        &object(json!({"status": "lost", "since": "yesterday", "extra": true})),
    )
    .unwrap_err();
    assert_eq!(errors.len(), 4);
}

#[test]
fn test_cte_cannot_hide_table_of_same_name() {
    let policy = policy(r#"{"allowedTables":["orders"]}"#);
    let err = PolicyValidator::default()
        .validate(
            "with secrets as (select * from secrets) select * from secrets limit 5",
            None,
            &policy,
        )
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PolicyViolation);
    assert!(err.message.contains("secrets"));
}

#[test]
fn test_cte_in_one_subquery_does_not_hide_table_in_another() {
    let policy = policy(r#"{"allowedTables":["orders"]}"#);
    let err = PolicyValidator::default()
        .validate(
            "select * from orders where exists \
             (with secrets as (select 1) select 1 from secrets) \
             and id in (select id from secrets) limit 5",
            None,
            &policy,
        )
        .unwrap_err();
    assert!(err.message.contains("secrets"));
}

#[test]
fn test_cte_cannot_hide_table_from_role_rule() {
    let policy = policy(r#"{"roleTables":{"analyst":["orders"]}}"#);
    let err = PolicyValidator::default()
        .validate(
            "with users as (select * from users) select * from users limit 5",
            Some("analyst"),
            &policy,
        )
        .unwrap_err();
    assert!(err.message.contains("users"));
}

#[test]
fn test_select_into_is_rejected() {
    let policy = policy(r#"{"allowedTables":["orders"]}"#);
    let err = PolicyValidator::default()
        .validate("select * into newtab from orders limit 5", None, &policy)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PolicyViolation);
    assert_eq!(err.message, "SELECT INTO not allowed");
}
