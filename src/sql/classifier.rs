// ABOUTME: Statement classifier turning SQL text into type, tables and row limit
// ABOUTME: PostgreSQL-dialect sqlparser implementation behind a swappable trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use sqlparser::ast::{
    Expr, LimitClause, ObjectName, ObjectNamePart, Query, SetExpr, Statement, Value, ValueWithSpan,
    Visit, Visitor,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::models::policy::normalize_table_name;
use crate::models::StatementType;

/// Row limit found on the top-level query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLimit {
    /// No LIMIT / FETCH clause, or `LIMIT ALL`
    Absent,
    /// Literal non-negative integer
    Literal(u64),
    /// Placeholder, expression or percentage
    NonLiteral,
}

/// Structural facts about one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedStatement {
    /// Statement class
    pub statement_type: StatementType,
    /// Referenced tables, normalized, sorted and de-duplicated
    pub tables: Vec<String>,
    /// Top-level row limit (SELECT only)
    pub limit: RowLimit,
    /// Whether a data-modifying statement is nested inside another statement
    pub has_nested_dml: bool,
}

/// Parses SQL into the facts the policy validator decides on
pub trait StatementClassifier: Send + Sync {
    /// Classify a single statement
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for empty or unparseable text and
    /// `PolicyViolation` for stacked statements or unsupported statement kinds
    fn classify(&self, sql: &str) -> AppResult<ClassifiedStatement>;
}

/// sqlparser-backed classifier using the PostgreSQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlParserClassifier;

impl StatementClassifier for SqlParserClassifier {
    fn classify(&self, sql: &str) -> AppResult<ClassifiedStatement> {
        if sql.trim().is_empty() {
            return Err(AppError::invalid_input("SQL statement is required"));
        }

        let mut statements = Parser::parse_sql(&PostgreSqlDialect {}, sql).map_err(|e| {
            debug!(error = %e, "SQL parse failed");
            AppError::invalid_input("unable to parse SQL statement")
        })?;

        if statements.len() > 1 {
            return Err(AppError::policy_violation("multiple statements not allowed"));
        }
        let Some(statement) = statements.pop() else {
            return Err(AppError::invalid_input("SQL statement is required"));
        };

        let (statement_type, limit) = match &statement {
            Statement::Query(query) => (StatementType::Select, top_level_limit(query)),
            Statement::Insert { .. } => (StatementType::Insert, RowLimit::Absent),
            Statement::Update { .. } => (StatementType::Update, RowLimit::Absent),
            Statement::Delete { .. } => (StatementType::Delete, RowLimit::Absent),
            _ => return Err(AppError::policy_violation("unsupported statement type")),
        };

        let mut collector = RelationCollector::default();
        let _ = statement.visit(&mut collector);

        if collector.selects_into {
            return Err(AppError::policy_violation("SELECT INTO not allowed"));
        }

        // The top-level statement itself is visited once
        let allowed_dml = usize::from(statement_type != StatementType::Select);
        let has_nested_dml = collector.dml_statements > allowed_dml;

        Ok(ClassifiedStatement {
            statement_type,
            tables: collector.tables(),
            limit,
            has_nested_dml,
        })
    }
}

/// CTE names declared by one query's WITH clause
#[derive(Default)]
struct CteScope {
    names: Vec<String>,
    recursive: bool,
    /// CTE bodies already entered
    entered: usize,
    /// CTE body currently being visited
    active: Option<usize>,
}

impl CteScope {
    fn for_query(query: &Query) -> Self {
        query.with.as_ref().map_or_else(Self::default, |with| Self {
            names: with
                .cte_tables
                .iter()
                .map(|cte| normalize_table_name(&cte.alias.name.value))
                .collect(),
            recursive: with.recursive,
            entered: 0,
            active: None,
        })
    }

    fn defines(&self, name: &str) -> bool {
        // A non-recursive CTE body only sees the CTEs declared before it
        let visible = match self.active {
            Some(index) if !self.recursive => index,
            _ => self.names.len(),
        };
        self.names.iter().take(visible).any(|cte| cte == name)
    }
}

#[derive(Default)]
struct RelationCollector {
    relations: BTreeSet<String>,
    scopes: Vec<CteScope>,
    dml_statements: usize,
    selects_into: bool,
}

impl RelationCollector {
    fn tables(self) -> Vec<String> {
        self.relations.into_iter().collect()
    }

    fn resolves_to_cte(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.defines(name))
    }
}

impl Visitor for RelationCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        // WITH is visited before the body, so the first direct child queries
        // of a scope are its CTE bodies in declaration order
        if let Some(parent) = self.scopes.last_mut() {
            if parent.active.is_none() && parent.entered < parent.names.len() {
                parent.active = Some(parent.entered);
                parent.entered += 1;
            }
        }
        if selects_into(&query.body) {
            self.selects_into = true;
        }
        self.scopes.push(CteScope::for_query(query));
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.scopes.pop();
        if let Some(parent) = self.scopes.last_mut() {
            parent.active = None;
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        if let Some(name) = last_identifier(relation) {
            let normalized = normalize_table_name(&name);
            // Qualified names always refer to real tables
            let is_cte = relation.0.len() == 1 && self.resolves_to_cte(&normalized);
            if !normalized.is_empty() && !is_cte {
                self.relations.insert(normalized);
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<Self::Break> {
        if matches!(
            statement,
            Statement::Insert { .. } | Statement::Update { .. } | Statement::Delete { .. }
        ) {
            self.dml_statements += 1;
        }
        ControlFlow::Continue(())
    }
}

fn selects_into(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_some(),
        SetExpr::SetOperation { left, right, .. } => selects_into(left) || selects_into(right),
        _ => false,
    }
}

fn last_identifier(name: &ObjectName) -> Option<String> {
    name.0.iter().rev().find_map(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.clone()),
        #[allow(unreachable_patterns)]
        _ => None,
    })
}

fn top_level_limit(query: &Query) -> RowLimit {
    if let Some(clause) = &query.limit_clause {
        let limit = match clause {
            LimitClause::LimitOffset { limit, .. } => limit.as_ref(),
            LimitClause::OffsetCommaLimit { limit, .. } => Some(limit),
        };
        if let Some(expr) = limit {
            return literal_limit(expr);
        }
    }

    if let Some(fetch) = &query.fetch {
        if fetch.percent {
            return RowLimit::NonLiteral;
        }
        // FETCH FIRST ROW ONLY
        return fetch.quantity.as_ref().map_or(RowLimit::Literal(1), literal_limit);
    }

    RowLimit::Absent
}

fn literal_limit(expr: &Expr) -> RowLimit {
    match expr {
        Expr::Nested(inner) => literal_limit(inner),
        Expr::Value(ValueWithSpan {
            value: Value::Number(number, _),
            ..
        }) => number
            .parse::<u64>()
            .map_or(RowLimit::NonLiteral, RowLimit::Literal),
        _ => RowLimit::NonLiteral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(sql: &str) -> ClassifiedStatement {
        SqlParserClassifier.classify(sql).unwrap()
    }

    #[test]
    fn test_statement_types() {
        assert_eq!(
            classify("select * from orders limit 1").statement_type,
            StatementType::Select
        );
        assert_eq!(
            classify("insert into orders (id) values (1)").statement_type,
            StatementType::Insert
        );
        assert_eq!(
            classify("update orders set paid = true where id = 1").statement_type,
            StatementType::Update
        );
        assert_eq!(
            classify("delete from orders where id = 1").statement_type,
            StatementType::Delete
        );
    }

    #[test]
    fn test_tables_are_normalized_and_deduplicated() {
        let classified = classify(
            "select * from public.Orders o join users u on u.id = o.user_id \
             where o.id in (select order_id from orders) limit 5",
        );
        assert_eq!(classified.tables, vec!["orders", "users"]);
    }

    #[test]
    fn test_cte_names_are_not_tables() {
        let classified =
            classify("with recent as (select * from orders) select * from recent limit 5");
        assert_eq!(classified.tables, vec!["orders"]);
    }

    #[test]
    fn test_cte_body_reads_real_table_of_same_name() {
        let classified =
            classify("with secrets as (select * from secrets) select * from secrets limit 5");
        assert_eq!(classified.tables, vec!["secrets"]);
    }

    #[test]
    fn test_cte_name_does_not_leak_into_sibling_scope() {
        let classified = classify(
            "select * from orders where exists \
             (with secrets as (select 1) select 1 from secrets) \
             and id in (select id from secrets) limit 5",
        );
        assert_eq!(classified.tables, vec!["orders", "secrets"]);
    }

    #[test]
    fn test_earlier_sibling_cte_is_visible() {
        let classified = classify(
            "with a as (select * from orders), b as (select * from a) \
             select * from b limit 5",
        );
        assert_eq!(classified.tables, vec!["orders"]);
    }

    #[test]
    fn test_recursive_cte_references_itself() {
        let classified = classify(
            "with recursive tree as (select id, parent from nodes \
             union all select n.id, n.parent from nodes n join tree t on t.id = n.parent) \
             select * from tree limit 5",
        );
        assert_eq!(classified.tables, vec!["nodes"]);
    }

    #[test]
    fn test_qualified_name_is_never_a_cte() {
        let classified =
            classify("with orders as (select 1 as id) select * from public.orders limit 5");
        assert_eq!(classified.tables, vec!["orders"]);
    }

    #[test]
    fn test_select_into_rejected() {
        let err = SqlParserClassifier
            .classify("select * into newtab from orders limit 5")
            .unwrap_err();
        assert_eq!(err.message, "SELECT INTO not allowed");
    }

    #[test]
    fn test_limit_extraction() {
        assert_eq!(
            classify("select * from orders limit 10").limit,
            RowLimit::Literal(10)
        );
        assert_eq!(classify("select * from orders").limit, RowLimit::Absent);
        assert_eq!(
            classify("select * from orders limit all").limit,
            RowLimit::Absent
        );
        assert_eq!(
            classify("select * from orders limit $1").limit,
            RowLimit::NonLiteral
        );
        assert_eq!(
            classify("select * from orders fetch first 20 rows only").limit,
            RowLimit::Literal(20)
        );
    }

    #[test]
    fn test_limit_in_string_literal_is_ignored() {
        let classified = classify("select * from orders where note = 'limit 10'");
        assert_eq!(classified.limit, RowLimit::Absent);
    }

    #[test]
    fn test_limit_in_subquery_is_not_top_level() {
        let classified =
            classify("select * from (select * from orders limit 5) as recent");
        assert_eq!(classified.limit, RowLimit::Absent);
    }

    #[test]
    fn test_stacked_statements_rejected() {
        let err = SqlParserClassifier
            .classify("select 1; delete from orders")
            .unwrap_err();
        assert_eq!(err.message, "multiple statements not allowed");
    }

    #[test]
    fn test_unsupported_statement_rejected() {
        assert!(SqlParserClassifier.classify("drop table orders").is_err());
        assert!(SqlParserClassifier.classify("   ").is_err());
        assert!(SqlParserClassifier.classify("selec * form").is_err());
    }

    #[test]
    fn test_nested_dml_detected() {
        let classified = classify(
            "with moved as (insert into archive select * from orders returning *) \
             select * from moved limit 5",
        );
        assert!(classified.has_nested_dml);
        assert!(!classify("delete from orders where id = 1").has_nested_dml);
    }
}
