#[path = "../common/mod.rs"]
mod common;

use std::collections::HashSet;

use rowgraph::graph::TypeGraph;
use rowgraph::query::{compile, CompiledQuery, Component, QueryError, Selection, Statement};
use rowgraph::schema::{FieldType, KeyDefinition, SchemaModelBuilder};
use rowgraph::sql::Dialect;
use sqlparser::dialect::{PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

fn compile_shop(text: &str) -> Result<CompiledQuery, QueryError> {
    let graph = TypeGraph::from_schema(&common::shop_schema()).unwrap();
    compile(&graph, &Selection::parse(text)?, Some(common::NAMESPACE))
}

/// Every statement in the tree, root first.
fn statements(query: &CompiledQuery) -> Vec<&Statement> {
    fn walk<'a>(stmt: &'a Statement, out: &mut Vec<&'a Statement>) {
        out.push(stmt);
        for c in stmt.referenced() {
            if let Component::Referenced { statement, .. } = c {
                walk(statement, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(&query.statement, &mut out);
    out
}

#[test]
fn test_joined_and_batched_sql() {
    let compiled = compile_shop(
        "{ customers { id name address { street customers_on_address { name } } } }",
    )
    .unwrap();

    insta::assert_snapshot!(compiled.explain(Dialect::Sqlite).join(";\n\n"), @r#"
    SELECT
      "t0"."id" AS "t0_id",
      "t0"."name" AS "t0_name",
      "t1"."id" AS "t1_id",
      "t1"."street" AS "t1_street"
    FROM "main"."customers" AS "t0"
    LEFT JOIN "main"."addresses" AS "t1" ON "t0"."address" = "t1"."id"
    ORDER BY "t0"."id" ASC;

    SELECT
      "t2"."address" AS "t2_address",
      "t2"."name" AS "t2_name"
    FROM "main"."customers" AS "t2"
    WHERE "t2"."address" IN (NULL)
    ORDER BY "t2"."id" ASC
    "#);
}

#[test]
fn test_generated_sql_parses() {
    let compiled = compile_shop(
        "{ addresses { id street customers_on_address { id name address { id street } } } }",
    )
    .unwrap();

    for sql in compiled.explain(Dialect::Sqlite) {
        Parser::parse_sql(&SQLiteDialect {}, &sql).unwrap();
    }
    for sql in compiled.explain(Dialect::Postgres) {
        Parser::parse_sql(&PostgreSqlDialect {}, &sql).unwrap();
    }
}

#[test]
fn test_aliases_unique_across_statements() {
    let compiled = compile_shop(
        "{ customers { address { customers_on_address { address { customers_on_address { id } } } } } }",
    )
    .unwrap();

    let mut seen = HashSet::new();
    for stmt in statements(&compiled) {
        assert!(seen.insert(stmt.alias.clone()), "alias {} reused", stmt.alias);
        for join in &stmt.query.joins {
            let alias = join.table.alias.clone().unwrap();
            assert!(seen.insert(alias.clone()), "alias {} reused", alias);
        }
    }
    assert_eq!(seen.len(), 5);
}

#[test]
fn test_output_columns_unique_per_statement() {
    let compiled = compile_shop("{ customers { id address_key address { id street } } }").unwrap();

    let names: Vec<_> = compiled
        .statement
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["t0_id", "t0_address", "t1_id", "t1_street"]);

    let types: Vec<_> = compiled.statement.columns.iter().map(|c| c.field_type).collect();
    assert_eq!(
        types,
        vec![FieldType::Int, FieldType::Int, FieldType::Int, FieldType::String]
    );
}

#[test]
fn test_one_to_many_never_joins() {
    let compiled = compile_shop("{ addresses { id customers_on_address { id } } }").unwrap();

    assert!(compiled.statement.query.joins.is_empty());
    let all = statements(&compiled);
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].table, "customers");
    assert_eq!(all[1].filter.as_ref().unwrap().column, "address");
}

#[test]
fn test_self_join_gets_distinct_aliases() {
    let mut builder = SchemaModelBuilder::new();
    builder
        .add_key(
            KeyDefinition::new("employees/id".parse().unwrap(), FieldType::Int)
                .with_primary_key(true),
        )
        .unwrap()
        .add_column(
            "employees/manager".parse().unwrap(),
            FieldType::Int,
            Some("employees/id".parse().unwrap()),
        )
        .unwrap();
    let graph = TypeGraph::from_schema(&builder.build().unwrap()).unwrap();

    let compiled = compile(
        &graph,
        &Selection::parse("{ employees { id manager { id manager { id } } } }").unwrap(),
        None,
    )
    .unwrap();

    let sql = compiled.statement.query.to_sql(Dialect::Sqlite);
    assert!(sql.contains(r#"LEFT JOIN "employees" AS "t1" ON "t0"."manager" = "t1"."id""#));
    assert!(sql.contains(r#"LEFT JOIN "employees" AS "t2" ON "t1"."manager" = "t2"."id""#));
    assert_eq!(compiled.touched.len(), 1);
}

#[test]
fn test_errors_before_any_sql() {
    assert!(matches!(
        compile_shop("{ orders { id } }"),
        Err(QueryError::UnknownRoot(_))
    ));
    assert!(matches!(
        compile_shop("{ customers { id address { zip } } }"),
        Err(QueryError::UnknownField { ref object, ref field }) if object == "addresses" && field == "zip"
    ));
    assert!(matches!(
        compile_shop("{ customers { name { first } } }"),
        Err(QueryError::MalformedSelection(_))
    ));
    assert!(matches!(
        compile_shop("{ customers id }"),
        Err(QueryError::MalformedSelection(_))
    ));
}

#[test]
fn test_internal_markers_skipped() {
    let compiled =
        compile_shop("{ customers { __typename id address { __typename street } } }").unwrap();
    let fields: Vec<_> = compiled
        .statement
        .components
        .iter()
        .map(|c| c.field())
        .collect();
    assert_eq!(fields, vec!["id", "address"]);
}
