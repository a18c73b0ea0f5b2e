#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rowgraph::graph::TypeGraph;
use rowgraph::query::assemble::Row;
use rowgraph::query::{
    compile, execute, Executable, OutputColumn, QueryError, QueryResult, RowSource, Selection,
    SqliteSource,
};
use rowgraph::sql::Dialect;
use serde_json::{json, Value};

/// Counts statements on the way to a real database.
struct Counting {
    inner: SqliteSource,
    statements: AtomicUsize,
}

#[async_trait]
impl RowSource for Counting {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn fetch(&self, sql: &str, columns: &[OutputColumn]) -> QueryResult<Vec<Row>> {
        self.statements.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(sql, columns).await
    }
}

async fn run(source: &SqliteSource, text: &str) -> QueryResult<Vec<Value>> {
    let schema = common::introspect(source).await;
    let graph = TypeGraph::from_schema(&schema).unwrap();
    let compiled = compile(&graph, &Selection::parse(text)?, Some(common::NAMESPACE))?;
    execute(source, &compiled).await
}

#[tokio::test]
async fn test_singular_reference_and_null_key() {
    let source = common::empty_shop().await;
    common::execute(&source, "INSERT INTO addresses (id, street) VALUES (1, 'Main St')").await;
    common::execute(&source, "INSERT INTO customers (id, name, address) VALUES (1, 'Ada', 1)").await;

    let query = "{ customers { id, address { street } } }";
    assert_eq!(
        run(&source, query).await.unwrap(),
        vec![json!({"id": 1, "address": {"street": "Main St"}})]
    );

    common::execute(&source, "UPDATE customers SET address = NULL WHERE id = 1").await;
    assert_eq!(
        run(&source, query).await.unwrap(),
        vec![json!({"id": 1, "address": null})]
    );
}

#[tokio::test]
async fn test_one_to_many_without_duplication() {
    let source = common::empty_shop().await;
    common::execute(&source, "INSERT INTO addresses (id, street) VALUES (1, 'Main St')").await;
    common::execute(&source, "INSERT INTO customers (id, name, address) VALUES (1, 'Ada', 1)").await;

    let query = "{ addresses { id, customers_on_address { id } } }";
    assert_eq!(
        run(&source, query).await.unwrap(),
        vec![json!({"id": 1, "customers_on_address": [{"id": 1}]})]
    );

    common::execute(&source, "INSERT INTO customers (id, name, address) VALUES (2, 'Bob', 1)").await;
    assert_eq!(
        run(&source, query).await.unwrap(),
        vec![json!({"id": 1, "customers_on_address": [{"id": 1}, {"id": 2}]})]
    );
}

#[tokio::test]
async fn test_empty_lists_and_scalars() {
    let source = common::shop().await;
    let rows = run(
        &source,
        "{ addresses { id street customers_on_address { name address_key } } }",
    )
    .await
    .unwrap();

    assert_eq!(
        rows,
        vec![
            json!({"id": 1, "street": "Main St", "customers_on_address": [
                {"name": "Ada", "address_key": 1},
                {"name": "Cy", "address_key": 1},
            ]}),
            json!({"id": 2, "street": "Side St", "customers_on_address": [
                {"name": "Di", "address_key": 2},
            ]}),
            json!({"id": 3, "street": "Empty Ave", "customers_on_address": []}),
        ]
    );
}

#[tokio::test]
async fn test_nested_round_trip_through_both_directions() {
    let source = common::shop().await;
    let rows = run(
        &source,
        "{ customers { name address { street customers_on_address { name } } } }",
    )
    .await
    .unwrap();

    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[0],
        json!({"name": "Ada", "address": {"street": "Main St", "customers_on_address": [
            {"name": "Ada"}, {"name": "Cy"},
        ]}})
    );
    assert_eq!(rows[1], json!({"name": "Bob", "address": null}));
    assert_eq!(
        rows[3],
        json!({"name": "Di", "address": {"street": "Side St", "customers_on_address": [
            {"name": "Di"},
        ]}})
    );
}

#[tokio::test]
async fn test_one_batched_statement_per_list() {
    let shop = common::shop().await;
    let graph = TypeGraph::from_schema(&common::introspect(&shop).await).unwrap();
    let source = Arc::new(Counting {
        inner: shop,
        statements: AtomicUsize::new(0),
    });

    let compiled = compile(
        &graph,
        &Selection::parse("{ addresses { id customers_on_address { id address { street } } } }")
            .unwrap(),
        Some(common::NAMESPACE),
    )
    .unwrap();
    let executable = Executable::new(compiled, source.clone());

    let rows = executable.run().await.unwrap();
    assert_eq!(rows.len(), 3);
    // Root plus one IN (...) statement, regardless of the parent row count.
    assert_eq!(source.statements.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_empty_parent_set_skips_sub_fetch() {
    let shop = common::empty_shop().await;
    let graph = TypeGraph::from_schema(&common::introspect(&shop).await).unwrap();
    let source = Arc::new(Counting {
        inner: shop,
        statements: AtomicUsize::new(0),
    });

    let compiled = compile(
        &graph,
        &Selection::parse("{ addresses { id customers_on_address { id } } }").unwrap(),
        Some(common::NAMESPACE),
    )
    .unwrap();

    let rows = Executable::new(compiled, source.clone()).run().await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(source.statements.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_database_error_is_request_scoped() {
    let source = common::shop().await;
    let schema = common::introspect(&source).await;
    let graph = TypeGraph::from_schema(&schema).unwrap();
    let compiled = compile(
        &graph,
        &Selection::parse("{ customers { id } }").unwrap(),
        Some(common::NAMESPACE),
    )
    .unwrap();

    common::execute(&source, "DROP TABLE customers").await;
    let err = execute(&source, &compiled).await.unwrap_err();
    assert!(matches!(err, QueryError::Database(_)));
    assert_eq!(err.kind(), "database");

    // The pool is still usable afterwards.
    assert_eq!(
        run(&source, "{ addresses { id } }").await.unwrap(),
        vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]
    );
}
