#[path = "../common/mod.rs"]
mod common;

use rowgraph::graph::{FieldKind, GraphBuildError, TypeGraph};
use rowgraph::metadata::{ColumnMetadata, ForeignKeyInfo, TableMetadata};
use rowgraph::schema::{FieldType, SchemaModel};

fn shop_graph() -> TypeGraph {
    TypeGraph::from_schema(&common::shop_schema()).unwrap()
}

#[test]
fn test_one_object_type_per_table() {
    let graph = shop_graph();
    assert_eq!(graph.len(), 2);
    assert_eq!(
        graph.type_names().collect::<Vec<_>>(),
        vec!["addresses", "customers"]
    );
}

#[test]
fn test_foreign_key_exposes_key_and_traversal() {
    let graph = shop_graph();
    let customers = graph.object("customers").unwrap();
    let addresses_id = graph.type_id("addresses").unwrap();

    let raw = customers.field("address_key").unwrap();
    assert_eq!(
        raw.kind,
        FieldKind::Scalar {
            column: "address".into(),
            field_type: FieldType::Int,
        }
    );
    assert!(raw.nullable);

    let traversal = customers.field("address").unwrap();
    assert_eq!(
        traversal.kind,
        FieldKind::SingularRef {
            target: addresses_id,
            local_key: "address".into(),
            remote_key: "id".into(),
        }
    );
    assert!(traversal.nullable);
}

#[test]
fn test_incoming_keys_become_lists() {
    let graph = shop_graph();
    let addresses = graph.object("addresses").unwrap();

    let list = addresses.field("customers_on_address").unwrap();
    assert_eq!(
        list.kind,
        FieldKind::ListRef {
            target: graph.type_id("customers").unwrap(),
            local_key: "id".into(),
            remote_key: "address".into(),
        }
    );
    assert!(!list.nullable);

    // Plain columns stay plain scalars.
    assert!(matches!(
        addresses.field("street").unwrap().kind,
        FieldKind::Scalar { .. }
    ));
    assert_eq!(addresses.primary_key.as_deref(), Some("id"));
}

#[test]
fn test_two_keys_to_the_same_table() {
    let tables = vec![
        TableMetadata::new("main", "addresses")
            .with_column(ColumnMetadata::new("id", "INTEGER").primary_key()),
        TableMetadata::new("main", "orders")
            .with_column(ColumnMetadata::new("id", "INTEGER").primary_key())
            .with_column(ColumnMetadata::new("billing", "INTEGER"))
            .with_column(ColumnMetadata::new("shipping", "INTEGER"))
            .with_foreign_key(ForeignKeyInfo::new("billing", "addresses", "id"))
            .with_foreign_key(ForeignKeyInfo::new("shipping", "addresses", "id")),
    ];
    let graph = TypeGraph::from_schema(&SchemaModel::from_metadata(&tables).unwrap()).unwrap();

    let addresses = graph.object("addresses").unwrap();
    assert!(addresses.field("orders_on_billing").is_some());
    assert!(addresses.field("orders_on_shipping").is_some());

    let orders = graph.object("orders").unwrap();
    for field in ["billing", "billing_key", "shipping", "shipping_key"] {
        assert!(orders.field(field).is_some(), "missing {}", field);
    }
}

#[test]
fn test_derived_name_collision() {
    let tables = vec![
        TableMetadata::new("main", "addresses")
            .with_column(ColumnMetadata::new("id", "INTEGER").primary_key())
            .with_column(ColumnMetadata::new("customers_on_address", "TEXT")),
        TableMetadata::new("main", "customers")
            .with_column(ColumnMetadata::new("id", "INTEGER").primary_key())
            .with_column(ColumnMetadata::new("address", "INTEGER"))
            .with_foreign_key(ForeignKeyInfo::new("address", "addresses", "id")),
    ];
    let schema = SchemaModel::from_metadata(&tables).unwrap();

    assert!(matches!(
        TypeGraph::from_schema(&schema),
        Err(GraphBuildError::DuplicateField { ref object, ref field })
            if object == "addresses" && field == "customers_on_address"
    ));
}

#[tokio::test]
async fn test_graph_from_introspection_matches_static() {
    let source = common::shop().await;
    let introspected = TypeGraph::from_schema(&common::introspect(&source).await).unwrap();
    assert_eq!(introspected.to_sdl(), shop_graph().to_sdl());
}

#[test]
fn test_sdl() {
    insta::assert_snapshot!(shop_graph().to_sdl(), @r"
    type addresses {
      customers_on_address: [customers!]!
      id: Int!
      street: String!
    }

    type customers {
      address: addresses
      address_key: Int
      id: Int!
      name: String!
    }
    ");
}
