#[path = "../common/mod.rs"]
mod common;

use rowgraph::metadata::{
    ColumnMetadata, ForeignKeyInfo, IntrospectionProvider, SqliteProvider, TableMetadata,
};
use rowgraph::schema::{FieldType, KeyDefinition, QualifiedName, SchemaError, SchemaModel};

fn qn(s: &str) -> QualifiedName {
    s.parse().unwrap()
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn test_qualified_name_canonical_form() {
    let name = QualifiedName::new("customers", "address").unwrap();
    assert_eq!(name.to_string(), "customers/address");
    assert_eq!(qn("customers/address"), name);
}

#[test]
fn test_qualified_name_rejects_malformed() {
    for bad in ["customers", "customers/", "/address", "a/b/c", ""] {
        assert!(
            matches!(bad.parse::<QualifiedName>(), Err(SchemaError::InvalidName(_))),
            "{:?} should be rejected",
            bad
        );
    }
    assert!(QualifiedName::new("", "id").is_err());
    assert!(QualifiedName::new("customers", "").is_err());
}

// =============================================================================
// Merging
// =============================================================================

#[test]
fn test_merge_conflicting_references_fails() {
    let a = KeyDefinition::new(qn("customers/address"), FieldType::Int)
        .with_referencing(qn("addresses/id"));
    let b = KeyDefinition::new(qn("customers/address"), FieldType::Int)
        .with_referencing(qn("warehouses/id"));

    assert!(matches!(
        a.merge(b),
        Err(SchemaError::InvalidForeignKeyMerge { .. })
    ));
}

#[test]
fn test_merge_differing_field_types_fails() {
    let a = KeyDefinition::new(qn("customers/address"), FieldType::Int);
    let b = KeyDefinition::new(qn("customers/address"), FieldType::String);

    assert!(matches!(
        a.merge(b),
        Err(SchemaError::FieldTypeMismatch { .. })
    ));
}

#[test]
fn test_merge_unions_references() {
    let a = KeyDefinition::new(qn("addresses/id"), FieldType::Int)
        .with_referenced_by(qn("customers/address"));
    let b = KeyDefinition::new(qn("addresses/id"), FieldType::Int)
        .with_referenced_by(qn("suppliers/address"));
    let c = KeyDefinition::new(qn("customers/address"), FieldType::Int);
    let d = KeyDefinition::new(qn("customers/address"), FieldType::Int)
        .with_referencing(qn("addresses/id"));

    let merged = a.merge(b).unwrap();
    assert_eq!(merged.referenced_by.len(), 2);
    assert_eq!(merged.referencing, None);

    let merged = c.merge(d).unwrap();
    assert_eq!(merged.referencing, Some(qn("addresses/id")));
}

// =============================================================================
// Building
// =============================================================================

#[tokio::test]
async fn test_introspected_shop_model() {
    let source = common::shop().await;
    let model = common::introspect(&source).await;

    assert_eq!(model.table_names().collect::<Vec<_>>(), vec!["addresses", "customers"]);

    let address = model.column(&qn("customers/address")).unwrap();
    assert_eq!(address.field_type, FieldType::Int);
    assert_eq!(address.referencing, Some(qn("addresses/id")));
    assert!(address.nullable);

    let id = model.primary_key("addresses").unwrap();
    assert_eq!(id.name, qn("addresses/id"));
    assert!(id.referenced_by.contains(&qn("customers/address")));

    let street = model.column(&qn("addresses/street")).unwrap();
    assert_eq!(street.field_type, FieldType::String);
    assert!(!street.nullable);

    // Introspection and hand-written metadata describe the same schema.
    assert_eq!(model.fingerprint(), common::shop_schema().fingerprint());
}

#[test]
fn test_fingerprint_ignores_enumeration_order() {
    let mut reversed = common::shop_metadata();
    reversed.reverse();
    for table in &mut reversed {
        table.columns.reverse();
    }

    let a = common::shop_schema();
    let b = SchemaModel::from_metadata(&reversed).unwrap();
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.fingerprint().len(), 64);
}

#[test]
fn test_fingerprint_changes_with_schema() {
    let mut tables = common::shop_metadata();
    tables[0].columns.push(ColumnMetadata::new("zip", "VARCHAR(10)"));

    let changed = SchemaModel::from_metadata(&tables).unwrap();
    assert_ne!(changed.fingerprint(), common::shop_schema().fingerprint());
}

#[test]
fn test_unsupported_type() {
    let tables = vec![TableMetadata::new("main", "files")
        .with_column(ColumnMetadata::new("id", "INTEGER").primary_key())
        .with_column(ColumnMetadata::new("data", "BLOB"))];

    match SchemaModel::from_metadata(&tables) {
        Err(SchemaError::UnsupportedType {
            table,
            column,
            native_type,
        }) => {
            assert_eq!(table, "files");
            assert_eq!(column, "data");
            assert_eq!(native_type, "BLOB");
        }
        other => panic!("expected UnsupportedType, got {:?}", other),
    }
}

#[test]
fn test_multiple_primary_keys() {
    let tables = vec![TableMetadata::new("main", "pairs")
        .with_column(ColumnMetadata::new("a", "INTEGER").primary_key())
        .with_column(ColumnMetadata::new("b", "INTEGER").primary_key())];

    assert!(matches!(
        SchemaModel::from_metadata(&tables),
        Err(SchemaError::MultiplePrimaryKeys { ref table, .. }) if table == "pairs"
    ));
}

#[test]
fn test_foreign_key_to_missing_column() {
    let tables = vec![TableMetadata::new("main", "customers")
        .with_column(ColumnMetadata::new("id", "INTEGER").primary_key())
        .with_column(ColumnMetadata::new("address", "INTEGER"))
        .with_foreign_key(ForeignKeyInfo::new("address", "addresses", "id"))];

    match SchemaModel::from_metadata(&tables) {
        Err(SchemaError::UnknownForeignKeyTarget { from, to }) => {
            assert_eq!(from, qn("customers/address"));
            assert_eq!(to, qn("addresses/id"));
        }
        other => panic!("expected UnknownForeignKeyTarget, got {:?}", other),
    }
}

#[test]
fn test_column_with_two_foreign_key_targets_fails() {
    let tables = vec![
        TableMetadata::new("main", "a")
            .with_column(ColumnMetadata::new("id", "INTEGER").primary_key()),
        TableMetadata::new("main", "b")
            .with_column(ColumnMetadata::new("id", "INTEGER").primary_key()),
        TableMetadata::new("main", "c")
            .with_column(ColumnMetadata::new("id", "INTEGER").primary_key())
            .with_column(ColumnMetadata::new("x", "INTEGER"))
            .with_foreign_key(ForeignKeyInfo::new("x", "a", "id"))
            .with_foreign_key(ForeignKeyInfo::new("x", "b", "id")),
    ];

    match SchemaModel::from_metadata(&tables) {
        Err(SchemaError::InvalidForeignKeyMerge {
            name,
            existing,
            incoming,
        }) => {
            assert_eq!(name, qn("c/x"));
            assert_eq!(existing, qn("a/id"));
            assert_eq!(incoming, qn("b/id"));
        }
        other => panic!("expected InvalidForeignKeyMerge, got {:?}", other),
    }
}

#[test]
fn test_repeated_foreign_key_is_accepted() {
    let mut tables = common::shop_metadata();
    let customers = tables.iter_mut().find(|t| t.name == "customers").unwrap();
    customers
        .foreign_keys
        .push(ForeignKeyInfo::new("address", "addresses", "id"));

    let model = SchemaModel::from_metadata(&tables).unwrap();
    assert_eq!(model.fingerprint(), common::shop_schema().fingerprint());
}

#[tokio::test]
async fn test_introspected_conflicting_foreign_keys_fail() {
    let source = common::shop().await;
    common::execute(&source, "CREATE TABLE warehouses (id INTEGER PRIMARY KEY)").await;
    common::execute(
        &source,
        "CREATE TABLE shipments (\
             id INTEGER PRIMARY KEY, \
             dest INTEGER, \
             FOREIGN KEY (dest) REFERENCES addresses(id), \
             FOREIGN KEY (dest) REFERENCES warehouses(id))",
    )
    .await;

    let provider = SqliteProvider::new(source.pool().clone());
    let tables = provider.introspect(common::NAMESPACE).await.unwrap();
    let shipments = tables.iter().find(|t| t.name == "shipments").unwrap();
    assert_eq!(shipments.foreign_keys.len(), 2);

    assert!(matches!(
        SchemaModel::from_metadata(&tables),
        Err(SchemaError::InvalidForeignKeyMerge { ref name, .. }) if *name == qn("shipments/dest")
    ));
}
