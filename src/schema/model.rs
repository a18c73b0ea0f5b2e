//! Schema model and its accumulating builder.

use std::collections::BTreeMap;

use serde::Serialize;

use super::error::{SchemaError, SchemaResult};
use super::fingerprint::compute_fingerprint;
use super::key::{FieldType, KeyDefinition};
use super::name::QualifiedName;
use crate::metadata::TableMetadata;

/// One table's columns, keyed by column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableModel {
    pub name: String,
    pub columns: BTreeMap<String, KeyDefinition>,
}

impl TableModel {
    /// The single primary-key column, if the table has one.
    pub fn primary_key(&self) -> Option<&KeyDefinition> {
        self.columns.values().find(|k| k.primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&KeyDefinition> {
        self.columns.get(name)
    }
}

/// Immutable map of tables to columns to key definitions.
///
/// Built once through [`SchemaModelBuilder`] and replaced wholesale when the
/// database changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaModel {
    tables: BTreeMap<String, TableModel>,
    #[serde(skip)]
    fingerprint: String,
}

impl SchemaModel {
    pub fn builder() -> SchemaModelBuilder {
        SchemaModelBuilder::new()
    }

    /// Build a model directly from introspected tables.
    pub fn from_metadata(tables: &[TableMetadata]) -> SchemaResult<Self> {
        let mut builder = SchemaModelBuilder::new();
        for table in tables {
            builder.add_table(table)?;
        }
        builder.build()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableModel> {
        self.tables.values()
    }

    pub fn table(&self, name: &str) -> Option<&TableModel> {
        self.tables.get(name)
    }

    pub fn column(&self, name: &QualifiedName) -> Option<&KeyDefinition> {
        self.tables
            .get(name.table())
            .and_then(|t| t.columns.get(name.column()))
    }

    pub fn primary_key(&self, table: &str) -> Option<&KeyDefinition> {
        self.tables.get(table).and_then(TableModel::primary_key)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// SHA-256 over the canonical JSON of the model.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Accumulates column facts and merges key definitions as they arrive.
///
/// Tables and columns may be ingested in any order; a foreign key seen
/// before its target column leaves a placeholder that the target's own
/// definition later fills in.
#[derive(Debug, Default)]
pub struct SchemaModelBuilder {
    tables: BTreeMap<String, BTreeMap<String, KeyDefinition>>,
}

impl SchemaModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one column, optionally pointing at a foreign key target.
    pub fn add_column(
        &mut self,
        name: QualifiedName,
        field_type: FieldType,
        references: Option<QualifiedName>,
    ) -> SchemaResult<&mut Self> {
        let mut key = KeyDefinition::new(name, field_type);
        key.referencing = references;
        self.add_key(key)
    }

    /// Ingest a full key definition, merging with anything already known
    /// about the same column.
    pub fn add_key(&mut self, key: KeyDefinition) -> SchemaResult<&mut Self> {
        if let Some(target) = key.referencing.clone() {
            let stub = KeyDefinition::placeholder(target, key.field_type)
                .with_referenced_by(key.name.clone());
            self.merge_in(stub)?;
        }
        self.merge_in(key)?;
        Ok(self)
    }

    /// Ingest every column and foreign key of an introspected table.
    pub fn add_table(&mut self, table: &TableMetadata) -> SchemaResult<&mut Self> {
        for column in &table.columns {
            let field_type = FieldType::from_native(&column.native_type).ok_or_else(|| {
                SchemaError::UnsupportedType {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    native_type: column.native_type.clone(),
                }
            })?;

            let name = QualifiedName::new(&table.name, &column.name)?;
            let key = KeyDefinition::new(name, field_type)
                .with_nullable(column.nullable)
                .with_primary_key(column.primary_key);

            // Every constraint on the column is merged; differing targets fail.
            let mut targets = table
                .foreign_keys
                .iter()
                .filter(|fk| fk.column == column.name)
                .peekable();
            if targets.peek().is_none() {
                self.add_key(key)?;
                continue;
            }
            for fk in targets {
                let target = QualifiedName::new(&fk.referenced_table, &fk.referenced_column)?;
                self.add_key(key.clone().with_referencing(target))?;
            }
        }
        Ok(self)
    }

    fn merge_in(&mut self, key: KeyDefinition) -> SchemaResult<()> {
        let columns = self.tables.entry(key.name.table().to_string()).or_default();
        let column = key.name.column().to_string();
        let merged = match columns.remove(&column) {
            Some(existing) => existing.merge(key)?,
            None => key,
        };
        columns.insert(column, merged);
        Ok(())
    }

    /// Validate and freeze the model.
    pub fn build(self) -> SchemaResult<SchemaModel> {
        let mut tables = BTreeMap::new();

        for (table, columns) in self.tables {
            if let Some(stub) = columns.values().find(|k| !k.declared) {
                let from = stub
                    .referenced_by
                    .iter()
                    .next()
                    .cloned()
                    .unwrap_or_else(|| stub.name.clone());
                return Err(SchemaError::UnknownForeignKeyTarget {
                    from,
                    to: stub.name.clone(),
                });
            }

            let pks: Vec<String> = columns
                .values()
                .filter(|k| k.primary_key)
                .map(|k| k.name.column().to_string())
                .collect();
            if pks.len() > 1 {
                return Err(SchemaError::MultiplePrimaryKeys {
                    table,
                    columns: pks,
                });
            }

            tables.insert(
                table.clone(),
                TableModel {
                    name: table,
                    columns,
                },
            );
        }

        let mut model = SchemaModel {
            tables,
            fingerprint: String::new(),
        };
        model.fingerprint =
            compute_fingerprint(&model).map_err(|e| SchemaError::Fingerprint(e.to_string()))?;
        Ok(model)
    }
}
