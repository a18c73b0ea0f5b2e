//! Flat rows back into the requested nested shape.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::sql::Literal;

use super::component::Component;

/// One flat result row keyed by output column name.
pub type Row = Map<String, Value>;

/// Sub-fetch results grouped by the value they matched on.
pub type Groups = HashMap<String, Vec<Value>>;

/// Grouping key for a key value; `None` for SQL NULL.
///
/// Both sides of a foreign key share one field type, so the JSON text of
/// the decoded value is a faithful key.
pub fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Distinct non-null values of `column`, in first-seen order.
pub fn distinct_keys(rows: &[Row], column: &str) -> Vec<Literal> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(column))
        .filter(|v| key_of(v).is_some_and(|k| seen.insert(k)))
        .filter_map(Literal::from_json)
        .collect()
}

/// Group assembled objects by their matched key, dropping unkeyed rows.
pub fn group(rows: Vec<(Option<String>, Value)>) -> Groups {
    let mut groups = Groups::new();
    for (key, value) in rows {
        if let Some(key) = key {
            groups.entry(key).or_default().push(value);
        }
    }
    groups
}

/// Build one response object from a flat row.
///
/// `subs[slot]` holds the grouped results of the statement's sub-fetches.
pub fn assemble(components: &[Component], row: &Row, subs: &[Groups]) -> Value {
    let mut object = Map::with_capacity(components.len());

    for component in components {
        let value = match component {
            Component::Row { column, .. } => row.get(column).cloned().unwrap_or(Value::Null),

            Component::Referencing {
                presence, children, ..
            } => match row.get(presence) {
                None | Some(Value::Null) => Value::Null,
                Some(_) => assemble(children, row, subs),
            },

            Component::Referenced {
                parent_key, slot, ..
            } => {
                let items = row
                    .get(parent_key)
                    .and_then(key_of)
                    .and_then(|key| subs.get(*slot).and_then(|g| g.get(&key)))
                    .cloned()
                    .unwrap_or_default();
                Value::Array(items)
            }
        };
        object.insert(component.field().to_string(), value);
    }

    Value::Object(object)
}
