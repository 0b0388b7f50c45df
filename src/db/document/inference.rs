//! Sample-based schema inference for schemaless collections.
//!
//! A collection has no catalog, so one sampled document decides every field's
//! type. Object id fields are relation candidates when a sibling collection
//! matches the field name; links declared in the relation registry are merged
//! in both directions.

use serde_json::Value;

use super::filter::OBJECT_ID;
use crate::db::DatabaseValue;
use crate::types::{Column, ColumnType, Record, Relation, Schema};

/// Key of the implicit primary key of every document.
pub const ID_FIELD: &str = "_id";

fn infer_type(value: &Value) -> (ColumnType, &'static str) {
    match value {
        Value::Null => (ColumnType::Unknown, "null"),
        Value::Bool(_) => (ColumnType::Boolean, "bool"),
        Value::Number(_) => (ColumnType::Number, "number"),
        Value::String(_) => (ColumnType::String, "string"),
        Value::Array(_) => (ColumnType::Json, "array"),
        Value::Object(map) if map.contains_key("$oid") => (ColumnType::String, OBJECT_ID),
        Value::Object(map) if map.contains_key("$date") => (ColumnType::Date, "date"),
        Value::Object(map) if map.contains_key("$numberLong") || map.contains_key("$numberDecimal") => {
            (ColumnType::Number, "number")
        }
        Value::Object(_) => (ColumnType::Json, "object"),
    }
}

/// Collection a reference field points at: `customer`, `customers` and
/// `customerId` all match a `customers` collection.
fn sibling<'a>(field: &str, collections: &'a [String]) -> Option<&'a str> {
    let base = field
        .strip_suffix("_id")
        .or_else(|| field.strip_suffix("Id"))
        .unwrap_or(field)
        .to_ascii_lowercase();
    if base.is_empty() {
        return None;
    }
    let plural = format!("{base}s");
    collections
        .iter()
        .find(|c| {
            let name = c.to_ascii_lowercase();
            name == base || name == plural
        })
        .map(String::as_str)
}

fn registry_relations(collection: &str, registry: &[Record]) -> Vec<Relation> {
    registry
        .iter()
        .filter_map(|entry| {
            let get = |key: &str| entry.get(key).and_then(DatabaseValue::as_string);
            let relation = Relation::new(get("table")?, get("column")?, get("org_table")?, get("org_column")?);
            if relation.org_table == collection {
                Some(relation)
            } else if relation.table == collection {
                Some(relation.reversed())
            } else {
                None
            }
        })
        .collect()
}

/// Infer a collection schema from one sampled document.
///
/// `collections` lists the sibling collections checked for references.
pub fn infer_schema(
    collection: &str,
    sample: &Record,
    collections: &[String],
    registry: &[Record],
) -> Schema {
    let mut columns = Vec::with_capacity(sample.len());
    let mut relations = Vec::new();

    for (field, value) in sample {
        let (column_type, native) = infer_type(value);
        let mut column = Column::new(field, column_type).with_native_type(native);
        if field == ID_FIELD {
            column.primary_key = true;
            column.nullable = false;
        } else if native == OBJECT_ID {
            if let Some(target) = sibling(field, collections).filter(|t| *t != collection) {
                relations.push(Relation::new(target, ID_FIELD, collection, field));
                column.foreign_key = true;
            }
        }
        columns.push(column);
    }
    columns.sort_by_key(|c| !c.primary_key);

    let mut schema = Schema::new(collection, columns);
    for relation in relations.into_iter().chain(registry_relations(collection, registry)) {
        if let Some(column) = schema.columns.iter_mut().find(|c| c.field == relation.org_column) {
            column.foreign_key |= relation.column == ID_FIELD;
        }
        schema.add_relation(relation);
    }
    schema
}
