//! Relation resolution.
//!
//! Requested relations are checked against `schema.relations` and get their
//! schema attached before any query runs. Results come back either as JOINed
//! rows with `Table.column` keys, which are unflattened here, or are expanded
//! with one lookup per parent row.

use log::{debug, warn};
use serde_json::Value;

use crate::db::SchemaCatalog;
use crate::error::{EngineError, Result};
use crate::types::{
    split_reference, FindOptions, Predicate, Record, RelationRequest, RequestContext, Schema,
};
use crate::validation::RequestedRelation;

/// Look up each requested relation and attach the related schema.
///
/// `fields` holds `(relation, column)` pairs from a `fields` parameter; they
/// narrow the projection of the matching relation.
pub fn resolve_relations<C>(
    catalog: &C,
    ctx: &RequestContext,
    schema: &Schema,
    requested: &[RequestedRelation],
    fields: &[(String, String)],
) -> Result<Vec<RelationRequest>>
where
    C: SchemaCatalog + ?Sized,
{
    let mut resolved: Vec<RelationRequest> = Vec::with_capacity(requested.len());
    for request in requested {
        if resolved.iter().any(|r| r.table() == request.table) {
            continue;
        }
        let mut relation = schema
            .relation(&request.table)
            .cloned()
            .ok_or_else(|| EngineError::RelationNotFound {
                table: schema.table.clone(),
                relation: request.table.clone(),
            })?;
        let related = catalog.get_schema(ctx, &relation.table)?;
        relation.schema = Some(Box::new(related));

        let relation_fields = fields
            .iter()
            .filter(|(table, _)| table == &relation.table)
            .map(|(_, column)| column.clone())
            .collect();
        debug!(
            "[{}] attached relation {}.{} -> {}.{}",
            ctx.label(),
            relation.org_table,
            relation.org_column,
            relation.table,
            relation.column
        );
        resolved.push(
            RelationRequest::new(relation)
                .with_join(request.join)
                .with_fields(relation_fields),
        );
    }
    Ok(resolved)
}

/// Relations referenced by dotted filter, sort or field names.
pub fn referenced_relations(options: &FindOptions) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    let references = options
        .filters
        .iter()
        .map(|p| p.column.as_str())
        .chain(options.sort.iter().map(|s| s.column.as_str()))
        .chain(options.fields.iter().map(String::as_str));
    for reference in references {
        if let Some((table, _)) = split_reference(reference) {
            if !tables.iter().any(|t| t == table) {
                tables.push(table.to_string());
            }
        }
    }
    tables
}

/// Fold `Table.column` keys of JOINed rows into a nested array under `Table`.
///
/// Only to-one relations are JOINed, so each array holds at most one row. A
/// relation whose columns are all null (no match on an outer join) becomes an
/// empty array.
pub fn unflatten_rows(options: &FindOptions, rows: Vec<Record>) -> Vec<Record> {
    rows.into_iter()
        .map(|row| unflatten_row(options, row))
        .collect()
}

fn unflatten_row(options: &FindOptions, row: Record) -> Record {
    let mut base = Record::new();
    let mut nested: Vec<(String, Record)> = options
        .relations
        .iter()
        .filter(|r| r.is_to_one())
        .map(|r| (r.table().to_string(), Record::new()))
        .collect();

    for (key, value) in row {
        let slot = match split_reference(&key) {
            Some((table, column)) => nested
                .iter()
                .position(|(t, _)| t == table)
                .map(|index| (index, column.to_string())),
            None => None,
        };
        match slot {
            Some((index, column)) => {
                nested[index].1.insert(column, value);
            }
            None => {
                base.insert(key, value);
            }
        }
    }

    for (table, record) in nested {
        let items = if record.values().all(Value::is_null) {
            Vec::new()
        } else {
            vec![Value::Object(record)]
        };
        base.insert(table, Value::Array(items));
    }
    base
}

/// Options for fetching the related rows of one parent row.
pub fn lookup_options(request: &RelationRequest, key: &Value, limit: u64) -> Option<FindOptions> {
    let schema = request.schema()?.clone();
    Some(
        FindOptions::new(schema)
            .with_fields(request.fields.clone())
            .with_filter(Predicate::equals(&request.relation.column, key.clone()))
            .with_page(limit, 0),
    )
}

/// Attach relations by issuing one lookup per parent row and relation.
///
/// With `joined`, to-one relations are taken to be already nested by
/// [`unflatten_rows`] and only to-many relations are looked up. A parent
/// without a join value, or a lookup that fails, yields an empty array.
pub fn expand_by_lookup<F>(
    ctx: &RequestContext,
    options: &FindOptions,
    rows: Vec<Record>,
    limit: u64,
    joined: bool,
    mut lookup: F,
) -> Vec<Record>
where
    F: FnMut(&FindOptions) -> Result<Vec<Record>>,
{
    let pending: Vec<&RelationRequest> = options
        .relations
        .iter()
        .filter(|r| !(joined && r.is_to_one()))
        .collect();
    if pending.is_empty() {
        return rows;
    }
    rows.into_iter()
        .map(|mut row| {
            for request in &pending {
                let related = match row.get(&request.relation.org_column) {
                    None | Some(Value::Null) => Vec::new(),
                    Some(key) => match lookup_options(request, key, limit) {
                        Some(find) => lookup(&find).unwrap_or_else(|e| {
                            warn!(
                                "[{}] relation lookup {} failed: {}",
                                ctx.label(),
                                request.table(),
                                e
                            );
                            Vec::new()
                        }),
                        None => Vec::new(),
                    },
                };
                row.insert(
                    request.table().to_string(),
                    Value::Array(related.into_iter().map(Value::Object).collect()),
                );
            }
            row
        })
        .collect()
}
