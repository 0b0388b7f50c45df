//! Airtable meta API payloads and their mapping to [`Schema`].

use serde::Deserialize;
use serde_json::{json, Value};

use super::formula::RECORD_ID;
use crate::types::{Column, ColumnType, Relation, Schema};

/// Native type recorded for the record id pseudo-column.
pub const RECORD_ID_TYPE: &str = "recordId";

#[derive(Debug, Clone, Deserialize)]
pub struct TablesResponse {
    pub tables: Vec<TableMeta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub primary_field_id: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldMeta {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub options: Option<Value>,
}

impl FieldMeta {
    fn option(&self, key: &str) -> Option<&Value> {
        self.options.as_ref().and_then(|o| o.get(key))
    }

    fn choices(&self) -> Vec<String> {
        self.option("choices")
            .and_then(Value::as_array)
            .map(|choices| {
                choices
                    .iter()
                    .filter_map(|c| c.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Find a table by name, falling back to its id.
pub fn find_table<'a>(tables: &'a [TableMeta], name: &str) -> Option<&'a TableMeta> {
    tables
        .iter()
        .find(|t| t.name == name)
        .or_else(|| tables.iter().find(|t| t.id == name))
}

fn column_type(field_type: &str) -> ColumnType {
    match field_type {
        "singleLineText" | "multilineText" | "richText" | "email" | "url" | "phoneNumber"
        | "barcode" => ColumnType::String,
        "number" | "currency" | "percent" | "rating" | "duration" | "autoNumber" | "count" => {
            ColumnType::Number
        }
        "checkbox" => ColumnType::Boolean,
        "date" | "dateTime" | "createdTime" | "lastModifiedTime" => ColumnType::Date,
        "singleSelect" => ColumnType::Enum,
        "multipleRecordLinks" | "multipleSelects" | "multipleAttachments" | "multipleLookupValues"
        | "rollup" | "formula" | "singleCollaborator" | "multipleCollaborators" | "createdBy"
        | "lastModifiedBy" => ColumnType::Json,
        _ => ColumnType::Unknown,
    }
}

/// Map one table to a schema. `RECORD_ID` is the primary key; link fields
/// become relations to the linked table's record id.
pub fn schema_from_table(table: &TableMeta, tables: &[TableMeta]) -> Schema {
    let mut columns = vec![Column::new(RECORD_ID, ColumnType::String)
        .primary()
        .with_native_type(RECORD_ID_TYPE)];
    let mut relations = Vec::new();

    for field in &table.fields {
        let mut column =
            Column::new(&field.name, column_type(&field.field_type)).with_native_type(&field.field_type);
        match field.field_type.as_str() {
            "singleSelect" => column.extra.enum_values = field.choices(),
            "multipleRecordLinks" => {
                let linked = field
                    .option("linkedTableId")
                    .and_then(Value::as_str)
                    .and_then(|id| tables.iter().find(|t| t.id == id));
                if let Some(linked) = linked {
                    relations.push(Relation::new(&linked.name, RECORD_ID, &table.name, &field.name));
                    column.foreign_key = true;
                }
            }
            "autoNumber" => column.extra.auto_increment = true,
            _ => {}
        }
        columns.push(column);
    }

    let mut schema = Schema::new(&table.name, columns);
    for relation in relations {
        schema.add_relation(relation);
    }
    schema
}

/// Field definition for creating `column` through the meta API.
///
/// `linked_table_id` turns a foreign column into a record link.
pub fn field_definition(column: &Column, linked_table_id: Option<&str>) -> Value {
    if let Some(id) = linked_table_id {
        return json!({
            "name": column.field,
            "type": "multipleRecordLinks",
            "options": { "linkedTableId": id }
        });
    }
    match column.column_type {
        ColumnType::String if column.extra.length.is_some_and(|l| l > 255) => {
            json!({ "name": column.field, "type": "multilineText" })
        }
        ColumnType::String => json!({ "name": column.field, "type": "singleLineText" }),
        ColumnType::Number => json!({
            "name": column.field,
            "type": "number",
            "options": { "precision": 8 }
        }),
        ColumnType::Boolean => json!({
            "name": column.field,
            "type": "checkbox",
            "options": { "icon": "check", "color": "greenBright" }
        }),
        ColumnType::Date => json!({
            "name": column.field,
            "type": "dateTime",
            "options": {
                "dateFormat": { "name": "iso" },
                "timeFormat": { "name": "24hour" },
                "timeZone": "utc"
            }
        }),
        ColumnType::Enum => {
            let choices: Vec<Value> = column
                .extra
                .enum_values
                .iter()
                .map(|v| json!({ "name": v }))
                .collect();
            json!({
                "name": column.field,
                "type": "singleSelect",
                "options": { "choices": choices }
            })
        }
        ColumnType::Json | ColumnType::Unknown => {
            json!({ "name": column.field, "type": "multilineText" })
        }
    }
}
