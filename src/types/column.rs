//! Column definitions and canonical column types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Store-agnostic column type used in the public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Date,
    Json,
    Enum,
    Unknown,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "STRING",
            ColumnType::Number => "NUMBER",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATE",
            ColumnType::Json => "JSON",
            ColumnType::Enum => "ENUM",
            ColumnType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-specific column details that do not fit the canonical model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnExtra {
    /// Maximum character length, when the store declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    /// Value generated by the store (identity, auto_increment, serial).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_increment: bool,

    /// Allowed values of an ENUM column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,

    /// Native type name as reported by the store's catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_type: Option<String>,
}

/// A single column of a table or collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub field: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    #[serde(default)]
    pub nullable: bool,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub primary_key: bool,

    #[serde(default)]
    pub unique_key: bool,

    #[serde(default)]
    pub foreign_key: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default)]
    pub extra: ColumnExtra,
}

impl Column {
    /// Create a nullable, non-key column.
    pub fn new(field: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            field: field.into(),
            column_type,
            nullable: true,
            required: false,
            primary_key: false,
            unique_key: false,
            foreign_key: false,
            default: None,
            extra: ColumnExtra::default(),
        }
    }

    /// Mark as the auto-generated primary key.
    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self.extra.auto_increment = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique_key = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.nullable = false;
        self
    }

    pub fn foreign(mut self) -> Self {
        self.foreign_key = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.extra.length = Some(length);
        self
    }

    pub fn with_enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_native_type(mut self, native: impl Into<String>) -> Self {
        self.extra.native_type = Some(native.into());
        self
    }

    pub fn native_type(&self) -> Option<&str> {
        self.extra.native_type.as_deref()
    }
}
