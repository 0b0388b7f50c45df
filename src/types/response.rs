//! Canonical result shapes.

use serde::{Deserialize, Serialize};

/// A flat row keyed by column name. Relation expansions appear as nested arrays.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Navigation cursors for one page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    pub current: String,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub first: String,
    pub last: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub total: u64,
    pub page: PageLinks,
}

/// Result of `find_many`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindManyResponse {
    pub limit: u64,
    pub offset: u64,
    pub total: u64,
    pub pagination: PaginationInfo,
    pub data: Vec<Record>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueCheckResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UniqueCheckResponse {
    pub fn valid() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    pub fn duplicate(column: &str, value: &serde_json::Value) -> Self {
        let shown = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            valid: false,
            message: Some(format!("A record with {column} '{shown}' already exists")),
        }
    }
}
