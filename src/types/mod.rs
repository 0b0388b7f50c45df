//! Canonical type and predicate model shared by every backend.
//!
//! Nothing in this module knows about a particular store. Compilers translate
//! these types into dialect-native SQL, filter documents, or REST formulas.

mod column;
mod options;
mod predicate;
mod response;
mod schema;

pub use column::{Column, ColumnExtra, ColumnType};
pub use options::{
    CreateOneOptions, DeleteOneOptions, FindOptions, JoinType, RelationRequest,
    UniqueCheckOptions, UpdateOneOptions, DEFAULT_LIMIT,
};
pub use predicate::{split_reference, Operator, Predicate, SortCondition, SortDirection};
pub use response::{
    DeleteResponse, FindManyResponse, PageLinks, PaginationInfo, Record, UniqueCheckResponse,
};
pub use schema::{get_primary_key, Relation, Schema};

/// Per-request context threaded through every datasource call.
///
/// Carries the caller-supplied request id so all log lines of one logical
/// request can be correlated.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn new(request_id: Option<&str>) -> Self {
        Self {
            request_id: request_id.map(str::to_string),
        }
    }

    /// Short label used as a log prefix.
    pub fn label(&self) -> &str {
        self.request_id.as_deref().unwrap_or("-")
    }
}
