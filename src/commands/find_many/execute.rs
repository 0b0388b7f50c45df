use std::error::Error;

use super::FindManyCmd;
use crate::commands::Execute;
use crate::query::{Query, QueryRequest, QueryResponse};
use crate::types::RequestContext;

impl Execute for FindManyCmd {
    type Output = QueryResponse;

    fn execute(self, query: &Query, ctx: &RequestContext) -> Result<Self::Output, Box<dyn Error>> {
        let mut params = self.read.params(&self.filters)?;
        if let Some(limit) = self.limit {
            params.insert("limit", limit.to_string());
        }
        if let Some(offset) = self.offset {
            params.insert("offset", offset.to_string());
        }
        if let Some(page) = self.page {
            params.insert("page", page);
        }
        let request = QueryRequest::FindMany {
            table: self.table,
            params,
        };
        Ok(query.perform(request, ctx.request_id.as_deref())?)
    }
}
