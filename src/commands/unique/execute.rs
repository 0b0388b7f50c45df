use std::error::Error;

use super::UniqueCmd;
use crate::commands::{parse_id, Execute};
use crate::query::{Query, QueryRequest, QueryResponse};
use crate::types::RequestContext;

impl Execute for UniqueCmd {
    type Output = QueryResponse;

    fn execute(self, query: &Query, ctx: &RequestContext) -> Result<Self::Output, Box<dyn Error>> {
        let request = QueryRequest::Unique {
            table: self.table,
            data: self.data,
            id: self.id.as_deref().map(parse_id),
        };
        Ok(query.perform(request, ctx.request_id.as_deref())?)
    }
}
