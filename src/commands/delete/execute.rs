use std::error::Error;

use super::DeleteCmd;
use crate::commands::{parse_id, Execute};
use crate::query::{Query, QueryRequest, QueryResponse};
use crate::types::RequestContext;

impl Execute for DeleteCmd {
    type Output = QueryResponse;

    fn execute(self, query: &Query, ctx: &RequestContext) -> Result<Self::Output, Box<dyn Error>> {
        let request = QueryRequest::Delete {
            table: self.table,
            id: parse_id(&self.id),
        };
        Ok(query.perform(request, ctx.request_id.as_deref())?)
    }
}
