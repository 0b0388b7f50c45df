use std::error::Error;
use std::fs;

use super::CreateTableCmd;
use crate::commands::Execute;
use crate::query::{Query, QueryRequest, QueryResponse};
use crate::types::{RequestContext, Schema};

impl Execute for CreateTableCmd {
    type Output = QueryResponse;

    fn execute(self, query: &Query, ctx: &RequestContext) -> Result<Self::Output, Box<dyn Error>> {
        let content = fs::read_to_string(&self.file)
            .map_err(|e| format!("Failed to read {}: {}", self.file.display(), e))?;
        let schema: Schema = serde_json::from_str(&content)
            .map_err(|e| format!("Invalid schema in {}: {}", self.file.display(), e))?;
        Ok(query.perform(QueryRequest::CreateTable { schema }, ctx.request_id.as_deref())?)
    }
}
