use std::error::Error;

use super::CreateCmd;
use crate::commands::Execute;
use crate::query::{Query, QueryRequest, QueryResponse};
use crate::types::RequestContext;

impl Execute for CreateCmd {
    type Output = QueryResponse;

    fn execute(self, query: &Query, ctx: &RequestContext) -> Result<Self::Output, Box<dyn Error>> {
        let request = QueryRequest::Create {
            table: self.table,
            data: self.data,
        };
        Ok(query.perform(request, ctx.request_id.as_deref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse_record;
    use crate::config::EngineConfig;
    use crate::test_utils::{memory_query, seeded_store};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn test_create_returns_stored_record() {
        let query = memory_query(seeded_store(), EngineConfig::default());
        let cmd = CreateCmd {
            table: "customers".into(),
            data: parse_record(r#"{"name": "Hooli", "vip": true, "owner": "u3"}"#).unwrap(),
        };
        match cmd.execute(&query, &RequestContext::default()).unwrap() {
            QueryResponse::Record(row) => {
                assert_eq!(row["name"], json!("Hooli"));
                assert!(row["_id"].is_string());
            }
            other => panic!("expected a record, got {other:?}"),
        }
    }
}
