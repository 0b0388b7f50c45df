use std::error::Error;

use super::UpdateCmd;
use crate::commands::{parse_id, Execute};
use crate::query::{Query, QueryRequest, QueryResponse};
use crate::types::RequestContext;

impl Execute for UpdateCmd {
    type Output = QueryResponse;

    fn execute(self, query: &Query, ctx: &RequestContext) -> Result<Self::Output, Box<dyn Error>> {
        let request = QueryRequest::Update {
            table: self.table,
            id: parse_id(&self.id),
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
    fn test_update_by_object_id() {
        let query = memory_query(seeded_store(), EngineConfig::default());
        let cmd = UpdateCmd {
            table: "customers".into(),
            id: format!("{:024x}", 2),
            data: parse_record(r#"{"vip": true}"#).unwrap(),
        };
        match cmd.execute(&query, &RequestContext::default()).unwrap() {
            QueryResponse::Record(row) => {
                assert_eq!(row["name"], json!("Acme"));
                assert_eq!(row["vip"], json!(true));
            }
            other => panic!("expected a record, got {other:?}"),
        }
    }
}
