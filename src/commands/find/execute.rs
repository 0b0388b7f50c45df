use std::error::Error;

use super::FindCmd;
use crate::commands::Execute;
use crate::query::{Query, QueryRequest, QueryResponse};
use crate::types::RequestContext;

impl Execute for FindCmd {
    type Output = QueryResponse;

    fn execute(self, query: &Query, ctx: &RequestContext) -> Result<Self::Output, Box<dyn Error>> {
        let params = self.read.params(&self.filters)?;
        let request = QueryRequest::Find {
            table: self.table,
            params,
        };
        Ok(query.perform(request, ctx.request_id.as_deref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ReadArgs;
    use crate::config::EngineConfig;
    use crate::test_utils::{memory_query, seeded_store};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn query() -> Query {
        memory_query(seeded_store(), EngineConfig::default())
    }

    fn cmd(filters: &[&str], fields: Option<&str>) -> FindCmd {
        FindCmd {
            table: "customers".into(),
            filters: filters.iter().map(|f| f.to_string()).collect(),
            read: ReadArgs {
                fields: fields.map(str::to_string),
                ..Default::default()
            },
        }
    }

    #[rstest]
    fn test_find_by_equality(query: Query) {
        let result = cmd(&["name=Initech"], None)
            .execute(&query, &RequestContext::default())
            .unwrap();
        match result {
            QueryResponse::Found(Some(row)) => assert_eq!(row["owner"], json!("u2")),
            other => panic!("expected a row, got {other:?}"),
        }
    }

    #[rstest]
    fn test_find_projects_fields(query: Query) {
        let result = cmd(&["name=Acme"], Some("name"))
            .execute(&query, &RequestContext::default())
            .unwrap();
        match result {
            QueryResponse::Found(Some(row)) => {
                assert_eq!(row["name"], json!("Acme"));
                assert!(!row.contains_key("owner"));
            }
            other => panic!("expected a row, got {other:?}"),
        }
    }

    #[rstest]
    fn test_find_nothing(query: Query) {
        let result = cmd(&["name=Hooli"], None)
            .execute(&query, &RequestContext::default())
            .unwrap();
        assert_eq!(result, QueryResponse::Found(None));
    }

    #[rstest]
    fn test_unknown_column_rejected(query: Query) {
        let result = cmd(&["nickname=Ace"], None).execute(&query, &RequestContext::default());
        assert!(result.is_err());
    }
}
