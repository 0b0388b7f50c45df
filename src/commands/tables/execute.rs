use std::error::Error;

use super::TablesCmd;
use crate::commands::Execute;
use crate::query::{Query, QueryRequest, QueryResponse};
use crate::types::RequestContext;

impl Execute for TablesCmd {
    type Output = QueryResponse;

    fn execute(self, query: &Query, ctx: &RequestContext) -> Result<Self::Output, Box<dyn Error>> {
        Ok(query.perform(QueryRequest::ListTables, ctx.request_id.as_deref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::test_utils::{memory_query, seeded_store};
    use rstest::rstest;

    #[rstest]
    fn test_lists_user_collections() {
        let query = memory_query(seeded_store(), EngineConfig::default());
        let result = TablesCmd {}.execute(&query, &RequestContext::default()).unwrap();
        assert_eq!(result, QueryResponse::Tables(vec!["customers".to_string()]));
    }
}
