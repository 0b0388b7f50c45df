use std::error::Error;

use super::CheckCmd;
use crate::commands::Execute;
use crate::query::{Query, QueryRequest, QueryResponse};
use crate::types::RequestContext;

impl Execute for CheckCmd {
    type Output = QueryResponse;

    fn execute(self, query: &Query, ctx: &RequestContext) -> Result<Self::Output, Box<dyn Error>> {
        Ok(query.perform(QueryRequest::CheckConnection, ctx.request_id.as_deref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::test_utils::{memory_query, seeded_store};
    use rstest::rstest;

    #[rstest]
    fn test_check_reports_ok() {
        let query = memory_query(seeded_store(), EngineConfig::default());
        let result = CheckCmd {}.execute(&query, &RequestContext::default()).unwrap();
        assert_eq!(result, QueryResponse::Done(true));
    }
}
