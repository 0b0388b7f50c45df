use std::error::Error;

use super::TruncateCmd;
use crate::commands::Execute;
use crate::query::{Query, QueryRequest, QueryResponse};
use crate::types::RequestContext;

impl Execute for TruncateCmd {
    type Output = QueryResponse;

    fn execute(self, query: &Query, ctx: &RequestContext) -> Result<Self::Output, Box<dyn Error>> {
        if !self.yes {
            return Err(format!("Refusing to truncate '{}' without --yes", self.table).into());
        }
        let request = QueryRequest::Truncate { table: self.table };
        Ok(query.perform(request, ctx.request_id.as_deref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::test_utils::{memory_query, seeded_store};
    use rstest::{fixture, rstest};

    #[fixture]
    fn query() -> Query {
        memory_query(seeded_store(), EngineConfig::default())
    }

    fn total(query: &Query) -> u64 {
        match query
            .perform(
                QueryRequest::FindMany {
                    table: "customers".into(),
                    params: Default::default(),
                },
                None,
            )
            .unwrap()
        {
            QueryResponse::Page(page) => page.total,
            other => panic!("expected a page, got {other:?}"),
        }
    }

    #[rstest]
    fn test_requires_confirmation(query: Query) {
        let cmd = TruncateCmd {
            table: "customers".into(),
            yes: false,
        };
        let err = cmd.execute(&query, &RequestContext::default()).unwrap_err();
        assert!(err.to_string().contains("--yes"));
        assert_eq!(total(&query), 3);
    }

    #[rstest]
    fn test_truncate_empties_table(query: Query) {
        let cmd = TruncateCmd {
            table: "customers".into(),
            yes: true,
        };
        assert_eq!(
            cmd.execute(&query, &RequestContext::default()).unwrap(),
            QueryResponse::Done(true)
        );
        assert_eq!(total(&query), 0);
    }
}
