use std::error::Error;

use super::SchemaCmd;
use crate::commands::Execute;
use crate::query::Query;
use crate::types::{RequestContext, Schema};

impl Execute for SchemaCmd {
    type Output = Schema;

    fn execute(self, query: &Query, ctx: &RequestContext) -> Result<Self::Output, Box<dyn Error>> {
        Ok(query.get_schema(ctx, &self.table)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::EngineError;
    use crate::test_utils::{memory_query, seeded_store};
    use crate::types::ColumnType;
    use rstest::{fixture, rstest};

    #[fixture]
    fn query() -> Query {
        memory_query(seeded_store(), EngineConfig::default())
    }

    #[rstest]
    fn test_schema_inferred_from_documents(query: Query) {
        let cmd = SchemaCmd {
            table: "customers".into(),
        };
        let schema = cmd.execute(&query, &RequestContext::default()).unwrap();
        assert_eq!(schema.primary_key.as_deref(), Some("_id"));
        assert_eq!(
            schema.column("vip").map(|c| c.column_type),
            Some(ColumnType::Boolean)
        );
    }

    #[rstest]
    fn test_unknown_table(query: Query) {
        let cmd = SchemaCmd {
            table: "suppliers".into(),
        };
        let err = cmd.execute(&query, &RequestContext::default()).unwrap_err();
        let err = err.downcast_ref::<EngineError>().unwrap();
        assert!(matches!(err, EngineError::SchemaNotFound { .. }));
    }
}
