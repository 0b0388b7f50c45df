//! Compiled statements.

use std::fmt;

use super::value::SqlValue;

/// A statement ready for execution: SQL text plus positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl CompiledQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Parameters rendered for log lines.
    pub fn params_display(&self) -> String {
        let rendered: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        format!("[{}]", rendered.join(", "))
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            f.write_str(&self.sql)
        } else {
            write!(f, "{} -- params: {}", self.sql, self.params_display())
        }
    }
}

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub affected: u64,
    pub last_insert_id: Option<i64>,
}
