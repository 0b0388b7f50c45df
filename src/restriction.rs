//! Folding externally computed permissions into operations.
//!
//! The engine does not decide who may do what. A [`PermissionSource`] answers
//! per table and access level; an allow-with-restriction answer becomes one
//! more equality predicate and a deny answer stops the request before any
//! datasource call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::types::{Predicate, Record};

/// Kind of access a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Create,
    Update,
    Delete,
}

/// Rows visible to the caller are those where `column` equals `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restriction {
    pub column: String,
    pub value: Value,
}

impl Restriction {
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn predicate(&self) -> Predicate {
        Predicate::equals(&self.column, self.value.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PermissionOutcome {
    Allow,
    Restricted(Restriction),
    Deny,
}

/// Role lookup consumed by `Query::perform_authorized`.
pub trait PermissionSource {
    fn table_permission(
        &self,
        identity: &str,
        table: &str,
        access: AccessLevel,
    ) -> Result<PermissionOutcome>;
}

/// Turn an outcome into the restriction to apply, failing on deny.
pub fn restriction_for(outcome: PermissionOutcome, table: &str) -> Result<Option<Restriction>> {
    match outcome {
        PermissionOutcome::Allow => Ok(None),
        PermissionOutcome::Restricted(restriction) => Ok(Some(restriction)),
        PermissionOutcome::Deny => Err(EngineError::PermissionDenied {
            table: table.to_string(),
        }),
    }
}

/// Append the restriction predicate to a predicate set.
pub fn restrict_predicates(predicates: &mut Vec<Predicate>, restriction: Option<&Restriction>) {
    if let Some(restriction) = restriction {
        predicates.push(restriction.predicate());
    }
}

/// Force the restricted column of a new record to the restricted value.
pub fn restrict_record(data: &mut Record, restriction: Option<&Restriction>) {
    if let Some(restriction) = restriction {
        data.insert(restriction.column.clone(), restriction.value.clone());
    }
}

/// Static rule table: the first matching rule wins, anything unmatched is denied.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    rules: Vec<(Option<String>, String, Option<AccessLevel>, PermissionOutcome)>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. `None` identity or access matches any.
    pub fn rule(
        mut self,
        identity: Option<&str>,
        table: &str,
        access: Option<AccessLevel>,
        outcome: PermissionOutcome,
    ) -> Self {
        self.rules.push((
            identity.map(str::to_string),
            table.to_string(),
            access,
            outcome,
        ));
        self
    }
}

impl PermissionSource for StaticPermissions {
    fn table_permission(
        &self,
        identity: &str,
        table: &str,
        access: AccessLevel,
    ) -> Result<PermissionOutcome> {
        let outcome = self
            .rules
            .iter()
            .find(|(rule_identity, rule_table, rule_access, _)| {
                rule_identity.as_deref().is_none_or(|i| i == identity)
                    && rule_table == table
                    && rule_access.is_none_or(|a| a == access)
            })
            .map(|(_, _, _, outcome)| outcome.clone())
            .unwrap_or(PermissionOutcome::Deny);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operator;
    use rstest::rstest;
    use serde_json::json;

    fn permissions() -> StaticPermissions {
        StaticPermissions::new()
            .rule(None, "Product", Some(AccessLevel::Read), PermissionOutcome::Allow)
            .rule(
                Some("u1"),
                "Order",
                None,
                PermissionOutcome::Restricted(Restriction::new("userId", 1)),
            )
    }

    #[rstest]
    #[case("u1", "Product", AccessLevel::Read, PermissionOutcome::Allow)]
    #[case("u1", "Product", AccessLevel::Delete, PermissionOutcome::Deny)]
    #[case("u2", "Order", AccessLevel::Read, PermissionOutcome::Deny)]
    #[case(
        "u1",
        "Order",
        AccessLevel::Update,
        PermissionOutcome::Restricted(Restriction::new("userId", 1))
    )]
    fn test_static_rules(
        #[case] identity: &str,
        #[case] table: &str,
        #[case] access: AccessLevel,
        #[case] expected: PermissionOutcome,
    ) {
        assert_eq!(
            permissions().table_permission(identity, table, access).unwrap(),
            expected
        );
    }

    #[rstest]
    fn test_deny_is_permission_denied() {
        let err = restriction_for(PermissionOutcome::Deny, "Order").unwrap_err();
        assert_eq!(err, EngineError::PermissionDenied { table: "Order".into() });
    }

    #[rstest]
    fn test_restriction_appends_equality() {
        let restriction = Restriction::new("userId", 7);
        let mut predicates = vec![Predicate::new("total", Operator::Gt, 10)];
        restrict_predicates(&mut predicates, Some(&restriction));
        assert_eq!(predicates.len(), 2);
        assert_eq!(predicates[1], Predicate::equals("userId", 7));
    }

    #[rstest]
    fn test_restriction_overrides_record_value() {
        let mut data = Record::new();
        data.insert("userId".into(), json!(99));
        restrict_record(&mut data, Some(&Restriction::new("userId", 7)));
        assert_eq!(data["userId"], json!(7));
    }
}
