//! Subscription filter builder.
//!
//! [`SubscriptionFilter`] turns optional [`FilterCriteria`] into an ordered
//! list of independent [`FilterClause`]s combined with AND. Absent criteria add
//! no clause. The same filter can be evaluated in-process ([`SubscriptionFilter::matches`])
//! or rendered as a SQL predicate with named parameters
//! ([`SubscriptionFilter::to_sql`]); each clause renders only itself, so values
//! never reach the SQL text.
//!
//! ## Example
//!
//! ```
//! use subledger_cost::{FilterCriteria, SubscriptionFilter};
//!
//! let criteria = FilterCriteria::new().with_service("Yandex Plus");
//! let filter = SubscriptionFilter::from_criteria(&criteria).unwrap();
//! assert_eq!(filter.to_sql().where_clause(), " WHERE service_name = :service_name");
//!
//! let bad = FilterCriteria::new().with_owner("not-a-uuid");
//! assert!(SubscriptionFilter::from_criteria(&bad).is_err());
//! ```

use rusqlite::ToSql;
use rusqlite::types::Value;
use subledger_core::LedgerError;
use uuid::Uuid;

use crate::models::{FilterCriteria, Subscription};

/// A single equality constraint on a subscription field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterClause {
    /// `user_id = owner`
    Owner(Uuid),
    /// `service_name = name` (exact, case-sensitive)
    ServiceName(String),
}

impl FilterClause {
    /// Whether `sub` satisfies this clause.
    pub fn matches(&self, sub: &Subscription) -> bool {
        match self {
            FilterClause::Owner(owner) => sub.owner_id == *owner,
            FilterClause::ServiceName(name) => sub.service_name == *name,
        }
    }

    /// SQL condition referencing this clause's named parameter.
    pub fn sql_condition(&self) -> &'static str {
        match self {
            FilterClause::Owner(_) => "user_id = :user_id",
            FilterClause::ServiceName(_) => "service_name = :service_name",
        }
    }

    /// Named parameter bound by [`FilterClause::sql_condition`].
    pub fn param_name(&self) -> &'static str {
        match self {
            FilterClause::Owner(_) => ":user_id",
            FilterClause::ServiceName(_) => ":service_name",
        }
    }

    /// Parameter value in storage encoding.
    pub fn param_value(&self) -> Value {
        match self {
            FilterClause::Owner(owner) => Value::Text(owner.hyphenated().to_string()),
            FilterClause::ServiceName(name) => Value::Text(name.clone()),
        }
    }

    fn same_kind(&self, other: &FilterClause) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Conjunction of filter clauses. The empty filter matches every subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    clauses: Vec<FilterClause>,
}

impl SubscriptionFilter {
    /// Filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Build a filter from optional criteria.
    ///
    /// Fails with `InvalidArgument` on the `user_id` field when the owner text
    /// is not a valid UUID; no partial filter is returned.
    pub fn from_criteria(criteria: &FilterCriteria) -> Result<Self, LedgerError> {
        let mut filter = Self::all();

        if let Some(raw) = &criteria.owner_id {
            let owner = Uuid::parse_str(raw)
                .map_err(|e| LedgerError::invalid_argument("user_id", raw, e.to_string()))?;
            filter = filter.with_clause(FilterClause::Owner(owner));
        }

        if let Some(name) = &criteria.service_name {
            filter = filter.with_clause(FilterClause::ServiceName(name.clone()));
        }

        Ok(filter)
    }

    /// Add a clause, replacing any existing clause on the same field.
    pub fn with_clause(mut self, clause: FilterClause) -> Self {
        match self.clauses.iter_mut().find(|c| c.same_kind(&clause)) {
            Some(existing) => *existing = clause,
            None => self.clauses.push(clause),
        }
        self
    }

    /// The clauses, in insertion order.
    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    /// True when no clause constrains the result.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether `sub` satisfies every clause.
    pub fn matches(&self, sub: &Subscription) -> bool {
        self.clauses.iter().all(|clause| clause.matches(sub))
    }

    /// Select the matching subscriptions, preserving input order.
    pub fn select<'a, I>(&self, subscriptions: I) -> Vec<&'a Subscription>
    where
        I: IntoIterator<Item = &'a Subscription>,
    {
        subscriptions
            .into_iter()
            .filter(|sub| self.matches(sub))
            .collect()
    }

    /// Render as a SQL predicate with named parameters.
    pub fn to_sql(&self) -> SqlPredicate {
        let mut predicate = SqlPredicate::default();
        for clause in &self.clauses {
            predicate.push(
                clause.sql_condition(),
                [(clause.param_name(), clause.param_value())],
            );
        }
        predicate
    }
}

/// SQL conditions joined with AND, plus their named parameters.
///
/// Storage code appends its own conditions (period bounds, paging) with
/// [`SqlPredicate::push`] and binds everything through [`SqlPredicate::params`].
#[derive(Debug, Clone, Default)]
pub struct SqlPredicate {
    conditions: Vec<&'static str>,
    params: Vec<(&'static str, Value)>,
}

impl SqlPredicate {
    /// Append a condition and the named parameters it references.
    pub fn push<P>(&mut self, condition: &'static str, params: P)
    where
        P: IntoIterator<Item = (&'static str, Value)>,
    {
        self.conditions.push(condition);
        self.params.extend(params);
    }

    /// Bind an extra named parameter not tied to a condition (e.g. `:limit`).
    pub fn bind(&mut self, name: &'static str, value: Value) {
        self.params.push((name, value));
    }

    /// ` WHERE a AND b`, or an empty string when there are no conditions.
    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Named parameters in the form rusqlite binds.
    pub fn params(&self) -> Vec<(&str, &dyn ToSql)> {
        self.params
            .iter()
            .map(|(name, value)| (*name, value as &dyn ToSql))
            .collect()
    }

    /// Number of conditions.
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// True when there are no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
