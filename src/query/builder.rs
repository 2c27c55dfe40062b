//! Change query dialect
//!
//! Operators are registered explicitly by name. Each factory turns the raw
//! value into a predicate, rejecting values it cannot interpret.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::predicate::{ChangeStatus, Operand, OperatorPredicate, Predicate};

use super::errors::{QueryError, QueryResult};
use super::parser;

/// Builds a predicate from an operator value
pub type OperatorFactory = fn(&str) -> QueryResult<Predicate>;

/// Parser front end holding the operator registration table
#[derive(Clone, Default)]
pub struct ChangeQueryBuilder {
    operators: BTreeMap<String, OperatorFactory>,
}

impl fmt::Debug for ChangeQueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeQueryBuilder")
            .field("operators", &self.operators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ChangeQueryBuilder {
    /// Builder with no operators
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for the change dialect
    pub fn changes() -> Self {
        Self::new()
            .with_operator("status", status)
            .with_operator("is", is)
            .with_operator("project", project)
            .with_operator("branch", branch)
            .with_operator("ref", git_ref)
            .with_operator("file", file)
            .with_operator("owner", owner)
            .with_operator("topic", topic)
            .with_operator("hashtag", hashtag)
            .with_operator("message", message)
            .with_operator("after", after)
            .with_operator("since", since)
            .with_operator("before", before)
            .with_operator("until", until)
            .with_operator("limit", limit)
    }

    /// Registers an operator, replacing any previous factory of that name
    pub fn with_operator(mut self, name: &str, factory: OperatorFactory) -> Self {
        self.operators.insert(name.to_ascii_lowercase(), factory);
        self
    }

    pub fn has_operator(&self, name: &str) -> bool {
        self.operators.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered operator names in sorted order
    pub fn operator_names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    /// Parses query text into a predicate tree
    pub fn parse(&self, query: &str) -> QueryResult<Predicate> {
        parser::parse(self, query)
    }

    /// Resolves `name:value` through the registration table
    pub fn build_operator(&self, name: &str, value: &str) -> QueryResult<Predicate> {
        match self.operators.get(&name.to_ascii_lowercase()) {
            Some(factory) => factory(value),
            None => Err(QueryError::unsupported_operator(name, value)),
        }
    }

    /// `status:open`, the usual default scope for bare in-memory queries
    pub fn status_open() -> Predicate {
        Predicate::operator(OperatorPredicate::new(
            "status",
            "status",
            "open",
            Operand::Status(vec![ChangeStatus::New]),
        ))
    }
}

fn status(value: &str) -> QueryResult<Predicate> {
    let value = value.to_ascii_lowercase();
    let allowed = match value.as_str() {
        "open" | "new" => vec![ChangeStatus::New],
        "closed" => vec![ChangeStatus::Merged, ChangeStatus::Abandoned],
        "merged" => vec![ChangeStatus::Merged],
        "abandoned" => vec![ChangeStatus::Abandoned],
        _ => {
            return Err(QueryError::parse_at(
                "Unrecognized value",
                format!("status:{}", value),
            ))
        }
    };
    Ok(Predicate::operator(OperatorPredicate::new(
        "status",
        "status",
        value,
        Operand::Status(allowed),
    )))
}

fn is(value: &str) -> QueryResult<Predicate> {
    match value.to_ascii_lowercase().as_str() {
        "open" | "closed" | "new" | "merged" | "abandoned" => status(value),
        _ => Err(QueryError::unsupported_operator("is", value)),
    }
}

fn exact(field: &str, value: &str) -> QueryResult<Predicate> {
    Ok(Predicate::operator(OperatorPredicate::exact(field, value)))
}

fn project(value: &str) -> QueryResult<Predicate> {
    exact("project", value)
}

fn branch(value: &str) -> QueryResult<Predicate> {
    exact("branch", value)
}

fn git_ref(value: &str) -> QueryResult<Predicate> {
    exact("ref", value)
}

fn file(value: &str) -> QueryResult<Predicate> {
    exact("file", value)
}

fn owner(value: &str) -> QueryResult<Predicate> {
    exact("owner", value)
}

fn topic(value: &str) -> QueryResult<Predicate> {
    exact("topic", value)
}

fn hashtag(value: &str) -> QueryResult<Predicate> {
    exact("hashtag", value)
}

fn message(value: &str) -> QueryResult<Predicate> {
    Ok(Predicate::operator(OperatorPredicate::new(
        "message",
        "message",
        value,
        Operand::Substring,
    )))
}

fn after(value: &str) -> QueryResult<Predicate> {
    timestamp("after", value, Operand::After)
}

fn since(value: &str) -> QueryResult<Predicate> {
    timestamp("since", value, Operand::After)
}

fn before(value: &str) -> QueryResult<Predicate> {
    timestamp("before", value, Operand::Before)
}

fn until(value: &str) -> QueryResult<Predicate> {
    timestamp("until", value, Operand::Before)
}

fn timestamp(operator: &str, value: &str, operand: fn(i64) -> Operand) -> QueryResult<Predicate> {
    let parsed = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| {
            QueryError::parse_at("Invalid timestamp", format!("{}:{}", operator, value))
        })?;
    Ok(Predicate::operator(OperatorPredicate::new(
        operator,
        "updated",
        value,
        operand(parsed.and_utc().timestamp()),
    )))
}

fn limit(value: &str) -> QueryResult<Predicate> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(Predicate::operator(OperatorPredicate::limit(n))),
        _ => Err(QueryError::parse_at("Invalid limit", value)),
    }
}
