//! Boolean predicate tree

use std::fmt;
use std::slice;
use std::sync::Arc;

use crate::query::{QueryError, QueryResult};

use super::document::ChangeDocument;
use super::operator::{Matchable, OperatorPredicate};

/// Node variants of a predicate tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    Operator(OperatorPredicate),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Predicate),
}

/// Shared, immutable predicate tree node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate(Arc<PredicateKind>);

impl Predicate {
    fn from_kind(kind: PredicateKind) -> Self {
        Predicate(Arc::new(kind))
    }

    /// Wraps an operator leaf
    pub fn operator(op: OperatorPredicate) -> Self {
        Self::from_kind(PredicateKind::Operator(op))
    }

    /// Conjunction. A single child is returned as is; nested ANDs are flattened.
    pub fn and(children: Vec<Predicate>) -> Self {
        Self::combine(children, true)
    }

    /// Disjunction. A single child is returned as is; nested ORs are flattened.
    pub fn or(children: Vec<Predicate>) -> Self {
        Self::combine(children, false)
    }

    fn combine(children: Vec<Predicate>, conjunction: bool) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child.kind() {
                PredicateKind::And(nested) if conjunction => flat.extend(nested.iter().cloned()),
                PredicateKind::Or(nested) if !conjunction => flat.extend(nested.iter().cloned()),
                _ => flat.push(child),
            }
        }
        if flat.len() == 1 {
            if let Some(only) = flat.pop() {
                return only;
            }
        }
        if conjunction {
            Self::from_kind(PredicateKind::And(flat))
        } else {
            Self::from_kind(PredicateKind::Or(flat))
        }
    }

    /// Negation. `not(not(p))` returns the same `p`.
    pub fn not(child: Predicate) -> Self {
        if let PredicateKind::Not(inner) = child.kind() {
            return inner.clone();
        }
        Self::from_kind(PredicateKind::Not(child))
    }

    pub fn kind(&self) -> &PredicateKind {
        &self.0
    }

    /// True when both handles point at the same node
    pub fn ptr_eq(a: &Predicate, b: &Predicate) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn as_operator(&self) -> Option<&OperatorPredicate> {
        match self.kind() {
            PredicateKind::Operator(op) => Some(op),
            _ => None,
        }
    }

    pub fn is_operator(&self) -> bool {
        self.as_operator().is_some()
    }

    /// Read-only view of the children
    pub fn children(&self) -> &[Predicate] {
        match self.kind() {
            PredicateKind::Operator(_) => &[],
            PredicateKind::And(children) | PredicateKind::Or(children) => children,
            PredicateKind::Not(child) => slice::from_ref(child),
        }
    }

    pub fn child(&self, i: usize) -> Option<&Predicate> {
        self.children().get(i)
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    /// Builds a node of the same kind over new children.
    ///
    /// Leaves accept only an empty list and return themselves; NOT requires
    /// exactly one child.
    pub fn copy(&self, mut children: Vec<Predicate>) -> QueryResult<Predicate> {
        match self.kind() {
            PredicateKind::Operator(_) => {
                if !children.is_empty() {
                    return Err(QueryError::invalid_argument(format!(
                        "{} does not take children, got {}",
                        self,
                        children.len()
                    )));
                }
                Ok(self.clone())
            }
            PredicateKind::Not(_) => match children.pop() {
                Some(child) if children.is_empty() => {
                    Ok(Self::from_kind(PredicateKind::Not(child)))
                }
                _ => Err(QueryError::invalid_argument(
                    "NOT requires exactly one child",
                )),
            },
            PredicateKind::And(_) => Ok(Self::from_kind(PredicateKind::And(children))),
            PredicateKind::Or(_) => Ok(Self::from_kind(PredicateKind::Or(children))),
        }
    }

    /// All operator leaves, depth first
    pub fn leaves(&self) -> Vec<&OperatorPredicate> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a OperatorPredicate>) {
        match self.kind() {
            PredicateKind::Operator(op) => out.push(op),
            _ => {
                for child in self.children() {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Smallest `limit:N` anywhere in the tree
    pub fn min_limit(&self) -> Option<usize> {
        self.leaves().iter().filter_map(|op| op.limit_value()).min()
    }
}

impl Matchable for Predicate {
    fn matches(&self, doc: &ChangeDocument) -> bool {
        match self.kind() {
            PredicateKind::Operator(op) => op.matches(doc),
            PredicateKind::And(children) => by_cost(children).iter().all(|c| c.matches(doc)),
            PredicateKind::Or(children) => by_cost(children).iter().any(|c| c.matches(doc)),
            PredicateKind::Not(child) => !child.matches(doc),
        }
    }

    fn cost(&self) -> u32 {
        match self.kind() {
            PredicateKind::Operator(op) => op.cost(),
            PredicateKind::Not(child) => child.cost(),
            PredicateKind::And(children) | PredicateKind::Or(children) => children
                .iter()
                .fold(0u32, |acc, c| acc.saturating_add(c.cost())),
        }
    }
}

fn by_cost(children: &[Predicate]) -> Vec<&Predicate> {
    let mut sorted: Vec<&Predicate> = children.iter().collect();
    sorted.sort_by_key(|c| c.cost());
    sorted
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            PredicateKind::Operator(op) => write!(f, "{}", op),
            PredicateKind::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match child.kind() {
                        PredicateKind::Or(_) | PredicateKind::And(_) => write!(f, "({})", child)?,
                        _ => write!(f, "{}", child)?,
                    }
                }
                Ok(())
            }
            PredicateKind::Or(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    match child.kind() {
                        PredicateKind::And(_) | PredicateKind::Or(_) => write!(f, "({})", child)?,
                        _ => write!(f, "{}", child)?,
                    }
                }
                Ok(())
            }
            PredicateKind::Not(child) => match child.kind() {
                PredicateKind::Operator(_) | PredicateKind::Not(_) => write!(f, "-{}", child),
                _ => write!(f, "-({})", child),
            },
        }
    }
}
