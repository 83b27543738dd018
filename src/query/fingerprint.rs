//! Query fingerprints
//!
//! A fingerprint is the SHA-256 of a canonical JSON document describing the
//! query's shape: collection, predicate tree, ordering, paging and
//! projection. Cache policy and max age are not part of the shape.
//!
//! Canonicalization rules:
//! - Items of one constraint set are sorted (AND is commutative)
//! - Combinator kind is kept, so `Or` and `And` trees with the same leaves
//!   fingerprint differently
//! - `And` branches are sorted; `Or` branches keep their order
//! - Ordering keys keep their sequence
//! - Projection sets are sorted
//!
//! Logically equivalent but structurally different trees (for example
//! `And(Or(A,B),C)` versus `Or(And(A,C),And(B,C))`) are not unified.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sha2::{Digest, Sha256};

use super::constraint::Constraint;
use super::constraint_set::{ConstraintItem, ConstraintSet};
use super::serialize::clause;
use super::spec::{QuerySpec, SortSpec};

/// Deterministic digest of a query's shape (lowercase hex SHA-256)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of `spec`
    pub fn of(spec: &QuerySpec) -> Self {
        let document = canonical_document(spec);
        let mut hasher = Sha256::new();
        hasher.update(document.to_string().as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wraps an existing hex digest (e.g. read back from a snapshot)
    pub fn from_hex(hex: impl Into<String>) -> Option<Self> {
        let hex = hex.into();
        let valid = hex.len() == 64
            && hex
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then_some(Self(hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading 12 hex characters, for log lines
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical shape document hashed by `Fingerprint::of`
pub fn canonical_document(spec: &QuerySpec) -> JsonValue {
    json!({
        "collection": spec.collection(),
        "where": canonical_set(spec.constraints()),
        "order": spec.order().iter().map(SortSpec::to_wire).collect::<Vec<_>>(),
        "limit": spec.limit(),
        "skip": spec.skip(),
        "include": spec.included_keys(),
        "keys": spec.selected_keys(),
    })
}

fn canonical_set(set: &ConstraintSet) -> JsonValue {
    let mut items: Vec<JsonValue> = set.items().iter().map(canonical_item).collect();
    items.sort_by_cached_key(|item| item.to_string());
    JsonValue::Array(items)
}

fn canonical_item(item: &ConstraintItem) -> JsonValue {
    match item {
        ConstraintItem::Constraint(c) => canonical_constraint(c),
        ConstraintItem::Combinator(c) => {
            let mut branches: Vec<JsonValue> = c.branches().iter().map(canonical_set).collect();
            if !c.is_or() {
                branches.sort_by_cached_key(|branch| branch.to_string());
            }
            json!({
                "combinator": c.name(),
                "branches": branches,
            })
        }
    }
}

fn canonical_constraint(constraint: &Constraint) -> JsonValue {
    match constraint {
        Constraint::MatchesSubquery { key, query }
        | Constraint::DoesNotMatchSubquery { key, query } => json!({
            "key": key,
            "op": constraint.op_name(),
            "query": canonical_document(query),
        }),
        other => json!({
            "key": other.key(),
            "op": other.op_name(),
            "operand": clause(other).into_json(),
        }),
    }
}
