//! Wire encoding of queries
//!
//! Produces the JSON query handed to the transport. Constraints on the same
//! key merge into one operator object; clauses that would collide (same
//! operator twice on a key, a second `$or`, a second `$relatedTo`) move into
//! the top-level `$and` array so nothing is dropped.

use std::collections::BTreeSet;

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value as JsonValue};

use super::constraint::Constraint;
use super::constraint_set::{Combinator, ConstraintItem, ConstraintSet};
use super::spec::{QuerySpec, SortSpec};

/// Encoded form of one constraint
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Clause {
    /// Bare equality value placed directly under the key
    Equal(JsonValue),
    /// Operator fragment merged under the key
    Operators(Map<String, JsonValue>),
    /// Clause placed at the top level of the where object
    TopLevel(&'static str, JsonValue),
}

impl Clause {
    fn operator(op: &str, operand: JsonValue) -> Self {
        let mut ops = Map::new();
        ops.insert(op.to_string(), operand);
        Clause::Operators(ops)
    }

    /// The clause's payload, without its placement
    pub(crate) fn into_json(self) -> JsonValue {
        match self {
            Clause::Equal(v) | Clause::TopLevel(_, v) => v,
            Clause::Operators(ops) => JsonValue::Object(ops),
        }
    }
}

/// Encodes one constraint
pub(crate) fn clause(constraint: &Constraint) -> Clause {
    match constraint {
        Constraint::Equal { value, .. } => Clause::Equal(value.to_wire()),
        Constraint::NotEqual { value, .. } => Clause::operator("$ne", value.to_wire()),
        Constraint::GreaterThan { value, .. } => Clause::operator("$gt", value.to_wire()),
        Constraint::GreaterOrEqual { value, .. } => Clause::operator("$gte", value.to_wire()),
        Constraint::LessThan { value, .. } => Clause::operator("$lt", value.to_wire()),
        Constraint::LessOrEqual { value, .. } => Clause::operator("$lte", value.to_wire()),
        Constraint::In { values, .. } => Clause::operator(
            "$in",
            JsonValue::Array(values.iter().map(|v| v.to_wire()).collect()),
        ),
        Constraint::NotIn { values, .. } => Clause::operator(
            "$nin",
            JsonValue::Array(values.iter().map(|v| v.to_wire()).collect()),
        ),
        Constraint::Exists { .. } => Clause::operator("$exists", JsonValue::Bool(true)),
        Constraint::NotExists { .. } => Clause::operator("$exists", JsonValue::Bool(false)),
        Constraint::MatchesSubquery { query, .. } => {
            Clause::operator("$inQuery", query.to_serialized().to_json())
        }
        Constraint::DoesNotMatchSubquery { query, .. } => {
            Clause::operator("$notInQuery", query.to_serialized().to_json())
        }
        Constraint::RelatedTo { key, object } => Clause::TopLevel(
            "$relatedTo",
            json!({ "object": object.to_wire(), "key": key }),
        ),
        Constraint::NearGeoPoint {
            point,
            max_distance,
            unit,
            ..
        } => {
            let mut ops = Map::new();
            ops.insert("$nearSphere".to_string(), point.to_wire());
            if let Some(d) = max_distance {
                ops.insert(unit.wire_operator().to_string(), json!(d));
            }
            Clause::Operators(ops)
        }
        Constraint::WithinGeoBox {
            southwest,
            northeast,
            ..
        } => Clause::operator(
            "$within",
            json!({ "$box": [southwest.to_wire(), northeast.to_wire()] }),
        ),
    }
}

/// Encodes a constraint set as a `where` object
pub(crate) fn encode_where(set: &ConstraintSet) -> Map<String, JsonValue> {
    let mut encoder = WhereEncoder::default();
    for item in set.items() {
        match item {
            ConstraintItem::Constraint(c) => encoder.push_constraint(c),
            ConstraintItem::Combinator(c) => encoder.push_combinator(c),
        }
    }
    encoder.finish()
}

#[derive(Default)]
struct WhereEncoder {
    clauses: Map<String, JsonValue>,
    /// Keys currently holding a bare equality value
    bare_equals: BTreeSet<String>,
    /// Extra conjuncts emitted as `$and`
    conjuncts: Vec<JsonValue>,
}

impl WhereEncoder {
    fn push_constraint(&mut self, constraint: &Constraint) {
        let key = constraint.key();
        match clause(constraint) {
            Clause::Equal(value) => {
                if self.clauses.contains_key(key) {
                    let mut ops = Map::new();
                    ops.insert("$eq".to_string(), value);
                    self.merge_operators(key, ops);
                } else {
                    self.clauses.insert(key.to_string(), value);
                    self.bare_equals.insert(key.to_string());
                }
            }
            Clause::Operators(ops) => self.merge_operators(key, ops),
            Clause::TopLevel(op, value) => self.insert_top_level(op, value),
        }
    }

    fn push_combinator(&mut self, combinator: &Combinator) {
        let branches: Vec<JsonValue> = combinator
            .branches()
            .iter()
            .map(|b| JsonValue::Object(encode_where(b)))
            .collect();

        match combinator {
            Combinator::And(_) => self.conjuncts.extend(branches),
            Combinator::Or(_) => self.insert_top_level("$or", JsonValue::Array(branches)),
        }
    }

    fn insert_top_level(&mut self, op: &str, value: JsonValue) {
        if self.clauses.contains_key(op) {
            self.conjuncts.push(single_entry(op, value));
        } else {
            self.clauses.insert(op.to_string(), value);
        }
    }

    fn merge_operators(&mut self, key: &str, ops: Map<String, JsonValue>) {
        if self.bare_equals.remove(key) {
            if let Some(value) = self.clauses.remove(key) {
                self.clauses
                    .insert(key.to_string(), json!({ "$eq": value }));
            }
        }

        match self.clauses.get_mut(key) {
            None => {
                self.clauses.insert(key.to_string(), JsonValue::Object(ops));
            }
            Some(JsonValue::Object(existing))
                if !ops.keys().any(|op| existing.contains_key(op)) =>
            {
                existing.extend(ops);
            }
            Some(_) => {
                self.conjuncts
                    .push(single_entry(key, JsonValue::Object(ops)));
            }
        }
    }

    fn finish(mut self) -> Map<String, JsonValue> {
        if !self.conjuncts.is_empty() {
            self.clauses
                .insert("$and".to_string(), JsonValue::Array(self.conjuncts));
        }
        self.clauses
    }
}

fn single_entry(key: &str, value: JsonValue) -> JsonValue {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    JsonValue::Object(map)
}

/// Query as sent to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedQuery {
    class_name: String,
    where_clause: Map<String, JsonValue>,
    order: Vec<String>,
    limit: u64,
    skip: u64,
    include: Vec<String>,
    keys: Vec<String>,
    count: bool,
}

impl SerializedQuery {
    /// Wire query for a list request
    pub fn from_spec(spec: &QuerySpec) -> Self {
        Self {
            class_name: spec.collection().to_string(),
            where_clause: encode_where(spec.constraints()),
            order: spec.order().iter().map(SortSpec::to_wire).collect(),
            limit: spec.limit(),
            skip: spec.skip(),
            include: spec.included_keys().iter().cloned().collect(),
            keys: spec.selected_keys().iter().cloned().collect(),
            count: false,
        }
    }

    /// Wire query for a count request: predicate only, no paging or projection
    pub fn count_of(spec: &QuerySpec) -> Self {
        Self {
            class_name: spec.collection().to_string(),
            where_clause: encode_where(spec.constraints()),
            order: Vec::new(),
            limit: 0,
            skip: 0,
            include: Vec::new(),
            keys: Vec::new(),
            count: true,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn where_clause(&self) -> &Map<String, JsonValue> {
        &self.where_clause
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_count(&self) -> bool {
        self.count
    }

    /// JSON body; defaulted fields are omitted
    pub fn to_json(&self) -> JsonValue {
        let mut out = Map::new();
        out.insert("className".to_string(), json!(self.class_name));
        out.insert(
            "where".to_string(),
            JsonValue::Object(self.where_clause.clone()),
        );
        if !self.order.is_empty() {
            out.insert("order".to_string(), json!(self.order.join(",")));
        }
        if self.count {
            out.insert("count".to_string(), json!(1));
            out.insert("limit".to_string(), json!(0));
        } else {
            if self.limit > 0 {
                out.insert("limit".to_string(), json!(self.limit));
            }
            if self.skip > 0 {
                out.insert("skip".to_string(), json!(self.skip));
            }
        }
        if !self.include.is_empty() {
            out.insert("include".to_string(), json!(self.include.join(",")));
        }
        if !self.keys.is_empty() {
            out.insert("keys".to_string(), json!(self.keys.join(",")));
        }
        JsonValue::Object(out)
    }
}

impl Serialize for SerializedQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
