//! Single-field predicates

use serde::{Deserialize, Serialize};

use crate::value::{DistanceUnit, GeoPoint, ObjectRef, Value};

use super::errors::{QueryError, QueryResult};
use super::spec::QuerySpec;

/// One predicate on one field of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Constraint {
    Equal {
        key: String,
        value: Value,
    },
    NotEqual {
        key: String,
        value: Value,
    },
    GreaterThan {
        key: String,
        value: Value,
    },
    GreaterOrEqual {
        key: String,
        value: Value,
    },
    LessThan {
        key: String,
        value: Value,
    },
    LessOrEqual {
        key: String,
        value: Value,
    },
    /// An empty candidate list is accepted; the remote side treats it as
    /// matching nothing.
    In {
        key: String,
        values: Vec<Value>,
    },
    /// An empty candidate list is accepted; the remote side treats it as
    /// matching everything.
    NotIn {
        key: String,
        values: Vec<Value>,
    },
    Exists {
        key: String,
    },
    NotExists {
        key: String,
    },
    /// The sub-query is a snapshot taken when the constraint was built
    MatchesSubquery {
        key: String,
        query: Box<QuerySpec>,
    },
    DoesNotMatchSubquery {
        key: String,
        query: Box<QuerySpec>,
    },
    /// Records that are members of `object`'s relation column `key`
    RelatedTo {
        key: String,
        object: ObjectRef,
    },
    NearGeoPoint {
        key: String,
        point: GeoPoint,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_distance: Option<f64>,
        #[serde(default)]
        unit: DistanceUnit,
    },
    WithinGeoBox {
        key: String,
        southwest: GeoPoint,
        northeast: GeoPoint,
    },
}

impl Constraint {
    /// Returns the field this constraint applies to
    pub fn key(&self) -> &str {
        match self {
            Constraint::Equal { key, .. }
            | Constraint::NotEqual { key, .. }
            | Constraint::GreaterThan { key, .. }
            | Constraint::GreaterOrEqual { key, .. }
            | Constraint::LessThan { key, .. }
            | Constraint::LessOrEqual { key, .. }
            | Constraint::In { key, .. }
            | Constraint::NotIn { key, .. }
            | Constraint::Exists { key }
            | Constraint::NotExists { key }
            | Constraint::MatchesSubquery { key, .. }
            | Constraint::DoesNotMatchSubquery { key, .. }
            | Constraint::RelatedTo { key, .. }
            | Constraint::NearGeoPoint { key, .. }
            | Constraint::WithinGeoBox { key, .. } => key,
        }
    }

    /// Returns the operation name used in canonical forms and messages
    pub fn op_name(&self) -> &'static str {
        match self {
            Constraint::Equal { .. } => "equal",
            Constraint::NotEqual { .. } => "not_equal",
            Constraint::GreaterThan { .. } => "greater_than",
            Constraint::GreaterOrEqual { .. } => "greater_or_equal",
            Constraint::LessThan { .. } => "less_than",
            Constraint::LessOrEqual { .. } => "less_or_equal",
            Constraint::In { .. } => "in",
            Constraint::NotIn { .. } => "not_in",
            Constraint::Exists { .. } => "exists",
            Constraint::NotExists { .. } => "not_exists",
            Constraint::MatchesSubquery { .. } => "matches_subquery",
            Constraint::DoesNotMatchSubquery { .. } => "does_not_match_subquery",
            Constraint::RelatedTo { .. } => "related_to",
            Constraint::NearGeoPoint { .. } => "near_geo_point",
            Constraint::WithinGeoBox { .. } => "within_geo_box",
        }
    }

    /// Returns true for the comparison operators (>, >=, <, <=)
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Constraint::GreaterThan { .. }
                | Constraint::GreaterOrEqual { .. }
                | Constraint::LessThan { .. }
                | Constraint::LessOrEqual { .. }
        )
    }

    /// Checks the key, values, geo ranges and nested sub-queries
    pub fn validate(&self) -> QueryResult<()> {
        validate_key(self.key())?;

        match self {
            Constraint::Equal { value, .. }
            | Constraint::NotEqual { value, .. }
            | Constraint::GreaterThan { value, .. }
            | Constraint::GreaterOrEqual { value, .. }
            | Constraint::LessThan { value, .. }
            | Constraint::LessOrEqual { value, .. } => value.validate(),
            Constraint::In { values, .. } | Constraint::NotIn { values, .. } => {
                values.iter().try_for_each(Value::validate)
            }
            Constraint::Exists { .. } | Constraint::NotExists { .. } => Ok(()),
            Constraint::MatchesSubquery { query, .. }
            | Constraint::DoesNotMatchSubquery { query, .. } => query.validate(),
            Constraint::RelatedTo { object, .. } => object.validate(),
            Constraint::NearGeoPoint {
                point,
                max_distance,
                ..
            } => {
                point.validate()?;
                match max_distance {
                    Some(d) if !d.is_finite() || *d < 0.0 => Err(QueryError::invalid_constraint(
                        format!("max distance {} must be a non-negative number", d),
                    )),
                    _ => Ok(()),
                }
            }
            Constraint::WithinGeoBox {
                southwest,
                northeast,
                ..
            } => {
                southwest.validate()?;
                northeast.validate()?;
                if southwest.latitude() > northeast.latitude() {
                    return Err(QueryError::invalid_constraint(format!(
                        "geo box southwest latitude {} is north of northeast latitude {}",
                        southwest.latitude(),
                        northeast.latitude()
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Field names must be non-empty and must not start with `$`
pub(crate) fn validate_key(key: &str) -> QueryResult<()> {
    if key.trim().is_empty() {
        return Err(QueryError::invalid_constraint("key must be non-empty"));
    }
    if key.starts_with('$') {
        return Err(QueryError::invalid_constraint(format!(
            "key '{}' must not start with '$'",
            key
        )));
    }
    Ok(())
}
