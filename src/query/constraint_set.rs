//! Constraint sets and AND/OR combinators
//!
//! A `ConstraintSet` is the full predicate of one query: an ordered list of
//! bare constraints and nested combinators, all joined by implicit AND.
//! Sets are built bottom-up and embedded by value, so trees are acyclic.

use serde::{Deserialize, Serialize};

use crate::value::{DistanceUnit, GeoPoint, ObjectRef, Value};

use super::constraint::Constraint;
use super::errors::{QueryError, QueryResult};
use super::spec::QuerySpec;

/// One entry of a constraint set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintItem {
    Constraint(Constraint),
    Combinator(Combinator),
}

impl ConstraintItem {
    fn validate(&self) -> QueryResult<()> {
        match self {
            ConstraintItem::Constraint(c) => c.validate(),
            ConstraintItem::Combinator(c) => c.validate(),
        }
    }
}

/// Logical grouping of constraint sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "combinator", content = "branches", rename_all = "snake_case")]
pub enum Combinator {
    And(Vec<ConstraintSet>),
    Or(Vec<ConstraintSet>),
}

impl Combinator {
    /// Creates an AND combinator; every branch must be a non-empty valid set
    pub fn and(branches: Vec<ConstraintSet>) -> QueryResult<Self> {
        let combinator = Combinator::And(branches);
        combinator.validate()?;
        Ok(combinator)
    }

    /// Creates an OR combinator; every branch must be a non-empty valid set
    pub fn or(branches: Vec<ConstraintSet>) -> QueryResult<Self> {
        let combinator = Combinator::Or(branches);
        combinator.validate()?;
        Ok(combinator)
    }

    pub fn branches(&self) -> &[ConstraintSet] {
        match self {
            Combinator::And(b) | Combinator::Or(b) => b,
        }
    }

    pub fn is_or(&self) -> bool {
        matches!(self, Combinator::Or(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Combinator::And(_) => "and",
            Combinator::Or(_) => "or",
        }
    }

    fn validate(&self) -> QueryResult<()> {
        let branches = self.branches();
        if branches.is_empty() {
            return Err(QueryError::invalid_constraint(format!(
                "{} combinator requires at least one branch",
                self.name()
            )));
        }
        for (i, branch) in branches.iter().enumerate() {
            if branch.is_empty() {
                return Err(QueryError::invalid_constraint(format!(
                    "{} combinator branch {} is empty",
                    self.name(),
                    i
                )));
            }
            branch.validate()?;
        }
        Ok(())
    }
}

/// Ordered collection of constraints and combinators (implicit AND)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintSet {
    items: Vec<ConstraintItem>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ConstraintItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates the bare constraints at this level that apply to `key`
    pub fn constraints_on<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Constraint> {
        self.items.iter().filter_map(move |item| match item {
            ConstraintItem::Constraint(c) if c.key() == key => Some(c),
            _ => None,
        })
    }

    /// Recursively validates every item
    pub fn validate(&self) -> QueryResult<()> {
        self.items.iter().try_for_each(ConstraintItem::validate)
    }
}

impl ConstraintBuilder for ConstraintSet {
    fn constraint_set_mut(&mut self) -> &mut ConstraintSet {
        self
    }
}

/// Builder operations shared by `ConstraintSet` and `QuerySpec`.
///
/// Each `where_*` call validates and appends exactly one constraint. Several
/// constraints on the same key accumulate and are all enforced.
pub trait ConstraintBuilder {
    /// The set new constraints are appended to
    fn constraint_set_mut(&mut self) -> &mut ConstraintSet;

    /// Validates and appends a constraint
    fn add_constraint(&mut self, constraint: Constraint) -> QueryResult<&mut Self> {
        constraint.validate()?;
        self.constraint_set_mut()
            .items
            .push(ConstraintItem::Constraint(constraint));
        Ok(self)
    }

    /// Appends a combinator built from the given branches
    fn add_combinator(&mut self, combinator: Combinator) -> QueryResult<&mut Self> {
        combinator.validate()?;
        self.constraint_set_mut()
            .items
            .push(ConstraintItem::Combinator(combinator));
        Ok(self)
    }

    /// Adds `And(branches)` alongside the existing constraints
    fn and_combine(&mut self, branches: Vec<ConstraintSet>) -> QueryResult<&mut Self> {
        self.add_combinator(Combinator::And(branches))
    }

    /// Adds `Or(branches)` alongside the existing constraints
    fn or_combine(&mut self, branches: Vec<ConstraintSet>) -> QueryResult<&mut Self> {
        self.add_combinator(Combinator::Or(branches))
    }

    fn where_equal_to(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::Equal {
            key: key.into(),
            value: value.into(),
        })
    }

    fn where_not_equal_to(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::NotEqual {
            key: key.into(),
            value: value.into(),
        })
    }

    fn where_greater_than(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::GreaterThan {
            key: key.into(),
            value: value.into(),
        })
    }

    fn where_greater_than_or_equal_to(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::GreaterOrEqual {
            key: key.into(),
            value: value.into(),
        })
    }

    fn where_less_than(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::LessThan {
            key: key.into(),
            value: value.into(),
        })
    }

    fn where_less_than_or_equal_to(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::LessOrEqual {
            key: key.into(),
            value: value.into(),
        })
    }

    fn where_contained_in<I, V>(
        &mut self,
        key: impl Into<String>,
        values: I,
    ) -> QueryResult<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.add_constraint(Constraint::In {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    fn where_not_contained_in<I, V>(
        &mut self,
        key: impl Into<String>,
        values: I,
    ) -> QueryResult<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.add_constraint(Constraint::NotIn {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    fn where_key_exists(&mut self, key: impl Into<String>) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::Exists { key: key.into() })
    }

    fn where_key_does_not_exist(&mut self, key: impl Into<String>) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::NotExists { key: key.into() })
    }

    /// Snapshots `query`; later changes to it do not affect this constraint
    fn where_matches_query(
        &mut self,
        key: impl Into<String>,
        query: &QuerySpec,
    ) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::MatchesSubquery {
            key: key.into(),
            query: Box::new(query.clone()),
        })
    }

    /// Snapshots `query`; later changes to it do not affect this constraint
    fn where_does_not_match_query(
        &mut self,
        key: impl Into<String>,
        query: &QuerySpec,
    ) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::DoesNotMatchSubquery {
            key: key.into(),
            query: Box::new(query.clone()),
        })
    }

    fn where_related_to(
        &mut self,
        key: impl Into<String>,
        object: ObjectRef,
    ) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::RelatedTo {
            key: key.into(),
            object,
        })
    }

    fn where_near_geo_point(
        &mut self,
        key: impl Into<String>,
        point: GeoPoint,
    ) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::NearGeoPoint {
            key: key.into(),
            point,
            max_distance: None,
            unit: DistanceUnit::default(),
        })
    }

    fn where_near_geo_point_within(
        &mut self,
        key: impl Into<String>,
        point: GeoPoint,
        max_distance: f64,
        unit: DistanceUnit,
    ) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::NearGeoPoint {
            key: key.into(),
            point,
            max_distance: Some(max_distance),
            unit,
        })
    }

    fn where_near_geo_point_within_miles(
        &mut self,
        key: impl Into<String>,
        point: GeoPoint,
        max_distance: f64,
    ) -> QueryResult<&mut Self> {
        self.where_near_geo_point_within(key, point, max_distance, DistanceUnit::Miles)
    }

    fn where_near_geo_point_within_kilometers(
        &mut self,
        key: impl Into<String>,
        point: GeoPoint,
        max_distance: f64,
    ) -> QueryResult<&mut Self> {
        self.where_near_geo_point_within(key, point, max_distance, DistanceUnit::Kilometers)
    }

    fn where_near_geo_point_within_radians(
        &mut self,
        key: impl Into<String>,
        point: GeoPoint,
        max_distance: f64,
    ) -> QueryResult<&mut Self> {
        self.where_near_geo_point_within(key, point, max_distance, DistanceUnit::Radians)
    }

    fn where_within_geo_box(
        &mut self,
        key: impl Into<String>,
        southwest: GeoPoint,
        northeast: GeoPoint,
    ) -> QueryResult<&mut Self> {
        self.add_constraint(Constraint::WithinGeoBox {
            key: key.into(),
            southwest,
            northeast,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_with(key: &str, value: i64) -> ConstraintSet {
        let mut set = ConstraintSet::new();
        set.where_equal_to(key, value).unwrap();
        set
    }

    #[test]
    fn test_same_key_accumulates() {
        let mut set = ConstraintSet::new();
        set.where_greater_than("age", 18)
            .unwrap()
            .where_less_than("age", 30)
            .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.constraints_on("age").count(), 2);
    }

    #[test]
    fn test_empty_key_does_not_mutate_set() {
        let mut set = ConstraintSet::new();
        assert!(set.where_equal_to("", 1).is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn test_combinator_requires_branches() {
        assert!(Combinator::or(Vec::new()).is_err());
        assert!(Combinator::and(vec![ConstraintSet::new()]).is_err());
        assert!(Combinator::or(vec![set_with("a", 1), set_with("b", 2)]).is_ok());
    }

    #[test]
    fn test_nested_combinators() {
        let inner = {
            let mut s = ConstraintSet::new();
            s.or_combine(vec![set_with("a", 1), set_with("b", 2)]).unwrap();
            s
        };
        let mut root = ConstraintSet::new();
        root.and_combine(vec![inner, set_with("c", 3)]).unwrap();

        match &root.items()[0] {
            ConstraintItem::Combinator(c) => {
                assert!(!c.is_or());
                assert_eq!(c.branches().len(), 2);
            }
            other => panic!("expected combinator, got {:?}", other),
        }
    }

    #[test]
    fn test_subquery_is_a_snapshot() {
        let mut inner = QuerySpec::new("Author").unwrap();
        inner.where_equal_to("verified", true).unwrap();

        let mut set = ConstraintSet::new();
        set.where_matches_query("author", &inner).unwrap();

        inner.where_equal_to("banned", false).unwrap();

        match &set.items()[0] {
            ConstraintItem::Constraint(Constraint::MatchesSubquery { query, .. }) => {
                assert_eq!(query.constraints().len(), 1);
            }
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_serde_round_trip_keeps_structure() {
        let mut root = ConstraintSet::new();
        root.where_key_exists("title")
            .unwrap()
            .or_combine(vec![set_with("a", 1), set_with("b", 2)])
            .unwrap();

        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(json[1]["combinator"], "or");

        let back: ConstraintSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, root);
    }
}
