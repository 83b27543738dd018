//! Complete query description
//!
//! A `QuerySpec` is created by application code, mutated only before it is
//! handed to an executor, and snapshotted (cloned) at execution time.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, CachePolicy, CacheStore, RequestKind};

use super::constraint::validate_key;
use super::constraint_set::{ConstraintBuilder, ConstraintSet};
use super::errors::{QueryError, QueryResult};
use super::fingerprint::Fingerprint;
use super::serialize::SerializedQuery;

/// Reserved collection holding user accounts
pub const USER_COLLECTION: &str = "_User";

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// One ordering key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Wire form: `field` or `-field`
    pub fn to_wire(&self) -> String {
        match self.direction {
            SortDirection::Asc => self.field.clone(),
            SortDirection::Desc => format!("-{}", self.field),
        }
    }
}

/// Query against one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    collection: String,
    #[serde(default, rename = "where")]
    constraints: ConstraintSet,
    #[serde(default)]
    order: Vec<SortSpec>,
    /// 0 means "collaborator default"
    #[serde(default)]
    limit: u64,
    #[serde(default)]
    skip: u64,
    #[serde(default)]
    include: BTreeSet<String>,
    #[serde(default)]
    keys: BTreeSet<String>,
    #[serde(default)]
    cache_policy: CachePolicy,
    #[serde(
        default,
        rename = "max_cache_age_secs",
        with = "duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    max_cache_age: Option<Duration>,
}

impl QuerySpec {
    /// Creates an empty query against `collection`
    pub fn new(collection: impl Into<String>) -> QueryResult<Self> {
        let collection = collection.into();
        validate_collection(&collection)?;
        Ok(Self {
            collection,
            constraints: ConstraintSet::new(),
            order: Vec::new(),
            limit: 0,
            skip: 0,
            include: BTreeSet::new(),
            keys: BTreeSet::new(),
            cache_policy: CachePolicy::default(),
            max_cache_age: None,
        })
    }

    /// Creates a query against the user collection
    pub fn for_users() -> Self {
        Self {
            collection: USER_COLLECTION.to_string(),
            constraints: ConstraintSet::new(),
            order: Vec::new(),
            limit: 0,
            skip: 0,
            include: BTreeSet::new(),
            keys: BTreeSet::new(),
            cache_policy: CachePolicy::default(),
            max_cache_age: None,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn order(&self) -> &[SortSpec] {
        &self.order
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    /// Reference fields to expand in returned records
    pub fn included_keys(&self) -> &BTreeSet<String> {
        &self.include
    }

    /// Fields to return (empty means all)
    pub fn selected_keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    pub fn max_cache_age(&self) -> Option<Duration> {
        self.max_cache_age
    }

    /// Max age used for freshness checks: this query's own, else `default`
    pub fn effective_max_cache_age(&self, default: Option<Duration>) -> Option<Duration> {
        self.max_cache_age.or(default)
    }

    // Ordering

    /// Appends an ascending key; an existing key keeps its position and
    /// takes the new direction.
    pub fn order_by_ascending(&mut self, field: impl Into<String>) -> QueryResult<&mut Self> {
        self.set_order(field.into(), SortDirection::Asc)
    }

    /// Appends a descending key; an existing key keeps its position and
    /// takes the new direction.
    pub fn order_by_descending(&mut self, field: impl Into<String>) -> QueryResult<&mut Self> {
        self.set_order(field.into(), SortDirection::Desc)
    }

    fn set_order(&mut self, field: String, direction: SortDirection) -> QueryResult<&mut Self> {
        validate_key(&field)?;
        match self.order.iter_mut().find(|s| s.field == field) {
            Some(existing) => existing.direction = direction,
            None => self.order.push(SortSpec { field, direction }),
        }
        Ok(self)
    }

    // Pagination

    /// Sets the maximum number of records; 0 restores the default
    pub fn set_limit(&mut self, limit: i64) -> QueryResult<&mut Self> {
        self.limit = u64::try_from(limit).map_err(|_| QueryError::invalid_range("limit", limit))?;
        Ok(self)
    }

    /// Sets the number of records to skip
    pub fn set_skip(&mut self, skip: i64) -> QueryResult<&mut Self> {
        self.skip = u64::try_from(skip).map_err(|_| QueryError::invalid_range("skip", skip))?;
        Ok(self)
    }

    // Projection

    /// Expands a reference field; repeated keys are idempotent
    pub fn include_key(&mut self, key: impl Into<String>) -> QueryResult<&mut Self> {
        let key = key.into();
        validate_key(&key)?;
        self.include.insert(key);
        Ok(self)
    }

    /// Restricts returned fields; accumulates across calls
    pub fn select_keys<I, K>(&mut self, keys: I) -> QueryResult<&mut Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.iter().try_for_each(|k| validate_key(k))?;
        self.keys.extend(keys);
        Ok(self)
    }

    // Cache policy

    /// Sets the cache policy and, for age-checked policies, the max age.
    ///
    /// `None` means cached entries never go stale.
    pub fn set_cache_policy(
        &mut self,
        policy: CachePolicy,
        max_age: Option<Duration>,
    ) -> &mut Self {
        self.cache_policy = policy;
        self.max_cache_age = max_age;
        self
    }

    /// Re-checks every invariant; used for specs that were deserialized
    pub fn validate(&self) -> QueryResult<()> {
        validate_collection(&self.collection)?;
        self.constraints.validate()?;
        for sort in &self.order {
            validate_key(&sort.field)?;
        }
        self.include.iter().try_for_each(|k| validate_key(k))?;
        self.keys.iter().try_for_each(|k| validate_key(k))?;
        Ok(())
    }

    // Serialization

    /// Deterministic digest of the query shape
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }

    /// Wire query for list requests
    pub fn to_serialized(&self) -> SerializedQuery {
        SerializedQuery::from_spec(self)
    }

    /// Wire query for count requests
    pub fn to_count_query(&self) -> SerializedQuery {
        SerializedQuery::count_of(self)
    }

    // Cache maintenance

    /// Reports whether `store` holds a non-stale list result for this query.
    ///
    /// `default_max_age` applies when the query sets no max age, matching the
    /// executor's `ExecutorConfig::default_max_cache_age`. Has no side effects
    /// on the store.
    pub fn has_cached_result(
        &self,
        store: &CacheStore,
        default_max_age: Option<Duration>,
    ) -> bool {
        self.has_cached_result_for(store, RequestKind::List, default_max_age)
    }

    /// Same as `has_cached_result` for an explicit request kind
    pub fn has_cached_result_for(
        &self,
        store: &CacheStore,
        kind: RequestKind,
        default_max_age: Option<Duration>,
    ) -> bool {
        let key = CacheKey::new(self.fingerprint(), kind);
        store.contains_fresh(&key, self.effective_max_cache_age(default_max_age))
    }

    /// Removes every cached result held for this query
    pub fn clear_cached_result(&self, store: &CacheStore) -> usize {
        store.remove_fingerprint(&self.fingerprint())
    }

    /// Empties `store`
    pub fn clear_all_cached_results(store: &CacheStore) -> usize {
        store.clear()
    }
}

impl ConstraintBuilder for QuerySpec {
    fn constraint_set_mut(&mut self) -> &mut ConstraintSet {
        &mut self.constraints
    }
}

fn validate_collection(collection: &str) -> QueryResult<()> {
    if collection.trim().is_empty() {
        return Err(QueryError::invalid_collection_name(collection));
    }
    Ok(())
}

/// Serde helper storing an optional duration as fractional seconds
mod duration_secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        value.map(|d| d.as_secs_f64()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        match Option::<f64>::deserialize(d)? {
            None => Ok(None),
            Some(secs) if secs.is_finite() && secs >= 0.0 => {
                Ok(Some(Duration::from_secs_f64(secs)))
            }
            Some(secs) => Err(D::Error::custom(format!(
                "max_cache_age_secs must be a non-negative number, got {}",
                secs
            ))),
        }
    }
}
