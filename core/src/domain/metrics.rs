//! Aggregate counters maintained alongside the order log.
//!
//! Students accumulate `moneySaved` and `mealsRescued`; vendors accumulate
//! `totalRevenue`, `mealsShared` and `ordersCompleted`. Counters live under the
//! `metrics` map of the owning document and are derived data: the order log
//! is the source of truth (see [`crate::domain::MetricsReconciler`]).

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use super::{DocumentPath, IdentityId, Money};

/// Name of the map holding counters inside profile documents.
pub const METRICS_FIELD: &str = "metrics";

/// A single aggregate counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKey {
    /// Student: cumulative discounted spend, in cents.
    MoneySaved,
    /// Student: servings reserved.
    MealsRescued,
    /// Vendor: cumulative discounted revenue, in cents.
    TotalRevenue,
    /// Vendor: servings handed out.
    MealsShared,
    /// Vendor: orders placed against the vendor.
    OrdersCompleted,
}

impl MetricKey {
    /// Counters seeded on student profiles.
    pub const STUDENT: [Self; 2] = [Self::MoneySaved, Self::MealsRescued];
    /// Counters seeded on vendor records.
    pub const VENDOR: [Self; 3] = [Self::TotalRevenue, Self::MealsShared, Self::OrdersCompleted];

    /// Field name inside the `metrics` map.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MoneySaved => "moneySaved",
            Self::MealsRescued => "mealsRescued",
            Self::TotalRevenue => "totalRevenue",
            Self::MealsShared => "mealsShared",
            Self::OrdersCompleted => "ordersCompleted",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-key increments applied by the aggregator.
///
/// Negative deltas are accepted and not clamped.
///
/// # Examples
/// ```
/// use savorly_core::domain::{MetricDeltas, MetricKey};
///
/// let deltas = MetricDeltas::new()
///     .with(MetricKey::MoneySaved, 5)
///     .with(MetricKey::MoneySaved, 3);
/// assert_eq!(deltas.get(MetricKey::MoneySaved), 8);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricDeltas(BTreeMap<MetricKey, i64>);

impl MetricDeltas {
    /// Empty delta set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to `key`, accumulating with any earlier delta for the key.
    #[must_use]
    pub fn with(mut self, key: MetricKey, delta: i64) -> Self {
        let entry = self.0.entry(key).or_insert(0);
        *entry = entry.saturating_add(delta);
        self
    }

    /// Delta recorded for `key`, zero when absent.
    pub fn get(&self, key: MetricKey) -> i64 {
        self.0.get(&key).copied().unwrap_or(0)
    }

    /// Iterate over keys and deltas in key order.
    pub fn iter(&self) -> impl Iterator<Item = (MetricKey, i64)> + '_ {
        self.0.iter().map(|(key, delta)| (*key, *delta))
    }

    /// Whether no key has a delta.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Entity whose counters are updated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetricsEntity {
    /// Counters on `users/{id}`.
    Student(IdentityId),
    /// Counters on `vendors/{id}`.
    Vendor(IdentityId),
}

impl MetricsEntity {
    /// Document holding the entity's counters.
    pub fn path(&self) -> DocumentPath {
        match self {
            Self::Student(id) => DocumentPath::user(id),
            Self::Vendor(id) => DocumentPath::vendor(id),
        }
    }

    /// Identity the entity belongs to.
    pub fn identity_id(&self) -> &IdentityId {
        match self {
            Self::Student(id) | Self::Vendor(id) => id,
        }
    }

    /// Counters maintained for this kind of entity.
    pub fn keys(&self) -> &'static [MetricKey] {
        match self {
            Self::Student(_) => &MetricKey::STUDENT,
            Self::Vendor(_) => &MetricKey::VENDOR,
        }
    }

    /// Order field referencing this entity, used to query the order log.
    pub const fn order_field(&self) -> &'static str {
        match self {
            Self::Student(_) => "studentId",
            Self::Vendor(_) => "vendorId",
        }
    }

    /// Short label for logs and error details.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Student(_) => "student",
            Self::Vendor(_) => "vendor",
        }
    }
}

impl fmt::Display for MetricsEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.identity_id())
    }
}

/// Counter values as last read or written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot(BTreeMap<MetricKey, i64>);

impl MetricsSnapshot {
    /// Snapshot with every key of `keys` set to zero.
    pub fn zeroed(keys: &[MetricKey]) -> Self {
        Self(keys.iter().map(|key| (*key, 0)).collect())
    }

    /// Set a counter value.
    pub fn set(&mut self, key: MetricKey, value: i64) {
        self.0.insert(key, value);
    }

    /// Counter value, zero when absent.
    pub fn get(&self, key: MetricKey) -> i64 {
        self.0.get(&key).copied().unwrap_or(0)
    }

    /// Counter value interpreted as cents.
    pub fn money(&self, key: MetricKey) -> Money {
        Money::from_cents(self.get(key))
    }

    /// Render as the `metrics` map stored in documents.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(key, value)| (key.as_str().to_owned(), Value::from(*value)))
            .collect();
        Value::Object(map)
    }
}
