//! Read-modify-write updates of aggregate counters.
//!
//! The remote store offers no transactions, so each increment reads the
//! owning document, adds the deltas and writes the merged `metrics` map back.
//! [`ConcurrencyMode::Optimistic`] guards the write with the revision that
//! was read and retries on conflict; [`ConcurrencyMode::Unguarded`] performs
//! the bare read-modify-write and loses one of two interleaved updates.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::port_error_mapping::map_store_error;
use super::ports::{RemoteStore, RemoteStoreError};
use super::{
    Document, Error, METRICS_FIELD, MetricDeltas, MetricKey, MetricsEntity, MetricsSnapshot,
    WriteOptions,
};

/// Retry budget used when none is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Concurrency strategy for counter writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyMode {
    /// Write without a precondition. Concurrent increments may be lost.
    Unguarded,
    /// Write with the revision that was read; re-read and retry on mismatch.
    Optimistic {
        /// Total attempts before giving up with `conflict`.
        max_attempts: u32,
    },
}

impl Default for ConcurrencyMode {
    fn default() -> Self {
        Self::Optimistic {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unguarded => f.write_str("unguarded"),
            Self::Optimistic { .. } => f.write_str("optimistic"),
        }
    }
}

/// Error returned when parsing an unknown concurrency mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseConcurrencyModeError {
    /// The unrecognised input value.
    pub input: String,
}

impl fmt::Display for ParseConcurrencyModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown concurrency mode '{}': expected 'unguarded' or 'optimistic'",
            self.input
        )
    }
}

impl std::error::Error for ParseConcurrencyModeError {}

impl FromStr for ConcurrencyMode {
    type Err = ParseConcurrencyModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unguarded" => Ok(Self::Unguarded),
            "optimistic" => Ok(Self::default()),
            _ => Err(ParseConcurrencyModeError {
                input: s.to_owned(),
            }),
        }
    }
}

/// Applies counter deltas to student and vendor documents.
#[derive(Clone)]
pub struct MetricsAggregator<S> {
    store: Arc<S>,
    mode: ConcurrencyMode,
}

impl<S> MetricsAggregator<S> {
    /// Create an aggregator using `mode` for every write.
    pub fn new(store: Arc<S>, mode: ConcurrencyMode) -> Self {
        Self { store, mode }
    }

    /// Strategy in use.
    pub fn mode(&self) -> ConcurrencyMode {
        self.mode
    }
}

impl<S> MetricsAggregator<S>
where
    S: RemoteStore,
{
    /// Add `deltas` to the entity's counters and return the values written.
    ///
    /// Missing counters start from zero. A missing document fails with
    /// `entity_not_found` and writes nothing.
    pub async fn increment_metrics(
        &self,
        entity: &MetricsEntity,
        deltas: &MetricDeltas,
    ) -> Result<MetricsSnapshot, Error> {
        let max_attempts = match self.mode {
            ConcurrencyMode::Unguarded => 1,
            ConcurrencyMode::Optimistic { max_attempts } => max_attempts.max(1),
        };

        for attempt in 1..=max_attempts {
            let document = self.load(entity).await?;
            let snapshot = apply_deltas(entity, &document, deltas)?;
            let options = match self.mode {
                ConcurrencyMode::Unguarded => WriteOptions::merge(),
                ConcurrencyMode::Optimistic { .. } => {
                    WriteOptions::merge().with_expected_revision(document.revision)
                }
            };

            match self
                .store
                .set_document(&document.path, metrics_payload(&snapshot), options)
                .await
            {
                Ok(_) => return Ok(snapshot),
                Err(RemoteStoreError::RevisionMismatch { expected, actual }) => {
                    debug!(
                        entity = %entity,
                        attempt,
                        expected,
                        actual,
                        "metrics write lost a revision race; retrying"
                    );
                }
                Err(err) => return Err(map_store_error(err)),
            }
        }

        warn!(entity = %entity, attempts = max_attempts, "metrics retries exhausted");
        Err(
            Error::conflict(format!("could not update metrics for {entity}")).with_details(
                json!({
                    "path": entity.path().as_str(),
                    "attempts": max_attempts,
                }),
            ),
        )
    }

    async fn load(&self, entity: &MetricsEntity) -> Result<Document, Error> {
        let path = entity.path();
        self.store
            .get_document(&path)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("{entity} has no document at {path}")))
    }
}

/// Current counters of `document` plus `deltas`.
fn apply_deltas(
    entity: &MetricsEntity,
    document: &Document,
    deltas: &MetricDeltas,
) -> Result<MetricsSnapshot, Error> {
    let mut snapshot = MetricsSnapshot::default();
    let keys = entity
        .keys()
        .iter()
        .copied()
        .chain(deltas.iter().map(|(key, _)| key));
    for key in keys {
        let current = read_counter(document, key)?;
        snapshot.set(key, current.saturating_add(deltas.get(key)));
    }
    Ok(snapshot)
}

pub(crate) fn read_counter(document: &Document, key: MetricKey) -> Result<i64, Error> {
    document
        .nested_integer(METRICS_FIELD, key.as_str())
        .map(Option::unwrap_or_default)
        .map_err(|value| {
            Error::internal(format!(
                "counter {key} on {} is not an integer",
                document.path
            ))
            .with_details(json!({ "value": value }))
        })
}

pub(crate) fn metrics_payload(snapshot: &MetricsSnapshot) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert(METRICS_FIELD.to_owned(), snapshot.to_value());
    data
}

#[cfg(test)]
mod tests;
