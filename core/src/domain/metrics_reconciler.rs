//! Recompute aggregate counters from the order log.
//!
//! Counters are derived data. Recomputing them sums every order that
//! references the entity, regardless of status, which mirrors the increment
//! path (reservations add; nothing subtracts). The result is written as
//! absolute values, so running the reconciler twice is harmless.

use std::sync::Arc;

use tracing::{debug, warn};

use super::metrics_aggregator::metrics_payload;
use super::port_error_mapping::map_store_error;
use super::ports::{RemoteStore, RemoteStoreError};
use super::{
    CollectionPath, Error, Filter, MetricKey, MetricsEntity, MetricsSnapshot, Order, WriteOptions,
    profile,
};

const RECOMPUTE_ATTEMPTS: u32 = 3;

/// Rebuilds counters from `orders`.
#[derive(Clone)]
pub struct MetricsReconciler<S> {
    store: Arc<S>,
}

impl<S> MetricsReconciler<S> {
    /// Create a reconciler over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> MetricsReconciler<S>
where
    S: RemoteStore,
{
    /// Recompute and store the entity's counters.
    ///
    /// Fails with `entity_not_found` when the entity document is missing,
    /// and with `conflict` when concurrent writers keep moving the document.
    pub async fn recompute(&self, entity: &MetricsEntity) -> Result<MetricsSnapshot, Error> {
        let path = entity.path();
        for attempt in 1..=RECOMPUTE_ATTEMPTS {
            let document = self
                .store
                .get_document(&path)
                .await
                .map_err(map_store_error)?
                .ok_or_else(|| Error::not_found(format!("{entity} has no document at {path}")))?;

            let snapshot = self.totals(entity).await?;
            let options = WriteOptions::merge().with_expected_revision(document.revision);
            match self
                .store
                .set_document(&path, metrics_payload(&snapshot), options)
                .await
            {
                Ok(_) => {
                    debug!(entity = %entity, "metrics recomputed from order log");
                    return Ok(snapshot);
                }
                Err(RemoteStoreError::RevisionMismatch { .. }) => {
                    debug!(entity = %entity, attempt, "document moved during recompute; retrying");
                }
                Err(err) => return Err(map_store_error(err)),
            }
        }
        Err(Error::conflict(format!(
            "could not recompute metrics for {entity}"
        )))
    }

    async fn totals(&self, entity: &MetricsEntity) -> Result<MetricsSnapshot, Error> {
        let filters = [Filter::eq(
            entity.order_field(),
            entity.identity_id().as_ref(),
        )];
        let documents = self
            .store
            .query_documents(&CollectionPath::orders(), &filters, None)
            .await
            .map_err(map_store_error)?;

        let mut revenue: i64 = 0;
        let mut servings: i64 = 0;
        let mut count: i64 = 0;
        for document in &documents {
            let order: Order = match profile::decode(document) {
                Ok(order) => order,
                Err(err) => {
                    warn!(path = %document.path, error = %err, "skipping malformed order");
                    continue;
                }
            };
            revenue = revenue.saturating_add(order.item_price.cents());
            servings = servings.saturating_add(i64::from(order.servings));
            count = count.saturating_add(1);
        }

        let mut snapshot = MetricsSnapshot::zeroed(entity.keys());
        match entity {
            MetricsEntity::Student(_) => {
                snapshot.set(MetricKey::MoneySaved, revenue);
                snapshot.set(MetricKey::MealsRescued, servings);
            }
            MetricsEntity::Vendor(_) => {
                snapshot.set(MetricKey::TotalRevenue, revenue);
                snapshot.set(MetricKey::MealsShared, servings);
                snapshot.set(MetricKey::OrdersCompleted, count);
            }
        }
        Ok(snapshot)
    }
}
