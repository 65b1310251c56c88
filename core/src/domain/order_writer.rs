//! Reservation write path.
//!
//! A reservation touches three documents that the store cannot update
//! atomically: the new order, the student's counters and the vendor's
//! counters. The writer runs them as a saga:
//!
//! 1. create `orders/{id}` in `pending`; failure aborts the reservation;
//! 2. add the student's deltas;
//! 3. add the vendor's deltas.
//!
//! Steps 2 and 3 run independently. A failed counter step is compensated by
//! recomputing that entity from the order log. If compensation also fails,
//! [`AggregateFailurePolicy`] decides whether the caller sees a
//! `partial_write` error or the order.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use tracing::{error, info, warn};

use super::port_error_mapping::{map_decode_error, map_store_error};
use super::ports::RemoteStore;
use super::{
    CollectionPath, Error, MetricDeltas, MetricKey, MetricsAggregator, MetricsEntity,
    MetricsReconciler, Order, OrderId, ReservationRequest, WriteOptions, profile,
};

/// What to do when a counter step fails and cannot be healed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregateFailurePolicy {
    /// Return `partial_write` naming the failed steps. The order stays.
    #[default]
    Surface,
    /// Log at error level and return the order.
    BestEffort,
}

impl fmt::Display for AggregateFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Surface => f.write_str("surface"),
            Self::BestEffort => f.write_str("best_effort"),
        }
    }
}

/// Error returned when parsing an unknown failure policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAggregateFailurePolicyError {
    /// The unrecognised input value.
    pub input: String,
}

impl fmt::Display for ParseAggregateFailurePolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown aggregate failure policy '{}': expected 'surface' or 'best_effort'",
            self.input
        )
    }
}

impl std::error::Error for ParseAggregateFailurePolicyError {}

impl FromStr for AggregateFailurePolicy {
    type Err = ParseAggregateFailurePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "surface" => Ok(Self::Surface),
            "best_effort" => Ok(Self::BestEffort),
            _ => Err(ParseAggregateFailurePolicyError {
                input: s.to_owned(),
            }),
        }
    }
}

/// Saga step names reported in `partial_write` details.
mod step {
    pub const CREATE_ORDER: &str = "createOrder";
    pub const STUDENT_METRICS: &str = "studentMetrics";
    pub const VENDOR_METRICS: &str = "vendorMetrics";
}

/// Places reservations and keeps counters in step with the order log.
pub struct OrderWriter<S> {
    store: Arc<S>,
    aggregator: MetricsAggregator<S>,
    reconciler: MetricsReconciler<S>,
    clock: Arc<dyn Clock>,
    policy: AggregateFailurePolicy,
}

impl<S> OrderWriter<S> {
    /// Create a writer.
    pub fn new(
        store: Arc<S>,
        aggregator: MetricsAggregator<S>,
        clock: Arc<dyn Clock>,
        policy: AggregateFailurePolicy,
    ) -> Self {
        let reconciler = MetricsReconciler::new(Arc::clone(&store));
        Self {
            store,
            aggregator,
            reconciler,
            clock,
            policy,
        }
    }
}

impl<S> OrderWriter<S>
where
    S: RemoteStore,
{
    /// Reserve an item and update both parties' counters.
    pub async fn reserve(&self, request: ReservationRequest) -> Result<Order, Error> {
        let student = MetricsEntity::Student(request.student_id().clone());
        let vendor = MetricsEntity::Vendor(request.vendor_id().clone());
        let price = request.discount_price().cents();
        let servings = i64::from(request.servings());

        let order = self.create_order(request).await?;

        let student_deltas = MetricDeltas::new()
            .with(MetricKey::MoneySaved, price)
            .with(MetricKey::MealsRescued, servings);
        let vendor_deltas = MetricDeltas::new()
            .with(MetricKey::TotalRevenue, price)
            .with(MetricKey::MealsShared, servings)
            .with(MetricKey::OrdersCompleted, 1);

        let mut completed = vec![step::CREATE_ORDER];
        let mut failed = Vec::new();
        for (name, entity, deltas) in [
            (step::STUDENT_METRICS, &student, &student_deltas),
            (step::VENDOR_METRICS, &vendor, &vendor_deltas),
        ] {
            if self.apply_step(&order, entity, deltas).await {
                completed.push(name);
            } else {
                failed.push(name);
            }
        }

        if failed.is_empty() {
            return Ok(order);
        }

        match self.policy {
            AggregateFailurePolicy::Surface => Err(Error::partial_write(format!(
                "order {} was created but some counters could not be updated",
                order.id
            ))
            .with_details(json!({
                "orderId": order.id,
                "completedSteps": completed,
                "failedSteps": failed,
            }))),
            AggregateFailurePolicy::BestEffort => {
                error!(
                    order_id = %order.id,
                    failed_steps = ?failed,
                    "counter update failed and could not be healed; continuing"
                );
                Ok(order)
            }
        }
    }

    async fn create_order(&self, request: ReservationRequest) -> Result<Order, Error> {
        let order = request.into_order(OrderId::random(), self.clock.utc());
        let path = CollectionPath::orders().document(order.id);
        let data = profile::encode(&order).map_err(|err| map_decode_error(&path, err))?;
        self.store
            .set_document(&path, data, WriteOptions::overwrite().with_expected_revision(0))
            .await
            .map_err(map_store_error)?;
        info!(
            order_id = %order.id,
            student_id = %order.student_id,
            vendor_id = %order.vendor_id,
            "order created"
        );
        Ok(order)
    }

    /// Apply one counter step, healing from the order log on failure.
    async fn apply_step(&self, order: &Order, entity: &MetricsEntity, deltas: &MetricDeltas) -> bool {
        let Err(err) = self.aggregator.increment_metrics(entity, deltas).await else {
            return true;
        };
        warn!(
            order_id = %order.id,
            entity = %entity,
            code = %err.code(),
            error = %err,
            "counter update failed; recomputing from order log"
        );
        match self.reconciler.recompute(entity).await {
            Ok(_) => true,
            Err(heal_err) => {
                warn!(
                    order_id = %order.id,
                    entity = %entity,
                    error = %heal_err,
                    "counter recompute failed"
                );
                false
            }
        }
    }
}
