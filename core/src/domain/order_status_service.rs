//! Order fulfilment and order history.
//!
//! Vendors drive their orders through `pending → ready → completed` (or
//! cancel them); students may cancel their own active orders. Status changes
//! are guarded by the document revision that was read, so two concurrent
//! transitions cannot both succeed. Counters are not touched here.

use std::sync::Arc;

use mockable::Clock;
use serde_json::{Map, json};
use tracing::info;

use super::port_error_mapping::{map_decode_error, map_store_error};
use super::ports::RemoteStore;
use super::{
    CollectionPath, Error, Filter, Order, OrderBy, OrderId, OrderStatus, Role, SessionContext,
    WriteOptions, profile,
};

/// Vendor and student operations on existing orders.
pub struct OrderStatusService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> OrderStatusService<S> {
    /// Create the service.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

impl<S> OrderStatusService<S>
where
    S: RemoteStore,
{
    /// Move one of the vendor's orders to `target`.
    ///
    /// Only the owning vendor may transition an order, and only along the
    /// status machine. Terminal orders reject every change with
    /// `invalid_transition`.
    pub async fn advance(
        &self,
        session: &SessionContext,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<Order, Error> {
        session.require_role(Role::Vendor)?;
        let (order, revision) = self.load(order_id).await?;
        if &order.vendor_id != session.identity_id() {
            return Err(Error::forbidden(format!(
                "order {order_id} belongs to another vendor"
            )));
        }
        self.transition(order, revision, target).await
    }

    /// Cancel one of the student's active orders.
    pub async fn cancel(&self, session: &SessionContext, order_id: OrderId) -> Result<Order, Error> {
        session.require_role(Role::Student)?;
        let (order, revision) = self.load(order_id).await?;
        if &order.student_id != session.identity_id() {
            return Err(Error::forbidden(format!(
                "order {order_id} belongs to another student"
            )));
        }
        self.transition(order, revision, OrderStatus::Cancelled).await
    }

    /// Pending and ready orders of the session's identity, newest first.
    pub async fn current_orders(&self, session: &SessionContext) -> Result<Vec<Order>, Error> {
        let mut orders = self.orders_for(session).await?;
        orders.retain(|order| order.status.is_active());
        Ok(orders)
    }

    /// Completed and cancelled orders of the session's identity, newest first.
    pub async fn past_orders(&self, session: &SessionContext) -> Result<Vec<Order>, Error> {
        let mut orders = self.orders_for(session).await?;
        orders.retain(|order| order.status.is_terminal());
        Ok(orders)
    }

    async fn orders_for(&self, session: &SessionContext) -> Result<Vec<Order>, Error> {
        let field = match session.role() {
            Role::Student => "studentId",
            Role::Vendor => "vendorId",
        };
        let filters = [Filter::eq(field, session.identity_id().as_ref())];
        let documents = self
            .store
            .query_documents(
                &CollectionPath::orders(),
                &filters,
                Some(OrderBy::descending("createdAt")),
            )
            .await
            .map_err(map_store_error)?;

        let mut orders = documents
            .iter()
            .map(|document| {
                profile::decode::<Order>(document)
                    .map_err(|err| map_decode_error(&document.path, err))
            })
            .collect::<Result<Vec<_>, _>>()?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn load(&self, order_id: OrderId) -> Result<(Order, u64), Error> {
        let path = CollectionPath::orders().document(order_id);
        let document = self
            .store
            .get_document(&path)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("order {order_id} does not exist")))?;
        let order = profile::decode::<Order>(&document).map_err(|err| map_decode_error(&path, err))?;
        Ok((order, document.revision))
    }

    async fn transition(
        &self,
        mut order: Order,
        revision: u64,
        target: OrderStatus,
    ) -> Result<Order, Error> {
        if !order.status.can_transition_to(target) {
            return Err(Error::invalid_transition(format!(
                "order {} cannot move from {} to {target}",
                order.id, order.status
            ))
            .with_details(json!({
                "orderId": order.id,
                "from": order.status,
                "to": target,
            })));
        }

        let now = self.clock.utc();
        let mut changes = Map::new();
        changes.insert("status".to_owned(), json!(target));
        changes.insert("updatedAt".to_owned(), json!(now));
        let path = CollectionPath::orders().document(order.id);
        self.store
            .set_document(
                &path,
                changes,
                WriteOptions::merge().with_expected_revision(revision),
            )
            .await
            .map_err(map_store_error)?;

        info!(order_id = %order.id, from = %order.status, to = %target, "order status changed");
        order.status = target;
        order.updated_at = Some(now);
        Ok(order)
    }
}

#[cfg(test)]
mod tests;
