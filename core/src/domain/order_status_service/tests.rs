//! Tests for order transitions and order history queries.

use super::*;
use crate::domain::ports::{MockRemoteStore, RemoteStoreError};
use crate::domain::{
    Document, DocumentPath, Email, ErrorCode, Identity, IdentityId, Profile, StudentProfile,
    VendorProfile,
};
use chrono::{DateTime, TimeZone, Utc};
use mockable::MockClock;
use rstest::rstest;
use serde_json::Value;
use uuid::Uuid;

const ORDER_UUID: &str = "0e7f3a52-6a0c-4d1e-9b8b-5c2f9a4d7e10";

fn order_id() -> OrderId {
    OrderId::from_uuid(Uuid::parse_str(ORDER_UUID).expect("uuid"))
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 13, 0, 0)
        .single()
        .expect("timestamp")
}

fn session(id: &str, role: Role) -> SessionContext {
    let identity_id = IdentityId::new(id).expect("id");
    let profile = match role {
        Role::Student => Profile::Student(StudentProfile::fallback(identity_id.clone())),
        Role::Vendor => Profile::Vendor(VendorProfile::minimal(identity_id.clone(), "Cafe")),
    };
    SessionContext {
        identity: Identity {
            id: identity_id,
            email: Email::new(format!("{id}@berkeley.edu")).expect("email"),
            role,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        },
        profile,
        degraded: false,
    }
}

fn order_document(id: &str, status: &str, created_at: &str) -> Document {
    let data = json!({
        "id": id,
        "studentId": "alice",
        "vendorId": "cafe",
        "itemName": "Pad Thai",
        "itemPrice": 629,
        "servings": 2,
        "status": status,
        "createdAt": created_at,
    });
    Document {
        path: DocumentPath::new(format!("orders/{id}")).expect("path"),
        revision: 3,
        data: data.as_object().cloned().expect("object"),
    }
}

fn service(store: MockRemoteStore) -> OrderStatusService<MockRemoteStore> {
    let mut clock = MockClock::new();
    clock.expect_utc().return_const(now());
    OrderStatusService::new(Arc::new(store), Arc::new(clock))
}

fn store_with_order(status: &'static str) -> MockRemoteStore {
    let mut store = MockRemoteStore::new();
    store
        .expect_get_document()
        .returning(move |_| Ok(Some(order_document(ORDER_UUID, status, "2026-03-01T12:00:00Z"))));
    store
}

#[rstest]
#[case("pending", OrderStatus::Ready)]
#[case("ready", OrderStatus::Completed)]
#[case("ready", OrderStatus::Cancelled)]
#[tokio::test]
async fn owning_vendor_advances_along_the_machine(
    #[case] from: &'static str,
    #[case] target: OrderStatus,
) {
    let mut store = store_with_order(from);
    store
        .expect_set_document()
        .withf(move |path, data, options| {
            path.as_str() == format!("orders/{ORDER_UUID}")
                && data.get("status") == Some(&json!(target))
                && options.merge
                && options.expected_revision == Some(3)
        })
        .times(1)
        .return_once(|_, _, _| Ok(4));

    let order = service(store)
        .advance(&session("cafe", Role::Vendor), order_id(), target)
        .await
        .expect("transition");

    assert_eq!(order.status, target);
    assert_eq!(order.updated_at, Some(now()));
}

#[rstest]
#[case("pending", OrderStatus::Completed)]
#[case("completed", OrderStatus::Cancelled)]
#[case("cancelled", OrderStatus::Ready)]
#[tokio::test]
async fn illegal_transitions_are_rejected(
    #[case] from: &'static str,
    #[case] target: OrderStatus,
) {
    let mut store = store_with_order(from);
    store.expect_set_document().never();

    let error = service(store)
        .advance(&session("cafe", Role::Vendor), order_id(), target)
        .await
        .expect_err("invalid transition");

    assert_eq!(error.code(), ErrorCode::InvalidTransition);
}

#[rstest]
#[tokio::test]
async fn other_vendors_cannot_advance() {
    let mut store = store_with_order("pending");
    store.expect_set_document().never();

    let error = service(store)
        .advance(&session("other", Role::Vendor), order_id(), OrderStatus::Ready)
        .await
        .expect_err("forbidden");

    assert_eq!(error.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn students_cannot_advance() {
    let error = service(MockRemoteStore::new())
        .advance(&session("alice", Role::Student), order_id(), OrderStatus::Ready)
        .await
        .expect_err("forbidden");

    assert_eq!(error.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn owning_student_cancels_pending_order() {
    let mut store = store_with_order("pending");
    store.expect_set_document().return_once(|_, _, _| Ok(4));

    let order = service(store)
        .cancel(&session("alice", Role::Student), order_id())
        .await
        .expect("cancelled");

    assert_eq!(order.status, OrderStatus::Cancelled);
}

#[rstest]
#[tokio::test]
async fn concurrent_transition_surfaces_conflict() {
    let mut store = store_with_order("pending");
    store
        .expect_set_document()
        .return_once(|_, _, _| Err(RemoteStoreError::revision_mismatch(3_u64, 4_u64)));

    let error = service(store)
        .cancel(&session("alice", Role::Student), order_id())
        .await
        .expect_err("conflict");

    assert_eq!(error.code(), ErrorCode::Conflict);
}

#[rstest]
#[tokio::test]
async fn missing_order_is_not_found() {
    let mut store = MockRemoteStore::new();
    store.expect_get_document().return_once(|_| Ok(None));

    let error = service(store)
        .cancel(&session("alice", Role::Student), order_id())
        .await
        .expect_err("not found");

    assert_eq!(error.code(), ErrorCode::EntityNotFound);
}

fn history_store(expected_field: &'static str) -> MockRemoteStore {
    let mut store = MockRemoteStore::new();
    store
        .expect_query_documents()
        .withf(move |collection, filters, order_by| {
            collection.as_str() == "orders"
                && filters.first().map(|f| f.field.as_str()) == Some(expected_field)
                && order_by.as_ref().map(|o| o.field.as_str()) == Some("createdAt")
        })
        .returning(|_, _, _| {
            Ok(vec![
                order_document(
                    "0e7f3a52-6a0c-4d1e-9b8b-5c2f9a4d7e11",
                    "completed",
                    "2026-02-01T12:00:00Z",
                ),
                order_document(
                    "0e7f3a52-6a0c-4d1e-9b8b-5c2f9a4d7e12",
                    "pending",
                    "2026-03-01T12:00:00Z",
                ),
                order_document(
                    "0e7f3a52-6a0c-4d1e-9b8b-5c2f9a4d7e13",
                    "ready",
                    "2026-03-02T12:00:00Z",
                ),
            ])
        });
    store
}

#[rstest]
#[tokio::test]
async fn current_orders_are_active_and_newest_first() {
    let orders = service(history_store("studentId"))
        .current_orders(&session("alice", Role::Student))
        .await
        .expect("orders");

    let statuses: Vec<_> = orders.iter().map(|order| order.status).collect();
    assert_eq!(statuses, vec![OrderStatus::Ready, OrderStatus::Pending]);
}

#[rstest]
#[tokio::test]
async fn past_orders_are_terminal() {
    let orders = service(history_store("vendorId"))
        .past_orders(&session("cafe", Role::Vendor))
        .await
        .expect("orders");

    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Completed);
}

#[rstest]
#[tokio::test]
async fn malformed_history_is_an_internal_error() {
    let mut store = MockRemoteStore::new();
    store.expect_query_documents().return_once(|_, _, _| {
        Ok(vec![Document {
            path: DocumentPath::new("orders/broken").expect("path"),
            revision: 1,
            data: serde_json::Map::<String, Value>::new(),
        }])
    });

    let error = service(store)
        .current_orders(&session("alice", Role::Student))
        .await
        .expect_err("malformed");

    assert_eq!(error.code(), ErrorCode::InternalError);
}
