//! Tests for the metrics aggregator.

use super::*;
use crate::domain::ports::MockRemoteStore;
use crate::domain::{DocumentPath, ErrorCode, IdentityId};
use rstest::{fixture, rstest};

#[fixture]
fn student() -> MetricsEntity {
    MetricsEntity::Student(IdentityId::new("alice").expect("id"))
}

fn student_document(revision: u64, metrics: Value) -> Document {
    let data = json!({ "identityId": "alice", "metrics": metrics });
    Document {
        path: DocumentPath::new("users/alice").expect("path"),
        revision,
        data: data.as_object().cloned().expect("object"),
    }
}

fn aggregator(store: MockRemoteStore, mode: ConcurrencyMode) -> MetricsAggregator<MockRemoteStore> {
    MetricsAggregator::new(Arc::new(store), mode)
}

fn saved(cents: i64) -> MetricDeltas {
    MetricDeltas::new()
        .with(MetricKey::MoneySaved, cents)
        .with(MetricKey::MealsRescued, 1)
}

#[rstest]
#[tokio::test]
async fn increments_existing_counters(student: MetricsEntity) {
    let mut store = MockRemoteStore::new();
    store.expect_get_document().times(1).return_once(|_| {
        Ok(Some(student_document(
            4,
            json!({"moneySaved": 100, "mealsRescued": 3}),
        )))
    });
    store
        .expect_set_document()
        .withf(|path, data, options| {
            path.as_str() == "users/alice"
                && data["metrics"] == json!({"moneySaved": 105, "mealsRescued": 4})
                && options.merge
                && options.expected_revision == Some(4)
        })
        .times(1)
        .return_once(|_, _, _| Ok(5));

    let snapshot = aggregator(store, ConcurrencyMode::default())
        .increment_metrics(&student, &saved(5))
        .await
        .expect("increment succeeds");

    assert_eq!(snapshot.get(MetricKey::MoneySaved), 105);
    assert_eq!(snapshot.get(MetricKey::MealsRescued), 4);
}

#[rstest]
#[tokio::test]
async fn missing_counters_start_at_zero(student: MetricsEntity) {
    let mut store = MockRemoteStore::new();
    store
        .expect_get_document()
        .return_once(|_| Ok(Some(student_document(1, json!({})))));
    store.expect_set_document().return_once(|_, _, _| Ok(2));

    let snapshot = aggregator(store, ConcurrencyMode::default())
        .increment_metrics(&student, &MetricDeltas::new().with(MetricKey::MealsRescued, -2))
        .await
        .expect("increment succeeds");

    assert_eq!(snapshot.get(MetricKey::MealsRescued), -2);
    assert_eq!(snapshot.get(MetricKey::MoneySaved), 0);
}

#[rstest]
#[tokio::test]
async fn missing_document_is_not_found_and_writes_nothing(student: MetricsEntity) {
    let mut store = MockRemoteStore::new();
    store.expect_get_document().return_once(|_| Ok(None));
    store.expect_set_document().never();

    let error = aggregator(store, ConcurrencyMode::default())
        .increment_metrics(&student, &saved(5))
        .await
        .expect_err("not found");

    assert_eq!(error.code(), ErrorCode::EntityNotFound);
}

#[rstest]
#[tokio::test]
async fn unguarded_mode_writes_without_precondition(student: MetricsEntity) {
    let mut store = MockRemoteStore::new();
    store
        .expect_get_document()
        .return_once(|_| Ok(Some(student_document(9, json!({"moneySaved": 1})))));
    store
        .expect_set_document()
        .withf(|_, _, options| options.expected_revision.is_none())
        .times(1)
        .return_once(|_, _, _| Ok(10));

    aggregator(store, ConcurrencyMode::Unguarded)
        .increment_metrics(&student, &saved(5))
        .await
        .expect("increment succeeds");
}

#[rstest]
#[tokio::test]
async fn optimistic_mode_rereads_after_revision_mismatch(student: MetricsEntity) {
    let mut store = MockRemoteStore::new();
    let mut reads = mockall::Sequence::new();
    store
        .expect_get_document()
        .times(1)
        .in_sequence(&mut reads)
        .return_once(|_| Ok(Some(student_document(1, json!({"moneySaved": 10})))));
    store
        .expect_get_document()
        .times(1)
        .in_sequence(&mut reads)
        .return_once(|_| Ok(Some(student_document(2, json!({"moneySaved": 15})))));
    store
        .expect_set_document()
        .withf(|_, _, options| options.expected_revision == Some(1))
        .times(1)
        .return_once(|_, _, _| Err(RemoteStoreError::revision_mismatch(1_u64, 2_u64)));
    store
        .expect_set_document()
        .withf(|_, data, options| {
            options.expected_revision == Some(2) && data["metrics"]["moneySaved"] == json!(20)
        })
        .times(1)
        .return_once(|_, _, _| Ok(3));

    let snapshot = aggregator(store, ConcurrencyMode::default())
        .increment_metrics(&student, &saved(5))
        .await
        .expect("retry succeeds");

    assert_eq!(snapshot.get(MetricKey::MoneySaved), 20);
}

#[rstest]
#[tokio::test]
async fn optimistic_mode_gives_up_with_conflict(student: MetricsEntity) {
    let mut store = MockRemoteStore::new();
    store
        .expect_get_document()
        .times(2)
        .returning(|_| Ok(Some(student_document(1, json!({})))));
    store
        .expect_set_document()
        .times(2)
        .returning(|_, _, _| Err(RemoteStoreError::revision_mismatch(1_u64, 2_u64)));

    let error = aggregator(store, ConcurrencyMode::Optimistic { max_attempts: 2 })
        .increment_metrics(&student, &saved(5))
        .await
        .expect_err("conflict");

    assert_eq!(error.code(), ErrorCode::Conflict);
    assert_eq!(error.details().map(|d| d["attempts"].clone()), Some(json!(2)));
}

#[rstest]
#[tokio::test]
async fn connection_failures_surface_as_network(student: MetricsEntity) {
    let mut store = MockRemoteStore::new();
    store
        .expect_get_document()
        .return_once(|_| Err(RemoteStoreError::connection("offline")));

    let error = aggregator(store, ConcurrencyMode::default())
        .increment_metrics(&student, &saved(5))
        .await
        .expect_err("network");

    assert_eq!(error.code(), ErrorCode::Network);
}

#[rstest]
#[tokio::test]
async fn non_integer_counters_are_rejected(student: MetricsEntity) {
    let mut store = MockRemoteStore::new();
    store
        .expect_get_document()
        .return_once(|_| Ok(Some(student_document(1, json!({"moneySaved": "6.29"})))));
    store.expect_set_document().never();

    let error = aggregator(store, ConcurrencyMode::default())
        .increment_metrics(&student, &saved(5))
        .await
        .expect_err("malformed counter");

    assert_eq!(error.code(), ErrorCode::InternalError);
}

#[rstest]
#[case("unguarded", ConcurrencyMode::Unguarded)]
#[case("Optimistic", ConcurrencyMode::default())]
fn concurrency_mode_parses(#[case] raw: &str, #[case] expected: ConcurrencyMode) {
    assert_eq!(raw.parse::<ConcurrencyMode>(), Ok(expected));
}

#[rstest]
fn unknown_concurrency_mode_is_rejected() {
    let err = "locking".parse::<ConcurrencyMode>().expect_err("unknown");
    assert_eq!(err.input, "locking");
}
