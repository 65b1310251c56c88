//! In-memory [`RemoteStore`] with revision preconditions and deep merges.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{Number, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::domain::ports::{RemoteStore, RemoteStoreError};
use crate::domain::{
    CollectionPath, Document, DocumentData, DocumentPath, Filter, OrderBy, SortDirection,
    WriteOptions,
};

#[derive(Debug, Clone)]
struct StoredDocument {
    revision: u64,
    data: DocumentData,
}

/// Document store held in process memory.
///
/// Revisions start at 1 on creation, increase by one per write and reset
/// when the document is deleted.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    documents: RwLock<BTreeMap<DocumentPath, StoredDocument>>,
    offline: AtomicBool,
    injected_failures: Mutex<HashMap<DocumentPath, u32>>,
}

impl MemoryRemoteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing or regaining the connection. While offline every
    /// operation fails with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Make the next `times` writes to `path` fail with a connection error.
    pub async fn fail_writes(&self, path: &DocumentPath, times: u32) {
        self.injected_failures
            .lock()
            .await
            .insert(path.clone(), times);
    }

    /// Number of stored documents across all collections.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn ensure_online(&self) -> Result<(), RemoteStoreError> {
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(RemoteStoreError::connection("remote store is offline"));
        }
        Ok(())
    }

    async fn take_injected_failure(&self, path: &DocumentPath) -> Result<(), RemoteStoreError> {
        let mut failures = self.injected_failures.lock().await;
        let Some(remaining) = failures.remove(path) else {
            return Ok(());
        };
        if remaining == 0 {
            return Ok(());
        }
        if remaining > 1 {
            failures.insert(path.clone(), remaining - 1);
        }
        debug!(path = %path, "injected write failure");
        Err(RemoteStoreError::connection(format!(
            "injected failure writing {path}"
        )))
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get_document(
        &self,
        path: &DocumentPath,
    ) -> Result<Option<Document>, RemoteStoreError> {
        self.ensure_online()?;
        Ok(self
            .documents
            .read()
            .await
            .get(path)
            .map(|stored| Document {
                path: path.clone(),
                revision: stored.revision,
                data: stored.data.clone(),
            }))
    }

    async fn set_document(
        &self,
        path: &DocumentPath,
        data: DocumentData,
        options: WriteOptions,
    ) -> Result<u64, RemoteStoreError> {
        self.ensure_online()?;
        self.take_injected_failure(path).await?;

        let mut documents = self.documents.write().await;
        let current = documents.get(path);
        let actual = current.map_or(0, |stored| stored.revision);
        if let Some(expected) = options.expected_revision {
            if expected != actual {
                return Err(RemoteStoreError::revision_mismatch(expected, actual));
            }
        }

        let data = match current {
            Some(existing) if options.merge => {
                let mut base = existing.data.clone();
                merge_into(&mut base, data);
                base
            }
            _ => data,
        };
        let revision = actual.saturating_add(1);
        documents.insert(path.clone(), StoredDocument { revision, data });
        Ok(revision)
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<(), RemoteStoreError> {
        self.ensure_online()?;
        self.documents.write().await.remove(path);
        Ok(())
    }

    async fn query_documents(
        &self,
        collection: &CollectionPath,
        filters: &[Filter],
        order_by: Option<OrderBy>,
    ) -> Result<Vec<Document>, RemoteStoreError> {
        self.ensure_online()?;
        let documents = self.documents.read().await;
        let mut matches: Vec<Document> = documents
            .iter()
            .filter(|(path, stored)| {
                path.collection() == *collection
                    && filters.iter().all(|filter| filter.matches(&stored.data))
            })
            .map(|(path, stored)| Document {
                path: path.clone(),
                revision: stored.revision,
                data: stored.data.clone(),
            })
            .collect();

        if let Some(order) = order_by {
            matches.sort_by(|a, b| {
                let ordering = compare_fields(a.data.get(&order.field), b.data.get(&order.field));
                match order.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        Ok(matches)
    }
}

/// Recursively merge `patch` into `target`. Nested maps merge key by key;
/// every other value replaces what was stored.
fn merge_into(target: &mut DocumentData, patch: DocumentData) {
    for (key, value) in patch {
        if let Value::Object(nested) = value {
            if let Some(Value::Object(existing)) = target.get_mut(&key) {
                merge_into(existing, nested);
                continue;
            }
            target.insert(key, Value::Object(nested));
        } else {
            target.insert(key, value);
        }
    }
}

fn compare_fields(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => compare_numbers(a, b),
        (Some(Value::String(a)), Some(Value::String(b))) => compare_strings(a, b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    match (a.as_i64(), b.as_i64()) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b))
            .unwrap_or(Ordering::Equal),
    }
}

// Timestamps are stored as RFC 3339 strings whose fractional seconds vary in
// width, so they compare as instants rather than text.
fn compare_strings(a: &str, b: &str) -> Ordering {
    match (
        DateTime::parse_from_rfc3339(a),
        DateTime::parse_from_rfc3339(b),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
