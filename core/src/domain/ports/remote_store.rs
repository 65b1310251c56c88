//! Port for the remote key-path document store.
//!
//! The [`RemoteStore`] trait is the only way domain services reach shared
//! state. Adapters may be backed by a hosted document database; the
//! in-memory adapter under `outbound::memory` serves tests and the demo.

use async_trait::async_trait;

use crate::domain::{CollectionPath, Document, DocumentData, DocumentPath, Filter, OrderBy, WriteOptions};

use super::define_port_error;

define_port_error! {
    /// Errors raised by remote store adapters.
    pub enum RemoteStoreError {
        /// Store could not be reached.
        Connection { message: String } =>
            "remote store connection failed: {message}",
        /// The store rejected or failed to execute the operation.
        Query { message: String } =>
            "remote store operation failed: {message}",
        /// The write precondition did not hold.
        RevisionMismatch { expected: u64, actual: u64 } =>
            "revision mismatch: expected {expected}, found {actual}",
    }
}

/// Port for document reads, writes and queries.
///
/// # Revision semantics
///
/// - A document that does not exist has revision 0.
/// - Every successful write or merge increments the revision by one.
/// - A write whose [`WriteOptions::expected_revision`] differs from the stored
///   revision fails with [`RemoteStoreError::RevisionMismatch`] and changes
///   nothing.
/// - Deleting a document resets its revision to 0.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a document, `None` when absent.
    async fn get_document(&self, path: &DocumentPath)
    -> Result<Option<Document>, RemoteStoreError>;

    /// Write a document and return its new revision.
    ///
    /// With `merge` set, nested maps merge recursively into the stored
    /// fields; otherwise the document is replaced. Merging into a missing
    /// document creates it.
    async fn set_document(
        &self,
        path: &DocumentPath,
        data: DocumentData,
        options: WriteOptions,
    ) -> Result<u64, RemoteStoreError>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete_document(&self, path: &DocumentPath) -> Result<(), RemoteStoreError>;

    /// List the documents of a collection matching every filter.
    async fn query_documents(
        &self,
        collection: &CollectionPath,
        filters: &[Filter],
        order_by: Option<OrderBy>,
    ) -> Result<Vec<Document>, RemoteStoreError>;
}
