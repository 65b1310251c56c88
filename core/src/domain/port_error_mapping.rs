//! Translation of port failures into domain errors.

use serde_json::json;

use super::Error;
use super::ports::{IdentityProviderError, LocalCacheError, RemoteStoreError};

/// Map a remote store failure. Transport failures surface as `network`.
pub(crate) fn map_store_error(error: RemoteStoreError) -> Error {
    match error {
        RemoteStoreError::Connection { message } => {
            Error::network(format!("remote store unavailable: {message}"))
        }
        RemoteStoreError::Query { message } => {
            Error::internal(format!("remote store error: {message}"))
        }
        RemoteStoreError::RevisionMismatch { expected, actual } => {
            Error::conflict("revision mismatch").with_details(json!({
                "expectedRevision": expected,
                "actualRevision": actual,
                "code": "revision_mismatch",
            }))
        }
    }
}

/// Map an identity provider failure.
pub(crate) fn map_provider_error(error: IdentityProviderError) -> Error {
    match error {
        IdentityProviderError::EmailInUse { email } => {
            Error::duplicate_email(format!("an account already exists for {email}"))
        }
        IdentityProviderError::InvalidCredential => {
            Error::invalid_credential("invalid email or password")
        }
        IdentityProviderError::Connection { message } => {
            Error::network(format!("identity provider unavailable: {message}"))
        }
        IdentityProviderError::Rejected { message } => {
            Error::invalid_request(format!("identity provider rejected request: {message}"))
        }
    }
}

/// Map a local cache failure.
pub(crate) fn map_cache_error(error: LocalCacheError) -> Error {
    match error {
        LocalCacheError::Backend { message } => {
            Error::internal(format!("local cache unavailable: {message}"))
        }
    }
}

/// Map a document decoding failure.
pub(crate) fn map_decode_error(path: &impl std::fmt::Display, error: serde_json::Error) -> Error {
    Error::internal(format!("document {path} is malformed: {error}"))
}
