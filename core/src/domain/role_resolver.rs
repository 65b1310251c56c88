//! Sign-up profile materialisation.
//!
//! [`RoleResolver::plan`] decides, without I/O, which documents a new identity
//! needs. Students get one `users/{id}` document. Vendors get a thin
//! `users/{id}` document plus the public `vendors/{id}` record. Every document
//! is seeded with zeroed counters.
//!
//! [`RoleResolver::materialize`] writes the plan as a two-step saga and
//! deletes `users/{id}` again when the vendor record cannot be written.

use std::sync::Arc;

use serde_json::json;
use tracing::{error, warn};

use super::port_error_mapping::{map_decode_error, map_store_error};
use super::ports::RemoteStore;
use super::{
    DocumentData, DocumentPath, Error, Identity, IdentityId, Profile, Ratings, RoleData,
    StudentMetrics, StudentProfile, UserHeader, VendorMetrics, VendorProfile, WriteOptions,
    profile,
};

/// Saga step names reported in `partial_write` details.
mod step {
    pub const USER_PROFILE: &str = "userProfile";
    pub const VENDOR_RECORD: &str = "vendorRecord";
}

/// Documents a new identity needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePlan {
    /// Identity the plan is for.
    pub identity: Identity,
    /// Contents of `users/{id}`.
    pub user_document: DocumentData,
    /// Contents of `vendors/{id}`, vendors only.
    pub vendor_document: Option<DocumentData>,
    /// Profile the session will hold once the plan is written.
    pub profile: Profile,
}

/// Writes role-specific profile documents.
#[derive(Clone)]
pub struct RoleResolver<S> {
    store: Arc<S>,
}

impl<S> RoleResolver<S> {
    /// Create a resolver over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Plan the documents for `identity`.
    ///
    /// Fails with `invalid_request` when `role_data` is for a different role
    /// than the identity holds.
    pub fn plan(identity: &Identity, role_data: &RoleData) -> Result<ProfilePlan, Error> {
        if role_data.role() != identity.role {
            return Err(Error::invalid_request(format!(
                "sign-up data is for the {} role but the identity is a {}",
                role_data.role(),
                identity.role
            )));
        }
        let user_path = DocumentPath::user(&identity.id);
        let encode_err = |err: serde_json::Error| map_decode_error(&user_path, err);

        match role_data {
            RoleData::Student(details) => {
                let first_name = details.first_name.trim().to_owned();
                let last_name = details.last_name.trim().to_owned();
                let display_name = format!("{first_name} {last_name}").trim().to_owned();
                let student = StudentProfile {
                    identity_id: identity.id.clone(),
                    first_name,
                    last_name,
                    display_name,
                    metrics: StudentMetrics::default(),
                };
                let mut user_document = profile::encode(&header(identity, None)).map_err(encode_err)?;
                user_document.extend(profile::encode(&student).map_err(encode_err)?);
                Ok(ProfilePlan {
                    identity: identity.clone(),
                    user_document,
                    vendor_document: None,
                    profile: Profile::Student(student),
                })
            }
            RoleData::Vendor(details) => {
                let name = details.name.trim().to_owned();
                if name.is_empty() {
                    return Err(Error::invalid_request("vendor name must not be empty"));
                }
                let vendor = VendorProfile {
                    identity_id: identity.id.clone(),
                    name: name.clone(),
                    category: details.category.clone(),
                    address: details.address.clone(),
                    phone: details.phone.clone(),
                    hours: details.hours.clone(),
                    description: details.description.clone(),
                    ratings: Ratings::default(),
                    metrics: VendorMetrics::default(),
                };
                let user_document =
                    profile::encode(&header(identity, Some(name))).map_err(encode_err)?;
                let mut vendor_document = profile::encode(&vendor).map_err(encode_err)?;
                vendor_document.insert("createdAt".to_owned(), json!(identity.created_at));
                Ok(ProfilePlan {
                    identity: identity.clone(),
                    user_document,
                    vendor_document: Some(vendor_document),
                    profile: Profile::Vendor(vendor),
                })
            }
        }
    }
}

fn header(identity: &Identity, name: Option<String>) -> UserHeader {
    UserHeader {
        identity_id: identity.id.clone(),
        email: identity.email.clone(),
        role: identity.role,
        created_at: identity.created_at,
        name,
    }
}

impl<S> RoleResolver<S>
where
    S: RemoteStore,
{
    /// Write the planned documents.
    ///
    /// Any failure is reported as `partial_write` with details
    /// `{ identityId, failedStep, compensated }`. `compensated` is true when
    /// nothing written by the plan remains in the store.
    pub async fn materialize(&self, plan: &ProfilePlan) -> Result<(), Error> {
        let identity_id = &plan.identity.id;
        let user_path = DocumentPath::user(identity_id);

        if let Err(err) = self
            .store
            .set_document(&user_path, plan.user_document.clone(), WriteOptions::overwrite())
            .await
        {
            let cause = map_store_error(err);
            warn!(identity_id = %identity_id, error = %cause, "user profile write failed");
            return Err(saga_error(identity_id, step::USER_PROFILE, true, &cause));
        }

        let Some(vendor_document) = &plan.vendor_document else {
            return Ok(());
        };
        let vendor_path = DocumentPath::vendor(identity_id);
        let Err(err) = self
            .store
            .set_document(&vendor_path, vendor_document.clone(), WriteOptions::overwrite())
            .await
        else {
            return Ok(());
        };

        let cause = map_store_error(err);
        warn!(
            identity_id = %identity_id,
            error = %cause,
            "vendor record write failed; removing user profile"
        );
        let compensated = match self.store.delete_document(&user_path).await {
            Ok(()) => true,
            Err(delete_err) => {
                error!(
                    identity_id = %identity_id,
                    error = %delete_err,
                    "could not remove user profile after vendor record failure"
                );
                false
            }
        };
        Err(saga_error(identity_id, step::VENDOR_RECORD, compensated, &cause))
    }
}

fn saga_error(
    identity_id: &IdentityId,
    failed_step: &str,
    compensated: bool,
    cause: &Error,
) -> Error {
    Error::partial_write(format!(
        "profile setup for {identity_id} failed at {failed_step}: {}",
        cause.message()
    ))
    .with_details(json!({
        "identityId": identity_id,
        "failedStep": failed_step,
        "compensated": compensated,
        "cause": cause.code(),
    }))
}
