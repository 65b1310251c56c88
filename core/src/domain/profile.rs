//! Role-specific profile documents.
//!
//! Students keep their profile and counters on `users/{id}`. Vendors keep a
//! thin `users/{id}` document (identity, role and business name) plus the full
//! public record on `vendors/{id}`, which is also where vendor counters live.
//! All documents are serialised in camelCase to match the remote schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Document, DocumentData, Email, Identity, IdentityId, Money, Role};

/// Counters shown on a student's profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentMetrics {
    /// Total discounted spend.
    pub money_saved: Money,
    /// Servings reserved.
    pub meals_rescued: i64,
}

/// Counters shown on a vendor's dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorMetrics {
    /// Total discounted revenue.
    pub total_revenue: Money,
    /// Servings handed out.
    pub meals_shared: i64,
    /// Orders placed against the vendor.
    pub orders_completed: i64,
}

/// Aggregate review score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Ratings {
    /// Mean rating, zero when there are no reviews.
    pub average: f64,
    /// Number of reviews.
    pub count: u32,
}

/// Profile of a student identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    /// Owning identity.
    pub identity_id: IdentityId,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Name shown in the UI.
    #[serde(default)]
    pub display_name: String,
    /// Aggregate counters.
    #[serde(default)]
    pub metrics: StudentMetrics,
}

impl StudentProfile {
    /// Profile used when the remote document could not be read.
    pub fn fallback(identity_id: IdentityId) -> Self {
        Self {
            identity_id,
            first_name: String::new(),
            last_name: String::new(),
            display_name: String::new(),
            metrics: StudentMetrics::default(),
        }
    }
}

/// Public record of a vendor identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorProfile {
    /// Owning identity.
    pub identity_id: IdentityId,
    /// Business name, also the key used by student favourites.
    pub name: String,
    /// Cuisine or venue category.
    #[serde(default)]
    pub category: String,
    /// Street address.
    #[serde(default)]
    pub address: String,
    /// Contact phone number.
    #[serde(default)]
    pub phone: String,
    /// Free-form opening hours.
    #[serde(default)]
    pub hours: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Review score.
    #[serde(default)]
    pub ratings: Ratings,
    /// Aggregate counters.
    #[serde(default)]
    pub metrics: VendorMetrics,
}

impl VendorProfile {
    /// Record built from the thin `users/{id}` document alone.
    pub fn minimal(identity_id: IdentityId, name: impl Into<String>) -> Self {
        Self {
            identity_id,
            name: name.into(),
            category: String::new(),
            address: String::new(),
            phone: String::new(),
            hours: String::new(),
            description: String::new(),
            ratings: Ratings::default(),
            metrics: VendorMetrics::default(),
        }
    }
}

/// Resolved profile of the signed-in identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    /// Student profile.
    Student(StudentProfile),
    /// Vendor record.
    Vendor(VendorProfile),
}

impl Profile {
    /// Role implied by the profile variant.
    pub const fn role(&self) -> Role {
        match self {
            Self::Student(_) => Role::Student,
            Self::Vendor(_) => Role::Vendor,
        }
    }
}

/// Details a student supplies at sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StudentDetails {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

/// Details a vendor supplies at sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VendorDetails {
    /// Business name.
    pub name: String,
    /// Cuisine or venue category.
    pub category: String,
    /// Street address.
    pub address: String,
    /// Contact phone number.
    pub phone: String,
    /// Free-form opening hours.
    pub hours: String,
    /// Free-form description.
    pub description: String,
}

/// Role-specific sign-up payload. The variant decides the identity's role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleData {
    /// Sign up as a student.
    Student(StudentDetails),
    /// Sign up as a vendor.
    Vendor(VendorDetails),
}

impl RoleData {
    /// Role this payload signs up for.
    pub const fn role(&self) -> Role {
        match self {
            Self::Student(_) => Role::Student,
            Self::Vendor(_) => Role::Vendor,
        }
    }
}

/// Fields common to every `users/{id}` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHeader {
    /// Owning identity.
    pub identity_id: IdentityId,
    /// Sign-up email.
    pub email: Email,
    /// Role fixed at sign-up.
    #[serde(default)]
    pub role: Role,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
    /// Vendor business name, present on vendor user documents only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserHeader {
    /// Rebuild the identity described by this header.
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.identity_id.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Deserialise a typed view of a document.
pub(crate) fn decode<T>(document: &Document) -> Result<T, serde_json::Error>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(Value::Object(document.data.clone()))
}

/// Serialise a typed value into document fields.
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<DocumentData, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::DocumentPath;
    use rstest::rstest;
    use serde_json::json;

    fn document(data: Value) -> Document {
        Document {
            path: DocumentPath::new("users/alice").expect("path"),
            revision: 1,
            data: data.as_object().cloned().expect("object"),
        }
    }

    #[rstest]
    fn student_profile_reads_camel_case_document() {
        let doc = document(json!({
            "identityId": "alice",
            "email": "alice@berkeley.edu",
            "role": "student",
            "createdAt": "2026-01-05T12:00:00Z",
            "firstName": "Alice",
            "lastName": "Liddell",
            "displayName": "Alice Liddell",
            "metrics": {"moneySaved": 629, "mealsRescued": 2}
        }));

        let profile: StudentProfile = decode(&doc).expect("decode");
        assert_eq!(profile.display_name, "Alice Liddell");
        assert_eq!(profile.metrics.money_saved, Money::from_cents(629));
        assert_eq!(profile.metrics.meals_rescued, 2);
    }

    #[rstest]
    fn missing_metrics_default_to_zero() {
        let doc = document(json!({"identityId": "v1", "name": "Golden Bear Cafe"}));
        let profile: VendorProfile = decode(&doc).expect("decode");
        assert_eq!(profile.metrics, VendorMetrics::default());
        assert_eq!(profile.ratings.count, 0);
    }

    #[rstest]
    fn header_omits_name_for_students() {
        let header = UserHeader {
            identity_id: IdentityId::new("alice").expect("id"),
            email: Email::new("alice@berkeley.edu").expect("email"),
            role: Role::Student,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            name: None,
        };
        let data = encode(&header).expect("encode");
        assert!(!data.contains_key("name"));
        assert_eq!(data.get("role"), Some(&json!("student")));
    }

    #[rstest]
    fn encode_rejects_non_objects() {
        assert!(encode(&42_u8).is_err());
    }
}
