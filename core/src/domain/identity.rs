//! Identity data model.
//!
//! An [`Identity`] is the authenticated principal: the provider-issued id,
//! the email it signed up with, and the role it holds for its whole lifetime.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation errors returned by the identity value constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityValidationError {
    /// Identity id was empty.
    EmptyId,
    /// Identity id carried surrounding whitespace or a path separator.
    InvalidId,
    /// Email was blank once trimmed.
    EmptyEmail,
}

impl fmt::Display for IdentityValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "identity id must not be empty"),
            Self::InvalidId => write!(
                f,
                "identity id must not contain whitespace padding or '/' separators"
            ),
            Self::EmptyEmail => write!(f, "email must not be empty"),
        }
    }
}

impl std::error::Error for IdentityValidationError {}

/// Provider-issued identity identifier.
///
/// Providers mint opaque strings rather than UUIDs, so the only structural
/// rules are: non-empty, no surrounding whitespace, and no `/` (the id is
/// embedded in document paths such as `users/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityId(String);

impl IdentityId {
    /// Validate and construct an [`IdentityId`].
    ///
    /// # Examples
    /// ```
    /// use savorly_core::domain::IdentityId;
    ///
    /// let id = IdentityId::new("alice-uid").expect("valid id");
    /// assert_eq!(id.as_ref(), "alice-uid");
    /// assert!(IdentityId::new("users/alice").is_err());
    /// ```
    pub fn new(id: impl Into<String>) -> Result<Self, IdentityValidationError> {
        Self::from_owned(id.into())
    }

    /// Generate a new random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    fn from_owned(id: String) -> Result<Self, IdentityValidationError> {
        if id.is_empty() {
            return Err(IdentityValidationError::EmptyId);
        }
        if id.trim() != id || id.contains('/') {
            return Err(IdentityValidationError::InvalidId);
        }
        Ok(Self(id))
    }
}

impl AsRef<str> for IdentityId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<IdentityId> for String {
    fn from(value: IdentityId) -> Self {
        value.0
    }
}

impl TryFrom<String> for IdentityId {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Email address an identity signed up with.
///
/// Only trimming and emptiness are checked here; format rules belong to the
/// identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Validate and construct an [`Email`], trimming surrounding whitespace.
    pub fn new(email: impl AsRef<str>) -> Result<Self, IdentityValidationError> {
        let trimmed = email.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IdentityValidationError::EmptyEmail);
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl TryFrom<String> for Email {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Role held by an identity. Fixed at sign-up; there is no migration path.
///
/// # Examples
/// ```
/// use savorly_core::domain::Role;
///
/// assert_eq!(Role::Vendor.as_str(), "vendor");
/// assert_eq!("student".parse::<Role>(), Ok(Role::Student));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Student browsing and reserving surplus meals.
    #[default]
    Student,
    /// Campus vendor publishing surplus meals.
    Vendor,
}

impl Role {
    /// Returns the stored string representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Vendor => "vendor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError {
    /// The unrecognised input value.
    pub input: String,
}

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.input)
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "vendor" => Ok(Self::Vendor),
            _ => Err(ParseRoleError {
                input: s.to_owned(),
            }),
        }
    }
}

/// Authenticated principal.
///
/// ## Invariants
/// - `id` is immutable once issued by the provider.
/// - `role` never changes for the lifetime of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Provider-issued identifier.
    pub id: IdentityId,
    /// Sign-up email.
    pub email: Email,
    /// Role fixed at sign-up.
    pub role: Role,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", IdentityValidationError::EmptyId)]
    #[case(" padded", IdentityValidationError::InvalidId)]
    #[case("users/alice", IdentityValidationError::InvalidId)]
    fn identity_id_rejects_invalid_input(
        #[case] raw: &str,
        #[case] expected: IdentityValidationError,
    ) {
        let err = IdentityId::new(raw).expect_err("invalid ids rejected");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn random_ids_are_path_safe() {
        let id = IdentityId::random();
        assert!(IdentityId::new(id.as_ref()).is_ok());
    }

    #[rstest]
    #[case("  alice@berkeley.edu ", "alice@berkeley.edu")]
    #[case("bob@berkeley.edu", "bob@berkeley.edu")]
    fn email_is_trimmed(#[case] raw: &str, #[case] expected: &str) {
        let email = Email::new(raw).expect("valid email");
        assert_eq!(email.as_ref(), expected);
    }

    #[rstest]
    fn blank_email_is_rejected() {
        assert_eq!(
            Email::new("   ").expect_err("blank"),
            IdentityValidationError::EmptyEmail
        );
    }

    #[rstest]
    fn unknown_role_fails_to_parse() {
        let err = "admin".parse::<Role>().expect_err("unknown role");
        assert_eq!(err.input, "admin");
    }

    #[rstest]
    fn role_serialises_lowercase() {
        let value = serde_json::to_value(Role::Vendor).expect("serialise role");
        assert_eq!(value, serde_json::json!("vendor"));
    }
}
