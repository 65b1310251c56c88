//! Authentication primitives such as account credentials.
//!
//! Keep raw form parsing outside the domain by exposing constructors that
//! validate string inputs before the session manager talks to a port.

use std::fmt;

use zeroize::Zeroizing;

use super::{Email, IdentityValidationError};

/// Domain error returned when credential values are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsValidationError {
    /// Email was missing or blank once trimmed.
    EmptyEmail,
    /// Password was blank.
    EmptyPassword,
}

impl fmt::Display for CredentialsValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyEmail => write!(f, "email must not be empty"),
            Self::EmptyPassword => write!(f, "password must not be empty"),
        }
    }
}

impl std::error::Error for CredentialsValidationError {}

/// Validated credentials used for both sign-up and sign-in.
///
/// ## Invariants
/// - `email` is trimmed and must not be empty after trimming.
/// - `password` is required to be non-empty but retains caller-provided
///   whitespace to avoid surprising credential comparisons.
///
/// # Examples
/// ```
/// use savorly_core::domain::Credentials;
///
/// let creds = Credentials::try_from_parts(" alice@berkeley.edu ", "hunter22").unwrap();
/// assert_eq!(creds.email().as_ref(), "alice@berkeley.edu");
/// assert_eq!(creds.password(), "hunter22");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    email: Email,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Construct credentials from raw email/password inputs.
    pub fn try_from_parts(
        raw_email: &str,
        password: &str,
    ) -> Result<Self, CredentialsValidationError> {
        let email = Email::new(raw_email).map_err(|err| match err {
            IdentityValidationError::EmptyEmail
            | IdentityValidationError::EmptyId
            | IdentityValidationError::InvalidId => CredentialsValidationError::EmptyEmail,
        })?;

        if password.is_empty() {
            return Err(CredentialsValidationError::EmptyPassword);
        }

        Ok(Self {
            email,
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// Email used to look up the identity.
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Password string provided by the caller.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}
