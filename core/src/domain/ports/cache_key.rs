//! Key type for the device-local cache.
use thiserror::Error;

use crate::domain::IdentityId;

/// Key under which a value is stored in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Validate a raw key: non-empty and free of surrounding whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, CacheKeyValidationError> {
        let raw = value.into();
        if raw.trim().is_empty() {
            return Err(CacheKeyValidationError::Empty);
        }
        if raw.trim() != raw {
            return Err(CacheKeyValidationError::ContainsWhitespace);
        }
        Ok(Self(raw))
    }

    /// `favorites_{identityId}`: the favourites entry of one identity.
    pub fn favorites(identity_id: &IdentityId) -> Self {
        Self(format!("favorites_{identity_id}"))
    }

    /// Borrow the underlying key as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Validation errors returned when constructing [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheKeyValidationError {
    /// Key is empty after trimming whitespace.
    #[error("cache key must not be empty")]
    Empty,
    /// Key contains leading or trailing whitespace.
    #[error("cache key must not contain surrounding whitespace")]
    ContainsWhitespace,
}

#[cfg(test)]
mod tests {
    //! Validates cache key parsing and the favourites key format.
    use super::{CacheKey, CacheKeyValidationError};
    use crate::domain::IdentityId;
    use rstest::rstest;

    #[rstest]
    #[case("", CacheKeyValidationError::Empty)]
    #[case("   ", CacheKeyValidationError::Empty)]
    #[case(" leading", CacheKeyValidationError::ContainsWhitespace)]
    fn cache_key_rejects_bad_input(#[case] value: &str, #[case] expected: CacheKeyValidationError) {
        assert_eq!(CacheKey::new(value).expect_err("rejected"), expected);
    }

    #[rstest]
    fn favorites_key_embeds_identity() {
        let id = IdentityId::new("alice").expect("id");
        assert_eq!(CacheKey::favorites(&id).as_str(), "favorites_alice");
    }
}
