//! Remote document addressing and payload types.
//!
//! The remote store is a key-path document database: documents live at
//! `collection/id` paths, and sub-collections nest beneath documents
//! (`vendors/{id}/menuItems/{itemId}`). Paths are validated once here so
//! services never splice raw strings.

use std::fmt;

use serde_json::{Map, Value};

use super::IdentityId;

/// Field map stored in a document.
pub type DocumentData = Map<String, Value>;

/// Validation errors for document and collection paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathValidationError {
    /// A segment was empty or whitespace.
    EmptySegment,
    /// Document paths need an even number of segments.
    NotADocument,
    /// Collection paths need an odd number of segments.
    NotACollection,
}

impl fmt::Display for PathValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySegment => write!(f, "path segments must not be empty"),
            Self::NotADocument => write!(f, "document paths need collection/id pairs"),
            Self::NotACollection => write!(f, "collection paths need an odd segment count"),
        }
    }
}

impl std::error::Error for PathValidationError {}

fn segment_count(raw: &str) -> Result<usize, PathValidationError> {
    let mut count = 0_usize;
    for segment in raw.split('/') {
        if segment.trim().is_empty() || segment.trim() != segment {
            return Err(PathValidationError::EmptySegment);
        }
        count += 1;
    }
    Ok(count)
}

/// Path of a single document.
///
/// # Examples
/// ```
/// use savorly_core::domain::{DocumentPath, IdentityId};
///
/// let id = IdentityId::new("alice").unwrap();
/// assert_eq!(DocumentPath::user(&id).as_str(), "users/alice");
/// assert!(DocumentPath::new("users").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    /// Validate a raw `collection/id[/collection/id...]` path.
    pub fn new(raw: impl Into<String>) -> Result<Self, PathValidationError> {
        let path = raw.into();
        if segment_count(&path)? & 1 == 1 {
            return Err(PathValidationError::NotADocument);
        }
        Ok(Self(path))
    }

    /// `users/{id}`: the identity-keyed profile document.
    pub fn user(id: &IdentityId) -> Self {
        Self(format!("users/{id}"))
    }

    /// `vendors/{id}`: the vendor record keyed by the vendor's identity id.
    pub fn vendor(id: &IdentityId) -> Self {
        Self(format!("vendors/{id}"))
    }

    /// Borrow the path as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Final segment: the document id.
    pub fn document_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Collection that directly contains this document.
    pub fn collection(&self) -> CollectionPath {
        let parent = self
            .0
            .rsplit_once('/')
            .map_or(self.0.as_str(), |(parent, _)| parent);
        CollectionPath(parent.to_owned())
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for DocumentPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Path of a collection of documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Validate a raw collection path.
    pub fn new(raw: impl Into<String>) -> Result<Self, PathValidationError> {
        let path = raw.into();
        if segment_count(&path)? & 1 == 0 {
            return Err(PathValidationError::NotACollection);
        }
        Ok(Self(path))
    }

    /// Top-level `orders` collection.
    pub fn orders() -> Self {
        Self("orders".to_owned())
    }

    /// `vendors/{id}/menuItems`: a vendor's menu.
    pub fn menu_items(vendor_id: &IdentityId) -> Self {
        Self(format!("vendors/{vendor_id}/menuItems"))
    }

    /// Address a document inside this collection.
    ///
    /// The id must be a single path segment; callers pass ids that were
    /// validated as [`IdentityId`] or minted as UUIDs.
    pub fn document(&self, id: impl fmt::Display) -> DocumentPath {
        DocumentPath(format!("{}/{id}", self.0))
    }

    /// Borrow the path as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document together with its store-managed revision.
///
/// The revision increases on every write to the path and is what optimistic
/// writers pass back as a precondition.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Where the document lives.
    pub path: DocumentPath,
    /// Store-managed revision, starting at 1 for the first write.
    pub revision: u64,
    /// Document fields.
    pub data: DocumentData,
}

impl Document {
    /// Read an integer nested one level deep, e.g. `metrics.moneySaved`.
    ///
    /// Missing fields read as `Ok(None)`; present fields that are not
    /// integers are reported with the offending value.
    pub fn nested_integer(&self, parent: &str, field: &str) -> Result<Option<i64>, Value> {
        match self.data.get(parent).and_then(|value| value.get(field)) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_i64().map(Some).ok_or_else(|| value.clone()),
        }
    }

    /// Read a top-level string field.
    pub fn string_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

/// Options controlling a document write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Merge into existing fields (nested maps merge recursively) instead of
    /// replacing the document.
    pub merge: bool,
    /// Fail unless the stored revision equals this value. `Some(0)` requires
    /// that the document does not exist yet.
    pub expected_revision: Option<u64>,
}

impl WriteOptions {
    /// Replace the whole document.
    pub const fn overwrite() -> Self {
        Self {
            merge: false,
            expected_revision: None,
        }
    }

    /// Merge fields into the existing document.
    pub const fn merge() -> Self {
        Self {
            merge: true,
            expected_revision: None,
        }
    }

    /// Attach a revision precondition.
    #[must_use]
    pub const fn with_expected_revision(mut self, revision: u64) -> Self {
        self.expected_revision = Some(revision);
        self
    }
}

/// Equality filter applied by collection queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Top-level field name.
    pub field: String,
    /// Value the field must equal.
    pub value: Value,
}

impl Filter {
    /// Build an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the document satisfies this filter.
    pub fn matches(&self, data: &DocumentData) -> bool {
        data.get(&self.field) == Some(&self.value)
    }
}

/// Sort direction for query ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Query ordering on a single top-level field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Field to sort by.
    pub field: String,
    /// Sort direction.
    pub direction: SortDirection,
}

impl OrderBy {
    /// Newest-first ordering on the given timestamp field.
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}
