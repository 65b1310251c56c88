//! Device-local favourite vendors.
//!
//! Favourites are stored only in the [`LocalCache`] under
//! `favorites_{identityId}` as a JSON array of vendor names. They are never
//! written to the remote store, so the same identity sees independent sets on
//! different devices and starts empty on a new one.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::port_error_mapping::map_cache_error;
use super::ports::{CacheKey, LocalCache};
use super::{Error, IdentityId, SessionState};

/// Set of favourite vendor names.
///
/// # Examples
/// ```
/// use savorly_core::domain::FavoriteSet;
///
/// let mut favorites = FavoriteSet::default();
/// assert!(favorites.toggle("Golden Bear Cafe"));
/// assert!(!favorites.toggle("Golden Bear Cafe"));
/// assert!(favorites.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoriteSet(BTreeSet<String>);

impl FavoriteSet {
    /// Whether `vendor_name` is a favourite.
    pub fn contains(&self, vendor_name: &str) -> bool {
        self.0.contains(vendor_name)
    }

    /// Flip membership and return whether the vendor is now a favourite.
    pub fn toggle(&mut self, vendor_name: &str) -> bool {
        if self.0.remove(vendor_name) {
            false
        } else {
            self.0.insert(vendor_name.to_owned());
            true
        }
    }

    /// Number of favourites.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no favourites.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Vendor names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(&self.0)
            .map_err(|err| Error::internal(format!("failed to encode favourites: {err}")))
    }

    fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Vec<String>>(raw).map(|names| Self(names.into_iter().collect()))
    }
}

impl<S: Into<String>> FromIterator<S> for FavoriteSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

struct Loaded {
    owner: IdentityId,
    favorites: FavoriteSet,
}

/// In-memory view of the signed-in identity's favourites, backed by the
/// local cache.
pub struct FavoritesCache<C> {
    cache: Arc<C>,
    loaded: RwLock<Option<Loaded>>,
}

impl<C> FavoritesCache<C> {
    /// Create an empty view over `cache`.
    pub fn new(cache: Arc<C>) -> Self {
        Self {
            cache,
            loaded: RwLock::new(None),
        }
    }

    /// Favourites currently held in memory, if any identity is loaded.
    pub async fn current(&self) -> Option<FavoriteSet> {
        self.loaded
            .read()
            .await
            .as_ref()
            .map(|loaded| loaded.favorites.clone())
    }

    /// Drop the in-memory state. The cache entry is kept.
    pub async fn clear(&self) {
        *self.loaded.write().await = None;
    }
}

impl<C> FavoritesCache<C>
where
    C: LocalCache,
{
    /// Load the identity's favourites from the cache.
    ///
    /// A missing entry yields an empty set. A corrupt entry also yields an
    /// empty set and is logged; it is overwritten by the next toggle.
    pub async fn hydrate(&self, identity_id: &IdentityId) -> Result<FavoriteSet, Error> {
        let favorites = self.read_cache(identity_id).await?;
        *self.loaded.write().await = Some(Loaded {
            owner: identity_id.clone(),
            favorites: favorites.clone(),
        });
        Ok(favorites)
    }

    /// Flip `vendor_name` and persist the whole set immediately.
    ///
    /// Returns whether the vendor is a favourite afterwards. If persisting
    /// fails the in-memory set is left unchanged. Toggling for an identity
    /// other than the loaded one only updates that identity's cache entry.
    pub async fn toggle(&self, identity_id: &IdentityId, vendor_name: &str) -> Result<bool, Error> {
        let vendor = vendor_name.trim();
        if vendor.is_empty() {
            return Err(Error::invalid_request("vendor name must not be empty"));
        }

        let mut loaded = self.loaded.write().await;
        let owns_view = loaded
            .as_ref()
            .is_none_or(|current| &current.owner == identity_id);
        let mut favorites = match loaded.as_ref() {
            Some(current) if &current.owner == identity_id => current.favorites.clone(),
            _ => self.read_cache(identity_id).await?,
        };
        let is_favorite = favorites.toggle(vendor);

        self.cache
            .set(&CacheKey::favorites(identity_id), &favorites.to_json()?)
            .await
            .map_err(map_cache_error)?;
        debug!(identity_id = %identity_id, vendor, is_favorite, "favourite toggled");

        if owns_view {
            *loaded = Some(Loaded {
                owner: identity_id.clone(),
                favorites,
            });
        }
        Ok(is_favorite)
    }

    /// Follow a session transition: hydrate on sign-in, clear on sign-out.
    pub async fn on_session_change(&self, state: &SessionState) -> Result<(), Error> {
        match state {
            SessionState::Authenticated(context) => {
                self.hydrate(context.identity_id()).await.map(|_| ())
            }
            SessionState::Anonymous => {
                self.clear().await;
                Ok(())
            }
            SessionState::Unknown | SessionState::Authenticating => Ok(()),
        }
    }

    async fn read_cache(&self, identity_id: &IdentityId) -> Result<FavoriteSet, Error> {
        let key = CacheKey::favorites(identity_id);
        let Some(raw) = self.cache.get(&key).await.map_err(map_cache_error)? else {
            return Ok(FavoriteSet::default());
        };
        Ok(FavoriteSet::from_json(&raw).unwrap_or_else(|err| {
            warn!(key = %key, error = %err, "favourites entry is corrupt; starting empty");
            FavoriteSet::default()
        }))
    }
}

#[cfg(test)]
mod tests;
