//! Tests for favourite hydration, toggling and session following.

use std::collections::HashMap;
use std::sync::Mutex;

use super::*;
use crate::domain::ports::{LocalCacheError, MockLocalCache};
use crate::domain::{
    Email, ErrorCode, Identity, Profile, Role, SessionContext, StudentProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rstest::{fixture, rstest};

/// Cache double backed by a plain map.
#[derive(Default)]
struct MapCache(Mutex<HashMap<String, String>>);

impl MapCache {
    fn with_entry(key: &str, value: &str) -> Self {
        let cache = Self::default();
        cache.entries().insert(key.to_owned(), value.to_owned());
        cache
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.0.lock().expect("cache lock")
    }
}

#[async_trait]
impl LocalCache for MapCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, LocalCacheError> {
        Ok(self.entries().get(key.as_str()).cloned())
    }

    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), LocalCacheError> {
        self.entries().insert(key.as_str().to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), LocalCacheError> {
        self.entries().remove(key.as_str());
        Ok(())
    }
}

#[fixture]
fn alice() -> IdentityId {
    IdentityId::new("alice").expect("id")
}

#[rstest]
#[tokio::test]
async fn missing_entry_hydrates_empty(alice: IdentityId) {
    let favorites = FavoritesCache::new(Arc::new(MapCache::default()));
    let set = favorites.hydrate(&alice).await.expect("hydrate");
    assert!(set.is_empty());
}

#[rstest]
#[tokio::test]
async fn corrupt_entry_hydrates_empty(alice: IdentityId) {
    let cache = MapCache::with_entry("favorites_alice", "{not json");
    let favorites = FavoritesCache::new(Arc::new(cache));
    let set = favorites.hydrate(&alice).await.expect("hydrate");
    assert!(set.is_empty());
}

#[rstest]
#[tokio::test]
async fn hydration_is_idempotent(alice: IdentityId) {
    let cache = MapCache::with_entry("favorites_alice", r#"["Golden Bear Cafe","Brewed Awakening"]"#);
    let favorites = FavoritesCache::new(Arc::new(cache));

    let first = favorites.hydrate(&alice).await.expect("first hydrate");
    let second = favorites.hydrate(&alice).await.expect("second hydrate");

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[rstest]
#[tokio::test]
async fn toggle_twice_restores_the_set(alice: IdentityId) {
    let cache = Arc::new(MapCache::with_entry("favorites_alice", r#"["Brewed Awakening"]"#));
    let favorites = FavoritesCache::new(Arc::clone(&cache));
    let before = favorites.hydrate(&alice).await.expect("hydrate");

    assert!(favorites.toggle(&alice, "Golden Bear Cafe").await.expect("add"));
    assert!(!favorites.toggle(&alice, "Golden Bear Cafe").await.expect("remove"));

    let after = favorites.hydrate(&alice).await.expect("rehydrate");
    assert_eq!(before, after);
}

#[rstest]
#[tokio::test]
async fn toggle_persists_full_set_immediately(alice: IdentityId) {
    let cache = Arc::new(MapCache::default());
    let favorites = FavoritesCache::new(Arc::clone(&cache));

    favorites.toggle(&alice, "Golden Bear Cafe").await.expect("add");
    favorites.toggle(&alice, "Brewed Awakening").await.expect("add");

    let stored = cache.entries().get("favorites_alice").cloned();
    assert_eq!(
        stored.as_deref(),
        Some(r#"["Brewed Awakening","Golden Bear Cafe"]"#)
    );
}

#[rstest]
#[tokio::test]
async fn toggle_for_another_identity_keeps_the_loaded_view(alice: IdentityId) {
    let cache = Arc::new(MapCache::with_entry("favorites_bob", r#"["Sliver"]"#));
    let favorites = FavoritesCache::new(Arc::clone(&cache));
    favorites.toggle(&alice, "Cheese Board").await.expect("toggle alice");

    let bob = IdentityId::new("bob").expect("id");
    let is_favorite = favorites.toggle(&bob, "Golden Bear Cafe").await.expect("toggle");

    assert!(is_favorite);
    let current = favorites.current().await.expect("loaded");
    assert_eq!(current, FavoriteSet::from_iter(["Cheese Board"]));
    let stored = cache.entries().get("favorites_bob").cloned();
    assert_eq!(stored.as_deref(), Some(r#"["Golden Bear Cafe","Sliver"]"#));
}

#[rstest]
#[tokio::test]
async fn failed_persist_keeps_memory_unchanged(alice: IdentityId) {
    let mut cache = MockLocalCache::new();
    cache.expect_get().returning(|_| Ok(None));
    cache
        .expect_set()
        .return_once(|_, _| Err(LocalCacheError::backend("disk full")));
    let favorites = FavoritesCache::new(Arc::new(cache));
    favorites.hydrate(&alice).await.expect("hydrate");

    let error = favorites
        .toggle(&alice, "Golden Bear Cafe")
        .await
        .expect_err("persist fails");

    assert_eq!(error.code(), ErrorCode::InternalError);
    assert_eq!(favorites.current().await, Some(FavoriteSet::default()));
}

#[rstest]
#[tokio::test]
async fn blank_vendor_names_are_rejected(alice: IdentityId) {
    let favorites = FavoritesCache::new(Arc::new(MapCache::default()));
    let error = favorites.toggle(&alice, "  ").await.expect_err("blank");
    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn session_changes_hydrate_and_clear(alice: IdentityId) {
    let cache = MapCache::with_entry("favorites_alice", r#"["Golden Bear Cafe"]"#);
    let favorites = FavoritesCache::new(Arc::new(cache));
    let context = SessionContext {
        identity: Identity {
            id: alice.clone(),
            email: Email::new("alice@berkeley.edu").expect("email"),
            role: Role::Student,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        },
        profile: Profile::Student(StudentProfile::fallback(alice)),
        degraded: false,
    };

    favorites
        .on_session_change(&SessionState::Authenticated(context))
        .await
        .expect("hydrate on sign-in");
    assert_eq!(favorites.current().await.map(|set| set.len()), Some(1));

    favorites
        .on_session_change(&SessionState::Anonymous)
        .await
        .expect("clear on sign-out");
    assert_eq!(favorites.current().await, None);
}
