//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod cache_key;
mod identity_provider;
mod local_cache;
mod remote_store;

pub use cache_key::{CacheKey, CacheKeyValidationError};
#[cfg(test)]
pub use identity_provider::MockIdentityProvider;
pub use identity_provider::{AuthUser, IdentityProvider, IdentityProviderError};
#[cfg(test)]
pub use local_cache::MockLocalCache;
pub use local_cache::{LocalCache, LocalCacheError};
#[cfg(test)]
pub use remote_store::MockRemoteStore;
pub use remote_store::{RemoteStore, RemoteStoreError};
