//! In-process adapters.
//!
//! These adapters keep all state in memory and honour the same contracts as
//! hosted backends, including revision preconditions and the live
//! authentication stream. Each also exposes a switch for simulating an
//! unreachable backend.

mod identity_provider;
mod local_cache;
mod remote_store;

pub use identity_provider::MemoryIdentityProvider;
pub use local_cache::MemoryLocalCache;
pub use remote_store::MemoryRemoteStore;
