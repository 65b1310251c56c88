//! Outbound adapters implementing domain ports.
//!
//! - **file_cache**: the device-local cache persisted as one file per key
//!   under a capability-scoped directory
//! - **memory**: in-process remote store, identity provider and local cache
//!   used by tests and the demo binary (feature `test-support`)
//!
//! Adapters translate between port types and their backing storage. They
//! contain no business logic.

pub mod file_cache;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
