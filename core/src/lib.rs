//! Savorly core: identity and session management, the device-local
//! favourites cache, and counter aggregation kept consistent with the order
//! log.
//!
//! Domain services in [`domain`] depend only on ports. Adapters live in
//! [`outbound`]; runtime knobs are read by [`config`].

pub mod config;
pub mod domain;
pub mod outbound;
