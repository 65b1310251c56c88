//! Domain primitives, ports and services.
//!
//! Purpose: model identities, profiles, orders and aggregate counters, and
//! implement the session, favourites and reservation workflows against the
//! ports in [`ports`]. Nothing here performs I/O directly.
//!
//! Public surface:
//! - Error / ErrorCode: stable failure taxonomy returned by every service.
//! - SessionManager: sign-up, sign-in, sign-out and the observable session.
//! - RoleResolver: sign-up profile planning and the materialisation saga.
//! - MetricsAggregator / MetricsReconciler: counter increments and repair.
//! - OrderWriter: the reservation saga.
//! - FavoritesCache: device-local favourite vendors.
//! - OrderStatusService / MenuService: fulfilment and menu management.

pub mod ports;

mod auth;
mod document;
pub mod error;
mod favorites;
mod identity;
mod menu;
mod menu_service;
mod metrics;
mod metrics_aggregator;
mod metrics_reconciler;
mod money;
mod order;
mod order_status_service;
mod order_writer;
mod port_error_mapping;
mod profile;
mod role_resolver;
mod session;
mod session_manager;

pub use self::auth::{Credentials, CredentialsValidationError};
pub use self::document::{
    CollectionPath, Document, DocumentData, DocumentPath, Filter, OrderBy, PathValidationError,
    SortDirection, WriteOptions,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::favorites::{FavoriteSet, FavoritesCache};
pub use self::identity::{Email, Identity, IdentityId, IdentityValidationError, ParseRoleError, Role};
pub use self::menu::{MenuItem, MenuItemId, MenuItemValidationError, NewMenuItem};
pub use self::menu_service::MenuService;
pub use self::metrics::{METRICS_FIELD, MetricDeltas, MetricKey, MetricsEntity, MetricsSnapshot};
pub use self::metrics_aggregator::{
    ConcurrencyMode, DEFAULT_MAX_ATTEMPTS, MetricsAggregator, ParseConcurrencyModeError,
};
pub use self::metrics_reconciler::MetricsReconciler;
pub use self::money::{Money, ParseMoneyError};
pub use self::order::{
    Order, OrderId, OrderStatus, ParseOrderStatusError, ReservationRequest,
    ReservationValidationError,
};
pub use self::order_status_service::OrderStatusService;
pub use self::order_writer::{
    AggregateFailurePolicy, OrderWriter, ParseAggregateFailurePolicyError,
};
pub use self::profile::{
    Profile, Ratings, RoleData, StudentDetails, StudentMetrics, StudentProfile, UserHeader,
    VendorDetails, VendorMetrics, VendorProfile,
};
pub use self::role_resolver::{ProfilePlan, RoleResolver};
pub use self::session::{Lifecycle, SessionContext, SessionState};
pub use self::session_manager::SessionManager;

/// Result alias used by domain services.
///
/// # Examples
/// ```
/// use savorly_core::domain::{DomainResult, Error};
///
/// fn reject() -> DomainResult<()> {
///     Err(Error::forbidden("vendors only"))
/// }
/// assert!(reject().is_err());
/// ```
pub type DomainResult<T> = Result<T, Error>;
