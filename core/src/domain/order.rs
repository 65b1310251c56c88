//! Reservations and their fulfilment state machine.
//!
//! Orders move `pending → ready → completed`; `cancelled` is reachable from
//! `pending` or `ready`. `completed` and `cancelled` are terminal.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Error, IdentityId, MenuItem, Money, Role, SessionContext};

/// Identifier of an order document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Mint a fresh identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Fulfilment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Reserved, awaiting preparation.
    Pending,
    /// Ready for pickup.
    Ready,
    /// Picked up.
    Completed,
    /// Withdrawn by the student or vendor.
    Cancelled,
}

impl OrderStatus {
    /// Stored string representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further mutation.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether the order is still in progress.
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether `self → next` is a legal transition.
    ///
    /// # Examples
    /// ```
    /// use savorly_core::domain::OrderStatus;
    ///
    /// assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Ready));
    /// assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
    /// assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
    /// ```
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Ready)
                | (Self::Ready, Self::Completed)
                | (Self::Pending | Self::Ready, Self::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOrderStatusError {
    /// The unrecognised input value.
    pub input: String,
}

impl fmt::Display for ParseOrderStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown order status: {}", self.input)
    }
}

impl std::error::Error for ParseOrderStatusError {}

impl FromStr for OrderStatus {
    type Err = ParseOrderStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseOrderStatusError {
                input: s.to_owned(),
            }),
        }
    }
}

/// A reservation placed by a student against a vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order identifier, also the document id under `orders/`.
    pub id: OrderId,
    /// Reserving student.
    pub student_id: IdentityId,
    /// Fulfilling vendor.
    pub vendor_id: IdentityId,
    /// Name of the reserved item at reservation time.
    pub item_name: String,
    /// Discounted price charged.
    pub item_price: Money,
    /// Servings reserved.
    pub servings: u32,
    /// Fulfilment status.
    pub status: OrderStatus,
    /// Reservation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last status change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Validation failures for reservation requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationValidationError {
    /// Item name was blank.
    EmptyItemName,
    /// Price was negative.
    NegativePrice,
    /// At least one serving must be reserved.
    ZeroServings,
    /// Students cannot reserve from themselves.
    SelfReservation,
}

impl fmt::Display for ReservationValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyItemName => write!(f, "item name must not be empty"),
            Self::NegativePrice => write!(f, "discount price must not be negative"),
            Self::ZeroServings => write!(f, "servings must be at least 1"),
            Self::SelfReservation => write!(f, "student and vendor must differ"),
        }
    }
}

impl std::error::Error for ReservationValidationError {}

/// Input to [`crate::domain::OrderWriter::reserve`].
///
/// ## Invariants
/// - `item_name` is trimmed and non-empty.
/// - `discount_price` is not negative.
/// - `servings` is at least 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequest {
    student_id: IdentityId,
    vendor_id: IdentityId,
    item_name: String,
    discount_price: Money,
    servings: u32,
}

impl ReservationRequest {
    /// Validate raw reservation input.
    pub fn new(
        student_id: IdentityId,
        vendor_id: IdentityId,
        item_name: &str,
        discount_price: Money,
        servings: u32,
    ) -> Result<Self, ReservationValidationError> {
        let trimmed_name = item_name.trim();
        if trimmed_name.is_empty() {
            return Err(ReservationValidationError::EmptyItemName);
        }
        if discount_price.is_negative() {
            return Err(ReservationValidationError::NegativePrice);
        }
        if servings == 0 {
            return Err(ReservationValidationError::ZeroServings);
        }
        if student_id == vendor_id {
            return Err(ReservationValidationError::SelfReservation);
        }
        Ok(Self {
            student_id,
            vendor_id,
            item_name: trimmed_name.to_owned(),
            discount_price,
            servings,
        })
    }

    /// Build a request for `item` on behalf of a signed-in student.
    ///
    /// Fails with `forbidden` for vendor sessions and `invalid_request` when
    /// the item is unavailable or the input is invalid.
    pub fn for_item(
        session: &SessionContext,
        item: &MenuItem,
        servings: u32,
    ) -> Result<Self, Error> {
        session.require_role(Role::Student)?;
        if !item.is_available {
            return Err(Error::invalid_request(format!(
                "menu item {} is not available",
                item.id
            )));
        }
        Self::new(
            session.identity_id().clone(),
            item.vendor_id.clone(),
            &item.name,
            item.discount_price,
            servings,
        )
        .map_err(|err| Error::invalid_request(err.to_string()))
    }

    /// Reserving student.
    pub fn student_id(&self) -> &IdentityId {
        &self.student_id
    }

    /// Fulfilling vendor.
    pub fn vendor_id(&self) -> &IdentityId {
        &self.vendor_id
    }

    /// Item name.
    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    /// Discounted price.
    pub fn discount_price(&self) -> Money {
        self.discount_price
    }

    /// Servings reserved.
    pub fn servings(&self) -> u32 {
        self.servings
    }

    /// Pending order for this request.
    pub fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            student_id: self.student_id,
            vendor_id: self.vendor_id,
            item_name: self.item_name,
            item_price: self.discount_price,
            servings: self.servings,
            status: OrderStatus::Pending,
            created_at,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::{Email, ErrorCode, Identity, MenuItemId, Profile, StudentProfile};
    use rstest::rstest;

    fn id(raw: &str) -> IdentityId {
        IdentityId::new(raw).expect("id")
    }

    fn session(role: Role) -> SessionContext {
        let identity_id = id("alice");
        SessionContext {
            identity: Identity {
                id: identity_id.clone(),
                email: Email::new("alice@berkeley.edu").expect("email"),
                role,
                created_at: DateTime::<Utc>::UNIX_EPOCH,
            },
            profile: Profile::Student(StudentProfile::fallback(identity_id)),
            degraded: false,
        }
    }

    fn item(is_available: bool) -> MenuItem {
        MenuItem {
            id: MenuItemId::random(),
            vendor_id: id("cafe"),
            name: "Pad Thai".to_owned(),
            description: String::new(),
            price: Money::from_cents(1299),
            discount_price: Money::from_cents(629),
            serves: 1,
            is_available,
        }
    }

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Ready, true)]
    #[case(OrderStatus::Ready, OrderStatus::Completed, true)]
    #[case(OrderStatus::Pending, OrderStatus::Cancelled, true)]
    #[case(OrderStatus::Ready, OrderStatus::Cancelled, true)]
    #[case(OrderStatus::Pending, OrderStatus::Completed, false)]
    #[case(OrderStatus::Ready, OrderStatus::Pending, false)]
    #[case(OrderStatus::Completed, OrderStatus::Cancelled, false)]
    #[case(OrderStatus::Cancelled, OrderStatus::Ready, false)]
    fn status_transitions(
        #[case] from: OrderStatus,
        #[case] to: OrderStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[rstest]
    #[case("", 629, 1, ReservationValidationError::EmptyItemName)]
    #[case("Pad Thai", -1, 1, ReservationValidationError::NegativePrice)]
    #[case("Pad Thai", 629, 0, ReservationValidationError::ZeroServings)]
    fn invalid_requests_are_rejected(
        #[case] name: &str,
        #[case] cents: i64,
        #[case] servings: u32,
        #[case] expected: ReservationValidationError,
    ) {
        let err = ReservationRequest::new(
            id("alice"),
            id("cafe"),
            name,
            Money::from_cents(cents),
            servings,
        )
        .expect_err("invalid request");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn for_item_copies_item_terms() {
        let request = ReservationRequest::for_item(&session(Role::Student), &item(true), 2)
            .expect("valid request");
        assert_eq!(request.vendor_id(), &id("cafe"));
        assert_eq!(request.discount_price(), Money::from_cents(629));

        let order = request.into_order(OrderId::random(), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.servings, 2);
    }

    #[rstest]
    #[case(Role::Vendor, true, ErrorCode::Forbidden)]
    #[case(Role::Student, false, ErrorCode::InvalidRequest)]
    fn for_item_guards_role_and_availability(
        #[case] role: Role,
        #[case] available: bool,
        #[case] expected: ErrorCode,
    ) {
        let err = ReservationRequest::for_item(&session(role), &item(available), 1)
            .expect_err("rejected");
        assert_eq!(err.code(), expected);
    }

    #[rstest]
    fn order_serialises_status_lowercase() {
        let order = ReservationRequest::new(id("alice"), id("cafe"), "Soup", Money::ZERO, 1)
            .expect("valid")
            .into_order(OrderId::random(), DateTime::<Utc>::UNIX_EPOCH);
        let value = serde_json::to_value(&order).expect("serialise");
        assert_eq!(value["status"], serde_json::json!("pending"));
        assert_eq!(value["studentId"], serde_json::json!("alice"));
        assert!(value.get("updatedAt").is_none());
    }
}
