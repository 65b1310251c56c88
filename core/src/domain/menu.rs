//! Vendor menu items.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{IdentityId, Money};

/// Identifier of a menu item document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuItemId(Uuid);

impl MenuItemId {
    /// Mint a fresh identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for MenuItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A surplus meal listed by a vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    /// Item identifier.
    pub id: MenuItemId,
    /// Owning vendor.
    pub vendor_id: IdentityId,
    /// Item name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Regular price.
    pub price: Money,
    /// Surplus price charged on reservation.
    pub discount_price: Money,
    /// Servings available per reservation unit.
    pub serves: u32,
    /// Whether students may currently reserve the item.
    pub is_available: bool,
}

/// Validation failures for new menu items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItemValidationError {
    /// Name was blank.
    EmptyName,
    /// A price was negative.
    NegativePrice,
    /// Discount price exceeded the regular price.
    DiscountAbovePrice,
    /// Item must serve at least one person.
    ZeroServes,
}

impl fmt::Display for MenuItemValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "menu item name must not be empty"),
            Self::NegativePrice => write!(f, "menu item prices must not be negative"),
            Self::DiscountAbovePrice => {
                write!(f, "discount price must not exceed the regular price")
            }
            Self::ZeroServes => write!(f, "menu item must serve at least one person"),
        }
    }
}

impl std::error::Error for MenuItemValidationError {}

/// Vendor input for a new menu item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMenuItem {
    /// Item name; trimmed on validation.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Regular price.
    pub price: Money,
    /// Surplus price.
    pub discount_price: Money,
    /// Servings per unit.
    pub serves: u32,
}

impl NewMenuItem {
    /// Validate the input and build an available item owned by `vendor_id`.
    pub fn into_item(
        self,
        id: MenuItemId,
        vendor_id: IdentityId,
    ) -> Result<MenuItem, MenuItemValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(MenuItemValidationError::EmptyName);
        }
        if self.price.is_negative() || self.discount_price.is_negative() {
            return Err(MenuItemValidationError::NegativePrice);
        }
        if self.discount_price > self.price {
            return Err(MenuItemValidationError::DiscountAbovePrice);
        }
        if self.serves == 0 {
            return Err(MenuItemValidationError::ZeroServes);
        }
        Ok(MenuItem {
            id,
            vendor_id,
            name: name.to_owned(),
            description: self.description,
            price: self.price,
            discount_price: self.discount_price,
            serves: self.serves,
            is_available: true,
        })
    }
}
