//! Product domain types and inventory arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use atelier_core::{Money, ProductId};

/// A product image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    #[serde(default)]
    pub alt: String,
}

/// Stock held for one color × size combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub color: String,
    pub size: String,
    pub quantity: i32,
}

impl InventoryItem {
    fn matches(&self, color: &str, size: &str) -> bool {
        self.color.trim().eq_ignore_ascii_case(color.trim())
            && self.size.trim().eq_ignore_ascii_case(size.trim())
    }
}

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub category: String,
    pub subcategory: Option<String>,
    pub images: Vec<ProductImage>,
    pub inventory: Vec<InventoryItem>,
    pub total_stock: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// First image URL, used for order snapshots.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(|image| image.url.as_str())
    }

    /// Stock available for a color × size combination (0 when not stocked).
    #[must_use]
    pub fn available(&self, color: &str, size: &str) -> i32 {
        self.inventory
            .iter()
            .find(|item| item.matches(color, size))
            .map_or(0, |item| item.quantity)
    }
}

/// Validated product fields for create/update.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub category: String,
    pub subcategory: Option<String>,
    pub images: Vec<ProductImage>,
    pub inventory: Vec<InventoryItem>,
    pub is_active: bool,
    pub is_featured: bool,
}

/// Inventory list validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("inventory color and size must not be empty")]
    BlankVariant,

    #[error("inventory quantity for {color}/{size} must not be negative")]
    NegativeQuantity { color: String, size: String },

    #[error("inventory lists {color}/{size} more than once")]
    DuplicateVariant { color: String, size: String },

    #[error("inventory quantity for {color}/{size} must be at most {}", MAX_SLOT_QUANTITY)]
    QuantityTooLarge { color: String, size: String },

    #[error("total inventory must be at most {}", i32::MAX)]
    TotalTooLarge,
}

/// Largest quantity one color × size slot may hold.
pub const MAX_SLOT_QUANTITY: i32 = 1_000_000;

/// Stock errors raised while placing or cancelling orders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("{color}/{size} is not stocked")]
    UnknownVariant { color: String, size: String },

    #[error("only {available} left in {color}/{size}")]
    Insufficient {
        color: String,
        size: String,
        available: i32,
    },
}

fn stock_sum(inventory: &[InventoryItem]) -> i64 {
    inventory
        .iter()
        .map(|item| i64::from(item.quantity.max(0)))
        .sum()
}

/// Sum of all slot quantities; the value stored in `total_stock`.
///
/// Saturates at `i32::MAX`; validated inventories never reach it.
#[must_use]
pub fn total_stock(inventory: &[InventoryItem]) -> i32 {
    i32::try_from(stock_sum(inventory)).unwrap_or(i32::MAX)
}

/// Check slot invariants: non-blank variants, quantities within
/// `0..=MAX_SLOT_QUANTITY`, each color × size pair at most once
/// (case-insensitive), and a total that fits the `total_stock` column.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_inventory(inventory: &[InventoryItem]) -> Result<(), InventoryError> {
    for (i, item) in inventory.iter().enumerate() {
        if item.color.trim().is_empty() || item.size.trim().is_empty() {
            return Err(InventoryError::BlankVariant);
        }
        if item.quantity < 0 {
            return Err(InventoryError::NegativeQuantity {
                color: item.color.clone(),
                size: item.size.clone(),
            });
        }
        if item.quantity > MAX_SLOT_QUANTITY {
            return Err(InventoryError::QuantityTooLarge {
                color: item.color.clone(),
                size: item.size.clone(),
            });
        }
        if inventory
            .iter()
            .skip(i + 1)
            .any(|other| other.matches(&item.color, &item.size))
        {
            return Err(InventoryError::DuplicateVariant {
                color: item.color.clone(),
                size: item.size.clone(),
            });
        }
    }
    if stock_sum(inventory) > i64::from(i32::MAX) {
        return Err(InventoryError::TotalTooLarge);
    }
    Ok(())
}

/// Remove `quantity` units from a slot.
///
/// # Errors
///
/// Returns `StockError` if the slot does not exist or holds too few units;
/// the inventory is left untouched in that case.
pub fn take_stock(
    inventory: &mut [InventoryItem],
    color: &str,
    size: &str,
    quantity: i32,
) -> Result<(), StockError> {
    let slot = inventory
        .iter_mut()
        .find(|item| item.matches(color, size))
        .ok_or_else(|| StockError::UnknownVariant {
            color: color.to_string(),
            size: size.to_string(),
        })?;

    if slot.quantity < quantity {
        return Err(StockError::Insufficient {
            color: slot.color.clone(),
            size: slot.size.clone(),
            available: slot.quantity,
        });
    }

    slot.quantity -= quantity;
    Ok(())
}

/// Return `quantity` units to a slot, recreating it if it was removed since
/// the order was placed.
pub fn restock(inventory: &mut Vec<InventoryItem>, color: &str, size: &str, quantity: i32) {
    if let Some(slot) = inventory.iter_mut().find(|item| item.matches(color, size)) {
        slot.quantity = slot.quantity.saturating_add(quantity);
    } else {
        inventory.push(InventoryItem {
            color: color.to_string(),
            size: size.to_string(),
            quantity,
        });
    }
}
