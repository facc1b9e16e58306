//! Order creation.
//!
//! Placing an order runs in one transaction: the referenced products are
//! locked in ascending id order, stock is taken from the in-memory copies,
//! the new inventories are written back, and the order is inserted with its
//! snapshot line items. Quotes run the same allocation against unlocked
//! copies and write nothing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument};

use atelier_core::{Money, OrderStatus, PaymentMethod, ProductId, UserId, round_money};

use crate::config::StoreConfig;
use crate::db::orders::NewOrder;
use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::models::order::{Order, OrderItem, PaymentInfo, ShippingAddress, StatusHistoryEntry};
use crate::models::product::{self, Product, StockError};

/// Largest quantity of one line.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Note on the first history entry of every order.
const ORDER_PLACED_NOTE: &str = "Order placed";

/// One line of the shopper's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub color: String,
    pub size: String,
    pub quantity: i32,
}

/// A checkout request as posted by the storefront.
///
/// This is also the cart snapshot stored on a PayU attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
    #[serde(default = "default_method")]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

const fn default_method() -> PaymentMethod {
    PaymentMethod::Cod
}

/// Errors that stop an order from being placed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("quantity for product {product_id} must be between 1 and 99")]
    InvalidQuantity { product_id: ProductId, quantity: i32 },

    #[error("shipping address is missing: {}", .0.join(", "))]
    IncompleteAddress(Vec<&'static str>),

    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),

    #[error("{product}: {source}")]
    OutOfStock {
        product: String,
        #[source]
        source: StockError,
    },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Priced lines and totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
}

/// Check the request shape before touching the database.
///
/// # Errors
///
/// Returns the first problem found.
pub fn validate(request: &CheckoutRequest) -> Result<(), CheckoutError> {
    if request.items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    if let Some(line) = request
        .items
        .iter()
        .find(|line| !(1..=MAX_LINE_QUANTITY).contains(&line.quantity))
    {
        return Err(CheckoutError::InvalidQuantity {
            product_id: line.product_id,
            quantity: line.quantity,
        });
    }

    let missing = request.shipping_address.missing_fields();
    if !missing.is_empty() {
        return Err(CheckoutError::IncompleteAddress(missing));
    }

    Ok(())
}

/// Flat shipping fee, waived once the subtotal reaches the threshold.
#[must_use]
pub fn shipping_cost(subtotal: Money, store: &StoreConfig) -> Money {
    match store.free_shipping_threshold {
        Some(threshold) if subtotal >= threshold => Money::ZERO,
        _ => store.shipping_fee,
    }
}

/// Take stock for every line from `products` and snapshot the lines.
///
/// `products` is mutated in place; the caller decides whether the new
/// inventories are persisted.
///
/// # Errors
///
/// Returns `CheckoutError::ProductUnavailable` for missing or inactive
/// products and `CheckoutError::OutOfStock` when a slot runs short.
pub fn allocate(
    lines: &[CartLine],
    products: &mut [Product],
) -> Result<Vec<OrderItem>, CheckoutError> {
    lines
        .iter()
        .map(|line| {
            let product = products
                .iter_mut()
                .find(|p| p.id == line.product_id && p.is_active)
                .ok_or(CheckoutError::ProductUnavailable(line.product_id))?;

            product::take_stock(&mut product.inventory, &line.color, &line.size, line.quantity)
                .map_err(|source| CheckoutError::OutOfStock {
                    product: product.name.clone(),
                    source,
                })?;
            product.total_stock = product::total_stock(&product.inventory);

            Ok(OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                price: product.price,
                image: product.primary_image().map(str::to_string),
                color: line.color.trim().to_string(),
                size: line.size.trim().to_string(),
                quantity: line.quantity,
                line_total: round_money(product.price * Money::from(line.quantity)),
            })
        })
        .collect()
}

/// Sum line totals and apply shipping.
#[must_use]
pub fn price(items: Vec<OrderItem>, store: &StoreConfig) -> Quote {
    let subtotal = round_money(items.iter().map(|item| item.line_total).sum());
    let shipping_cost = shipping_cost(subtotal, store);

    Quote {
        items,
        subtotal,
        shipping_cost,
        total: subtotal + shipping_cost,
    }
}

fn product_ids(request: &CheckoutRequest) -> Vec<ProductId> {
    request.items.iter().map(|line| line.product_id).collect()
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    store: &'a StoreConfig,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, store: &'a StoreConfig) -> Self {
        Self { pool, store }
    }

    /// Price a cart without reserving anything.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` if the cart is invalid or can't be fulfilled
    /// from current stock.
    pub async fn quote(&self, request: &CheckoutRequest) -> Result<Quote, CheckoutError> {
        validate(request)?;

        let mut products = ProductRepository::new(self.pool)
            .get_many(&product_ids(request))
            .await?;
        let items = allocate(&request.items, &mut products)?;

        Ok(price(items, self.store))
    }

    /// Place an order in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` if the cart is invalid, stock is short, or the
    /// database fails; nothing is written in that case.
    #[instrument(skip(self, request, payment), fields(lines = request.items.len()))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
        payment: PaymentInfo,
    ) -> Result<Order, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let order = Self::place_order_in(&mut *tx, self.store, user_id, request, payment).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Order placed"
        );
        Ok(order)
    }

    /// Place an order inside a caller-owned transaction.
    ///
    /// # Errors
    ///
    /// See [`Self::place_order`].
    pub async fn place_order_in(
        conn: &mut PgConnection,
        store: &StoreConfig,
        user_id: UserId,
        request: &CheckoutRequest,
        payment: PaymentInfo,
    ) -> Result<Order, CheckoutError> {
        validate(request)?;

        let mut products = ProductRepository::lock_for_update(conn, &product_ids(request)).await?;
        let items = allocate(&request.items, &mut products)?;

        for product in &products {
            ProductRepository::save_inventory(conn, product.id, &product.inventory).await?;
        }

        let quote = price(items, store);
        let new = NewOrder {
            user_id,
            items: quote.items,
            shipping_address: request.shipping_address.clone(),
            subtotal: quote.subtotal,
            shipping_cost: quote.shipping_cost,
            total: quote.total,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::Pending,
                note: Some(ORDER_PLACED_NOTE.to_string()),
                changed_by: Some(user_id),
                changed_at: Utc::now(),
            }],
            payment,
            notes: request
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        };

        Ok(OrderRepository::insert(conn, &new).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::models::product::{InventoryItem, ProductImage};

    fn dec(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn kurta() -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(7),
            name: "Linen Kurta".to_string(),
            slug: "linen-kurta".to_string(),
            description: String::new(),
            price: dec("1499.50"),
            compare_at_price: None,
            category: "Women".to_string(),
            subcategory: Some("Kurtas".to_string()),
            images: vec![ProductImage {
                url: "/uploads/kurta.jpg".to_string(),
                alt: String::new(),
            }],
            inventory: vec![
                InventoryItem {
                    color: "Indigo".to_string(),
                    size: "M".to_string(),
                    quantity: 3,
                },
                InventoryItem {
                    color: "Indigo".to_string(),
                    size: "L".to_string(),
                    quantity: 1,
                },
            ],
            total_stock: 4,
            is_active: true,
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Asha Rao".to_string(),
            phone: "9876543210".to_string(),
            line1: "12 MG Road".to_string(),
            line2: None,
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            postal_code: "560001".to_string(),
            country: "India".to_string(),
        }
    }

    fn line(size: &str, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(7),
            color: "indigo".to_string(),
            size: size.to_string(),
            quantity,
        }
    }

    fn request(items: Vec<CartLine>) -> CheckoutRequest {
        CheckoutRequest {
            items,
            shipping_address: address(),
            payment_method: PaymentMethod::Cod,
            notes: None,
        }
    }

    fn store(fee: &str, threshold: Option<&str>) -> StoreConfig {
        StoreConfig {
            shipping_fee: dec(fee),
            free_shipping_threshold: threshold.map(dec),
            ..StoreConfig::default()
        }
    }

    #[test]
    fn test_validate_rejects_empty_cart_and_bad_quantities() {
        assert!(matches!(validate(&request(vec![])), Err(CheckoutError::EmptyCart)));
        assert!(matches!(
            validate(&request(vec![line("M", 0)])),
            Err(CheckoutError::InvalidQuantity { quantity: 0, .. })
        ));
        assert!(matches!(
            validate(&request(vec![line("M", 100)])),
            Err(CheckoutError::InvalidQuantity { quantity: 100, .. })
        ));
        assert!(validate(&request(vec![line("M", 99)])).is_ok());
    }

    #[test]
    fn test_validate_reports_missing_address_fields() {
        let mut req = request(vec![line("M", 1)]);
        req.shipping_address.city = "  ".to_string();
        req.shipping_address.postal_code = String::new();

        match validate(&req) {
            Err(CheckoutError::IncompleteAddress(fields)) => {
                assert_eq!(fields, vec!["city", "postalCode"]);
            }
            other => panic!("expected IncompleteAddress, got {other:?}"),
        }
    }

    #[test]
    fn test_allocate_snapshots_and_decrements() {
        let mut products = vec![kurta()];
        let items = allocate(&[line("M", 2)], &mut products).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Linen Kurta");
        assert_eq!(items[0].image.as_deref(), Some("/uploads/kurta.jpg"));
        assert_eq!(items[0].line_total, dec("2999.00"));
        assert_eq!(products[0].available("Indigo", "M"), 1);
        assert_eq!(products[0].total_stock, 2);
    }

    #[test]
    fn test_allocate_counts_repeated_lines_against_same_slot() {
        let mut products = vec![kurta()];
        let result = allocate(&[line("M", 2), line("M", 2)], &mut products);

        assert!(matches!(
            result,
            Err(CheckoutError::OutOfStock {
                source: StockError::Insufficient { available: 1, .. },
                ..
            })
        ));
    }

    #[test]
    fn test_allocate_rejects_inactive_and_unknown_products() {
        let mut inactive = kurta();
        inactive.is_active = false;
        let mut products = vec![inactive];
        assert!(matches!(
            allocate(&[line("M", 1)], &mut products),
            Err(CheckoutError::ProductUnavailable(_))
        ));

        let mut products = vec![kurta()];
        assert!(matches!(
            allocate(&[line("XXL", 1)], &mut products),
            Err(CheckoutError::OutOfStock {
                source: StockError::UnknownVariant { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_price_applies_flat_fee_below_threshold() {
        let mut products = vec![kurta()];
        let items = allocate(&[line("M", 1)], &mut products).unwrap();
        let quote = price(items, &store("99", Some("2000")));

        assert_eq!(quote.subtotal, dec("1499.50"));
        assert_eq!(quote.shipping_cost, dec("99"));
        assert_eq!(quote.total, dec("1598.50"));
    }

    #[test]
    fn test_price_waives_fee_at_threshold() {
        let mut products = vec![kurta()];
        let items = allocate(&[line("M", 2)], &mut products).unwrap();
        let quote = price(items, &store("99", Some("2999")));

        assert_eq!(quote.shipping_cost, Money::ZERO);
        assert_eq!(quote.total, quote.subtotal);
    }

    #[test]
    fn test_no_threshold_always_charges_fee() {
        assert_eq!(shipping_cost(dec("100000"), &store("50", None)), dec("50"));
    }

    #[test]
    fn test_checkout_request_defaults_to_cod() {
        let json = serde_json::json!({
            "items": [{"productId": 7, "color": "Indigo", "size": "M", "quantity": 1}],
            "shippingAddress": {
                "fullName": "Asha Rao", "phone": "9876543210", "line1": "12 MG Road",
                "city": "Bengaluru", "state": "Karnataka", "postalCode": "560001"
            }
        });
        let req: CheckoutRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.payment_method, PaymentMethod::Cod);
        assert_eq!(req.shipping_address.country, "India");
    }
}
