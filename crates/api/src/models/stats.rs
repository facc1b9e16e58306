//! Admin dashboard statistics.

use serde::Serialize;

use atelier_core::{Money, OrderStatus, ProductId};

use super::order::Order;

/// Everything the admin dashboard shows, computed on read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub totals: Totals,
    pub orders_by_status: Vec<StatusCount>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub top_products: Vec<TopProduct>,
    pub low_stock: Vec<LowStockProduct>,
    pub recent_orders: Vec<Order>,
}

/// Headline counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub orders: i64,
    /// Sum of order totals, excluding cancelled and refunded orders.
    pub revenue: Money,
    pub customers: i64,
    pub active_products: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Revenue for one calendar month, `month` formatted `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenue {
    pub month: String,
    pub revenue: Money,
    pub orders: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    pub quantity_sold: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockProduct {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub total_stock: i32,
}

/// Fill in statuses with no orders so the dashboard always shows all seven.
#[must_use]
pub fn complete_status_counts(counts: &[StatusCount]) -> Vec<StatusCount> {
    OrderStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: counts
                .iter()
                .find(|c| c.status == status)
                .map_or(0, |c| c.count),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_status_counts_fills_gaps_in_order() {
        let counts = vec![
            StatusCount {
                status: OrderStatus::Shipped,
                count: 4,
            },
            StatusCount {
                status: OrderStatus::Pending,
                count: 2,
            },
        ];
        let complete = complete_status_counts(&counts);
        assert_eq!(complete.len(), 7);
        assert_eq!(complete.first().map(|c| (c.status, c.count)), Some((OrderStatus::Pending, 2)));
        assert_eq!(
            complete.iter().find(|c| c.status == OrderStatus::Shipped).map(|c| c.count),
            Some(4)
        );
        assert!(complete.iter().filter(|c| c.count == 0).count() == 5);
    }
}
