//! Dashboard aggregation queries, computed on every read.

use sqlx::PgPool;

use atelier_core::{Money, OrderStatus, ProductId};

use super::{OrderRepository, ProductRepository, RepositoryError};
use crate::models::stats::{
    DashboardStats, LowStockProduct, MonthlyRevenue, StatusCount, TopProduct, Totals,
    complete_status_counts,
};

const TOP_PRODUCTS: i64 = 5;
const RECENT_ORDERS: i64 = 5;
const LOW_STOCK_LIMIT: i64 = 20;

/// Repository for admin dashboard statistics.
pub struct StatsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsRepository<'a> {
    /// Create a new stats repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Everything the dashboard shows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    #[tracing::instrument(skip(self))]
    pub async fn dashboard(
        &self,
        low_stock_threshold: i32,
    ) -> Result<DashboardStats, RepositoryError> {
        let totals = self.totals().await?;
        let orders_by_status = self.orders_by_status().await?;
        let monthly_revenue = self.monthly_revenue().await?;
        let top_products = self.top_products().await?;
        let low_stock = ProductRepository::new(self.pool)
            .low_stock(low_stock_threshold, LOW_STOCK_LIMIT)
            .await?
            .into_iter()
            .map(LowStockProduct::from)
            .collect();
        let recent_orders = OrderRepository::new(self.pool).recent(RECENT_ORDERS).await?;

        Ok(DashboardStats {
            totals,
            orders_by_status,
            monthly_revenue,
            top_products,
            low_stock,
            recent_orders,
        })
    }

    async fn totals(&self) -> Result<Totals, RepositoryError> {
        let (orders, revenue) = sqlx::query_as::<_, (i64, Money)>(
            r"
            SELECT
                COUNT(*),
                COALESCE(SUM(total) FILTER (WHERE status NOT IN ('cancelled', 'refunded')), 0)
            FROM atelier.order
            ",
        )
        .fetch_one(self.pool)
        .await?;

        let customers = sqlx::query_scalar::<_, i64>(
            r"SELECT COUNT(*) FROM atelier.user WHERE role = 'customer'",
        )
        .fetch_one(self.pool)
        .await?;

        let active_products = sqlx::query_scalar::<_, i64>(
            r"SELECT COUNT(*) FROM atelier.product WHERE is_active",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(Totals {
            orders,
            revenue,
            customers,
            active_products,
        })
    }

    async fn orders_by_status(&self) -> Result<Vec<StatusCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, (OrderStatus, i64)>(
            r"SELECT status, COUNT(*) FROM atelier.order GROUP BY status",
        )
        .fetch_all(self.pool)
        .await?;

        let counts: Vec<StatusCount> = rows
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect();

        Ok(complete_status_counts(&counts))
    }

    /// The last 12 calendar months, oldest first, including empty months.
    async fn monthly_revenue(&self) -> Result<Vec<MonthlyRevenue>, RepositoryError> {
        let rows = sqlx::query_as::<_, (String, Money, i64)>(
            r"
            WITH months AS (
                SELECT generate_series(
                    date_trunc('month', NOW()) - INTERVAL '11 months',
                    date_trunc('month', NOW()),
                    INTERVAL '1 month'
                ) AS month
            )
            SELECT
                to_char(m.month, 'YYYY-MM'),
                COALESCE(SUM(o.total), 0),
                COUNT(o.id)
            FROM months m
            LEFT JOIN atelier.order o
                ON date_trunc('month', o.created_at) = m.month
               AND o.status NOT IN ('cancelled', 'refunded')
            GROUP BY m.month
            ORDER BY m.month
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(month, revenue, orders)| MonthlyRevenue {
                month,
                revenue,
                orders,
            })
            .collect())
    }

    /// Best sellers by units, read from the order item snapshots.
    async fn top_products(&self) -> Result<Vec<TopProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, (ProductId, String, i64, Money)>(
            r"
            SELECT
                (item->>'productId')::integer AS product_id,
                MAX(item->>'name') AS name,
                SUM((item->>'quantity')::bigint)::bigint AS quantity_sold,
                SUM((item->>'lineTotal')::numeric) AS revenue
            FROM atelier.order o
            CROSS JOIN LATERAL jsonb_array_elements(o.items) AS item
            WHERE o.status NOT IN ('cancelled', 'refunded')
            GROUP BY 1
            ORDER BY quantity_sold DESC, revenue DESC
            LIMIT $1
            ",
        )
        .bind(TOP_PRODUCTS)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, name, quantity_sold, revenue)| TopProduct {
                product_id,
                name,
                quantity_sold,
                revenue,
            })
            .collect())
    }
}

impl From<crate::models::Product> for LowStockProduct {
    fn from(product: crate::models::Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            slug: product.slug,
            total_stock: product.total_stock,
        }
    }
}
