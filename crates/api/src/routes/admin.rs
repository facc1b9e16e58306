//! Admin dashboard routes.

use axum::extract::State;

use crate::db::StatsRepository;
use crate::error::Result;
use crate::middleware::RequireStaff;
use crate::models::DashboardStats;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/admin/stats
pub async fn stats(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<ApiResponse<DashboardStats>> {
    let stats = StatsRepository::new(state.pool())
        .dashboard(state.config().store.low_stock_threshold)
        .await?;
    Ok(ApiResponse::ok(stats))
}
