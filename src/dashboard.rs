use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tracing::instrument;

use crate::auth::services::{require_staff, AuthUser};
use crate::response::{ok, ApiError, ApiResult, Envelope};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub total_users: i64,
    /// Signups this calendar month vs last, as a percentage.
    pub customer_growth_rate: f64,
    pub verified_users: i64,
    pub moods_today: i64,
}

/// Month-over-month growth as a percentage, rounded to 2 decimals.
/// An empty previous month reads as 0.0 rather than infinity.
pub fn growth_rate(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    let rate = (current - previous) as f64 / previous as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

/// Recomputed on every request. Counts are cheap at this scale and stale
/// admin numbers are worse than the extra queries.
pub async fn compute_metrics(db: &PgPool) -> anyhow::Result<DashboardMetrics> {
    let (total_users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await?;
    let (verified_users,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE is_verified = TRUE")
            .fetch_one(db)
            .await?;
    let (moods_today,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM mood_entries WHERE entry_date = CURRENT_DATE")
            .fetch_one(db)
            .await?;

    let (this_month, last_month): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE created_at >= date_trunc('month', now())),
            COUNT(*) FILTER (
                WHERE created_at >= date_trunc('month', now()) - INTERVAL '1 month'
                  AND created_at < date_trunc('month', now())
            )
        FROM users
        "#,
    )
    .fetch_one(db)
    .await?;

    Ok(DashboardMetrics {
        total_users,
        customer_growth_rate: growth_rate(this_month, last_month),
        verified_users,
        moods_today,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard/metrics", get(dashboard_metrics))
}

#[instrument(skip(state))]
async fn dashboard_metrics(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<(StatusCode, Json<Envelope<DashboardMetrics>>)> {
    require_staff(&state, user_id).await?;
    let metrics = compute_metrics(&state.db)
        .await
        .map_err(ApiError::Internal)?;
    Ok(ok("Dashboard metrics retrieved successfully.", metrics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_rate_doubling_is_one_hundred_percent() {
        assert_eq!(growth_rate(10, 5), 100.0);
    }

    #[test]
    fn growth_rate_shrinking_is_negative() {
        assert_eq!(growth_rate(5, 10), -50.0);
    }

    #[test]
    fn growth_rate_with_empty_previous_month_is_zero() {
        assert_eq!(growth_rate(42, 0), 0.0);
    }

    #[test]
    fn growth_rate_rounds_to_two_decimals() {
        assert_eq!(growth_rate(1, 3), -66.67);
    }
}
