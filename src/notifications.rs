use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::services::{require_staff, AuthUser};
use crate::response::{ok, ApiError, ApiResult, Envelope};
use crate::state::AppState;

pub const EVENT_USER_CREATED: &str = "USER_CREATED";

/// Fire-and-forget record written as a side effect of user creation.
/// Only the read flag ever changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub event: String,
    pub title: String,
    pub message: String,
    pub user_id: Option<Uuid>,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Notification {
    /// Written inside the signup transaction so a failed signup leaves no
    /// orphaned notification behind.
    pub async fn record_user_created(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        email: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (event, title, message, user_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(EVENT_USER_CREATED)
        .bind("New User Registered")
        .bind(format!("A new user with email {email} has registered."))
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn list_recent(db: &PgPool, limit: i64) -> anyhow::Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, event, title, message, user_id, is_read, created_at
            FROM notifications
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn mark_read(db: &PgPool, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", post(mark_notification_read))
}

#[instrument(skip(state))]
async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<(axum::http::StatusCode, Json<Envelope<Vec<Notification>>>)> {
    require_staff(&state, user_id).await?;
    let items = Notification::list_recent(&state.db, 50)
        .await
        .map_err(ApiError::Internal)?;
    Ok(ok("Notifications retrieved successfully.", items))
}

#[instrument(skip(state))]
async fn mark_notification_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<(axum::http::StatusCode, Json<Envelope<()>>)> {
    require_staff(&state, user_id).await?;
    if !Notification::mark_read(&state.db, id)
        .await
        .map_err(ApiError::Internal)?
    {
        return Err(ApiError::NotFound("Notification not found.".into()));
    }
    Ok(crate::response::message_only("Notification marked as read."))
}
