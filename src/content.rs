use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::response::{ok, ApiError, ApiResult, Envelope};
use crate::state::AppState;

pub const KIND_PRIVACY_POLICY: &str = "privacy_policy";
pub const KIND_ABOUT_US: &str = "about_us";
pub const KIND_TERMS: &str = "terms";

/// Static page maintained out-of-band. The API only ever serves the latest
/// row per kind.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContentPage {
    pub id: Uuid,
    pub kind: String,
    pub description: String,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl ContentPage {
    pub async fn latest_by_kind(db: &PgPool, kind: &str) -> anyhow::Result<Option<ContentPage>> {
        let row = sqlx::query_as::<_, ContentPage>(
            r#"
            SELECT id, kind, description, image_url, last_updated
            FROM content_pages
            WHERE kind = $1
            ORDER BY last_updated DESC
            LIMIT 1
            "#,
        )
        .bind(kind)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/content/privacy-policy", get(privacy_policy))
        .route("/content/about-us", get(about_us))
        .route("/content/terms", get(terms))
}

async fn serve_page(
    state: &AppState,
    kind: &str,
) -> ApiResult<(StatusCode, Json<Envelope<ContentPage>>)> {
    let page = ContentPage::latest_by_kind(&state.db, kind)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::NotFound("Content not found.".into()))?;
    Ok(ok("Content retrieved successfully.", page))
}

#[instrument(skip(state))]
async fn privacy_policy(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<Envelope<ContentPage>>)> {
    serve_page(&state, KIND_PRIVACY_POLICY).await
}

#[instrument(skip(state))]
async fn about_us(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<Envelope<ContentPage>>)> {
    serve_page(&state, KIND_ABOUT_US).await
}

#[instrument(skip(state))]
async fn terms(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<Envelope<ContentPage>>)> {
    serve_page(&state, KIND_TERMS).await
}
