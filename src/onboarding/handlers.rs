use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::services::AuthUser,
    onboarding::{
        dto::{CoachingStyleResponse, OnboardingRequest, OnboardingResponse},
        repo::{CoachingStyle, OnboardingStep},
    },
    response::{created, ok, ApiError, ApiResult, Envelope},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/coaching-styles", get(list_coaching_styles))
        .route("/onboarding", get(get_onboarding).post(save_onboarding))
}

#[instrument(skip(state))]
async fn list_coaching_styles(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> ApiResult<(StatusCode, Json<Envelope<Vec<CoachingStyleResponse>>>)> {
    let styles = CoachingStyle::list_active(&state.db)
        .await
        .map_err(ApiError::Internal)?;
    let items = styles.into_iter().map(CoachingStyleResponse::from).collect();
    Ok(ok("Coaching styles retrieved successfully.", items))
}

#[instrument(skip(state))]
async fn get_onboarding(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<(StatusCode, Json<Envelope<OnboardingResponse>>)> {
    let step = OnboardingStep::get_by_user(&state.db, user_id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::NotFound("Onboarding has not been completed.".into()))?;
    Ok(ok("Onboarding retrieved successfully.", step.into()))
}

#[instrument(skip(state, payload))]
async fn save_onboarding(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<OnboardingRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<OnboardingResponse>>)> {
    let style = CoachingStyle::find_active_by_value(&state.db, &payload.coaching_style)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::field("coaching_style", "Unknown coaching style."))?;

    let focus = serde_json::to_value(&payload.focus).map_err(|e| ApiError::Internal(e.into()))?;

    let (step, was_created) = OnboardingStep::upsert(&state.db, user_id, &style, &focus)
        .await
        .map_err(ApiError::Internal)?;

    info!(user_id = %user_id, style = %style.value, created = was_created, "onboarding saved");
    if was_created {
        Ok(created("Onboarding saved successfully.", step.into()))
    } else {
        Ok(ok("Onboarding updated successfully.", step.into()))
    }
}
