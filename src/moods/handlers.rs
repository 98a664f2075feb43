use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::AuthUser,
    moods::{
        dto::{MoodEntryRequest, MoodEntryResponse, ReportQuery, WeeklyCheckins, WeeklySummary},
        repo::{mood_label, MoodEntry, MoodUpdate},
        report::{build_report, parse_iso_date, resolve_range, MoodReport, ReportRange},
    },
    response::{created, ok, ApiError, ApiResult, Envelope},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/moods", get(list_moods).post(create_mood))
        .route(
            "/moods/:id",
            get(get_mood).put(update_mood).delete(delete_mood),
        )
        .route("/moods/report", get(mood_report))
        .route("/moods/summary", get(weekly_summary))
}

struct ValidatedEntry {
    score: i16,
    label: &'static str,
    feelings: serde_json::Value,
    date: time::Date,
}

fn validate_entry(payload: &MoodEntryRequest) -> Result<ValidatedEntry, ApiError> {
    let label = mood_label(payload.mood_score)
        .ok_or_else(|| ApiError::field("mood_score", "Mood score must be between 0 and 4."))?;
    let date = parse_iso_date(&payload.mood_date, "mood_date")?;
    let feelings = serde_json::to_value(&payload.feel)
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(ValidatedEntry {
        score: payload.mood_score,
        label,
        feelings,
        date,
    })
}

#[instrument(skip(state))]
async fn list_moods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<(StatusCode, Json<Envelope<Vec<MoodEntryResponse>>>)> {
    let entries = MoodEntry::list_by_user(&state.db, user_id)
        .await
        .map_err(ApiError::Internal)?;
    let items = entries.into_iter().map(MoodEntryResponse::from).collect();
    Ok(ok("Mood entries retrieved successfully.", items))
}

#[instrument(skip(state, payload))]
async fn create_mood(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<MoodEntryRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<MoodEntryResponse>>)> {
    let entry = validate_entry(&payload)?;

    let row = MoodEntry::insert(
        &state.db,
        user_id,
        entry.score,
        entry.label,
        &entry.feelings,
        payload.journal.as_deref(),
        entry.date,
    )
    .await
    .map_err(ApiError::Internal)?
    .ok_or_else(|| {
        ApiError::Conflict("A mood entry already exists for this date.".into())
    })?;

    info!(user_id = %user_id, entry_id = %row.id, "mood entry created");
    Ok(created("Mood entry created successfully.", row.into()))
}

#[instrument(skip(state))]
async fn get_mood(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Envelope<MoodEntryResponse>>)> {
    let row = MoodEntry::get_owned(&state.db, user_id, id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::NotFound("Mood entry not found.".into()))?;
    Ok(ok("Mood entry retrieved successfully.", row.into()))
}

/// The update statement reports its own outcome, so a row deleted mid-flight
/// is a 404 and never misreads as a date conflict.
fn updated_row(outcome: MoodUpdate) -> Result<MoodEntry, ApiError> {
    match outcome {
        MoodUpdate::Updated(row) => Ok(row),
        MoodUpdate::NotFound => Err(ApiError::NotFound("Mood entry not found.".into())),
        MoodUpdate::DuplicateDate => Err(ApiError::Conflict(
            "A mood entry already exists for this date.".into(),
        )),
    }
}

#[instrument(skip(state, payload))]
async fn update_mood(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MoodEntryRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<MoodEntryResponse>>)> {
    let entry = validate_entry(&payload)?;

    let outcome = MoodEntry::update(
        &state.db,
        user_id,
        id,
        entry.score,
        entry.label,
        &entry.feelings,
        payload.journal.as_deref(),
        entry.date,
    )
    .await
    .map_err(ApiError::Internal)?;
    let row = updated_row(outcome)?;

    Ok(ok("Mood entry updated successfully.", row.into()))
}

#[instrument(skip(state))]
async fn delete_mood(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !MoodEntry::delete_owned(&state.db, user_id, id)
        .await
        .map_err(ApiError::Internal)?
    {
        return Err(ApiError::NotFound("Mood entry not found.".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
async fn mood_report(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ReportQuery>,
) -> ApiResult<(StatusCode, Json<Envelope<MoodReport>>)> {
    let today = OffsetDateTime::now_utc().date();
    let range = resolve_range(
        query.range.as_deref(),
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        today,
    )?;

    let rows = MoodEntry::scores_in_range(&state.db, user_id, range.start, range.end)
        .await
        .map_err(ApiError::Internal)?;
    let report = build_report(range, &rows);

    Ok(ok("Mood report generated successfully.", report))
}

#[instrument(skip(state))]
async fn weekly_summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<(StatusCode, Json<Envelope<WeeklySummary>>)> {
    let today = OffsetDateTime::now_utc().date();
    let week = ReportRange {
        start: today - time::Duration::days(6),
        end: today,
    };

    let last_checkin = MoodEntry::latest_for_user(&state.db, user_id)
        .await
        .map_err(ApiError::Internal)?
        .map(MoodEntryResponse::from);

    let rows = MoodEntry::scores_in_range(&state.db, user_id, week.start, week.end)
        .await
        .map_err(ApiError::Internal)?;

    let checked_in_days = rows.len() as i64;
    let mut weekly_mood_stats = std::collections::BTreeMap::new();
    for (_, score) in &rows {
        if let Some(label) = mood_label(*score) {
            *weekly_mood_stats.entry(label.to_string()).or_insert(0) += 1;
        }
    }

    Ok(ok(
        "Weekly mood summary retrieved successfully.",
        WeeklySummary {
            last_checkin,
            weekly_checkins: WeeklyCheckins {
                checked_in_days,
                total_days: 7,
                missed_days: 7 - checked_in_days,
            },
            weekly_mood_stats,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use time::OffsetDateTime;

    fn sample_entry() -> MoodEntry {
        MoodEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            mood_score: 3,
            mood_label: "Good".into(),
            feelings: serde_json::json!(["calm"]),
            journal: None,
            entry_date: date!(2024 - 01 - 02),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn vanished_row_maps_to_not_found() {
        // a delete racing the update must not read as a date conflict
        let err = updated_row(MoodUpdate::NotFound).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn date_collision_maps_to_conflict() {
        let err = updated_row(MoodUpdate::DuplicateDate).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn successful_update_passes_the_row_through() {
        let entry = sample_entry();
        let id = entry.id;
        let row = updated_row(MoodUpdate::Updated(entry)).unwrap();
        assert_eq!(row.id, id);
    }
}
