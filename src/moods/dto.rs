use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::moods::repo::MoodEntry;
use crate::moods::report::format_iso_date;

/// Request body for creating or replacing a mood entry.
#[derive(Debug, Deserialize)]
pub struct MoodEntryRequest {
    pub mood_score: i16,
    #[serde(default)]
    pub feel: Vec<String>,
    pub journal: Option<String>,
    /// Calendar date, `YYYY-MM-DD`.
    pub mood_date: String,
}

#[derive(Debug, Serialize)]
pub struct MoodEntryResponse {
    pub id: Uuid,
    pub mood_score: i16,
    pub mood_label: String,
    pub feel: Vec<String>,
    pub journal: Option<String>,
    pub mood_date: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<MoodEntry> for MoodEntryResponse {
    fn from(e: MoodEntry) -> Self {
        let feel = serde_json::from_value(e.feelings).unwrap_or_default();
        Self {
            id: e.id,
            mood_score: e.mood_score,
            mood_label: e.mood_label,
            feel,
            journal: e.journal,
            mood_date: format_iso_date(e.entry_date),
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

/// Query parameters for the report endpoint.
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub range: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Weekly summary payload.
#[derive(Debug, Serialize)]
pub struct WeeklySummary {
    pub last_checkin: Option<MoodEntryResponse>,
    pub weekly_checkins: WeeklyCheckins,
    pub weekly_mood_stats: std::collections::BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub struct WeeklyCheckins {
    pub checked_in_days: i64,
    pub total_days: i64,
    pub missed_days: i64,
}
