use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// One mood check-in per user per calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MoodEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mood_score: i16,
    pub mood_label: String,
    pub feelings: serde_json::Value,
    pub journal: Option<String>,
    pub entry_date: Date,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Display label for each step of the 5-level scale.
pub fn mood_label(score: i16) -> Option<&'static str> {
    match score {
        0 => Some("Awful"),
        1 => Some("Bad"),
        2 => Some("Okay"),
        3 => Some("Good"),
        4 => Some("Great"),
        _ => None,
    }
}

/// Outcome of an entry update.
#[derive(Debug)]
pub enum MoodUpdate {
    Updated(MoodEntry),
    /// No row matched (id, user), including a concurrent delete.
    NotFound,
    /// The target date already has an entry.
    DuplicateDate,
}

const ENTRY_COLUMNS: &str = r#"
    id, user_id, mood_score, mood_label, feelings, journal, entry_date, created_at, updated_at
"#;

impl MoodEntry {
    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<MoodEntry>> {
        let rows = sqlx::query_as::<_, MoodEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM mood_entries
            WHERE user_id = $1
            ORDER BY entry_date DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn get_owned(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<MoodEntry>> {
        let row = sqlx::query_as::<_, MoodEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM mood_entries WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Insert a new entry. Returns `Ok(None)` when the (user, date) slot is
    /// already taken.
    pub async fn insert(
        db: &PgPool,
        user_id: Uuid,
        mood_score: i16,
        mood_label: &str,
        feelings: &serde_json::Value,
        journal: Option<&str>,
        entry_date: Date,
    ) -> anyhow::Result<Option<MoodEntry>> {
        let result = sqlx::query_as::<_, MoodEntry>(&format!(
            r#"
            INSERT INTO mood_entries (user_id, mood_score, mood_label, feelings, journal, entry_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(mood_score)
        .bind(mood_label)
        .bind(feelings)
        .bind(journal)
        .bind(entry_date)
        .fetch_one(db)
        .await;

        match result {
            Ok(row) => Ok(Some(row)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Update an owned entry. The outcome separates a vanished row from a
    /// date collision, since the two map to different responses.
    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        mood_score: i16,
        mood_label: &str,
        feelings: &serde_json::Value,
        journal: Option<&str>,
        entry_date: Date,
    ) -> anyhow::Result<MoodUpdate> {
        let result = sqlx::query_as::<_, MoodEntry>(&format!(
            r#"
            UPDATE mood_entries
            SET mood_score = $3, mood_label = $4, feelings = $5, journal = $6,
                entry_date = $7, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(mood_score)
        .bind(mood_label)
        .bind(feelings)
        .bind(journal)
        .bind(entry_date)
        .fetch_optional(db)
        .await;

        match result {
            Ok(Some(row)) => Ok(MoodUpdate::Updated(row)),
            Ok(None) => Ok(MoodUpdate::NotFound),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Ok(MoodUpdate::DuplicateDate)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_owned(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM mood_entries WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// (date, score) pairs inside an inclusive interval, feed for the report
    /// engine.
    pub async fn scores_in_range(
        db: &PgPool,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> anyhow::Result<Vec<(Date, i16)>> {
        let rows: Vec<(Date, i16)> = sqlx::query_as(
            r#"
            SELECT entry_date, mood_score
            FROM mood_entries
            WHERE user_id = $1 AND entry_date BETWEEN $2 AND $3
            ORDER BY entry_date
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn latest_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<MoodEntry>> {
        let row = sqlx::query_as::<_, MoodEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM mood_entries
            WHERE user_id = $1
            ORDER BY entry_date DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_cover_the_scale() {
        assert_eq!(mood_label(0), Some("Awful"));
        assert_eq!(mood_label(4), Some("Great"));
        assert_eq!(mood_label(5), None);
        assert_eq!(mood_label(-1), None);
    }
}
