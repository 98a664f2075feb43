use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Catalog entry describing a guidance approach picked during onboarding.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoachingStyle {
    pub id: Uuid,
    pub value: String,
    pub name: String,
    pub description: String,
    pub sort_order: i32,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl CoachingStyle {
    pub async fn list_active(db: &PgPool) -> anyhow::Result<Vec<CoachingStyle>> {
        let rows = sqlx::query_as::<_, CoachingStyle>(
            r#"
            SELECT id, value, name, description, sort_order, is_active, created_at, updated_at
            FROM coaching_styles
            WHERE is_active = TRUE
            ORDER BY sort_order
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_active_by_value(
        db: &PgPool,
        value: &str,
    ) -> anyhow::Result<Option<CoachingStyle>> {
        let row = sqlx::query_as::<_, CoachingStyle>(
            r#"
            SELECT id, value, name, description, sort_order, is_active, created_at, updated_at
            FROM coaching_styles
            WHERE value = $1 AND is_active = TRUE
            "#,
        )
        .bind(value)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }
}

/// One onboarding record per user. `style_value` / `style_name` are
/// snapshotted from the catalog at write time, never re-derived.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OnboardingStep {
    pub id: Uuid,
    pub user_id: Uuid,
    pub coaching_style_id: Uuid,
    pub style_value: String,
    pub style_name: String,
    pub focus: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

const STEP_COLUMNS: &str = r#"
    id, user_id, coaching_style_id, style_value, style_name, focus, created_at, updated_at
"#;

impl OnboardingStep {
    pub async fn get_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<OnboardingStep>> {
        let row = sqlx::query_as::<_, OnboardingStep>(&format!(
            "SELECT {STEP_COLUMNS} FROM onboarding_steps WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Insert-or-update in one transaction. Returns the row and whether it
    /// was newly created.
    pub async fn upsert(
        db: &PgPool,
        user_id: Uuid,
        style: &CoachingStyle,
        focus: &serde_json::Value,
    ) -> anyhow::Result<(OnboardingStep, bool)> {
        let mut tx = db.begin().await?;

        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM onboarding_steps WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        let row = match existing {
            Some((id,)) => {
                sqlx::query_as::<_, OnboardingStep>(&format!(
                    r#"
                    UPDATE onboarding_steps
                    SET coaching_style_id = $2, style_value = $3, style_name = $4,
                        focus = $5, updated_at = now()
                    WHERE id = $1
                    RETURNING {STEP_COLUMNS}
                    "#
                ))
                .bind(id)
                .bind(style.id)
                .bind(&style.value)
                .bind(&style.name)
                .bind(focus)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, OnboardingStep>(&format!(
                    r#"
                    INSERT INTO onboarding_steps (user_id, coaching_style_id, style_value, style_name, focus)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING {STEP_COLUMNS}
                    "#
                ))
                .bind(user_id)
                .bind(style.id)
                .bind(&style.value)
                .bind(&style.name)
                .bind(focus)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let created = existing.is_none();
        tx.commit().await?;
        Ok((row, created))
    }
}
