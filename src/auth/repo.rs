use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. Email is the primary identifier and always
/// present; username and phone are optional extras.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    #[serde(skip_serializing)]
    pub otp: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expires_at: Option<OffsetDateTime>,
    pub last_login: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const USER_COLUMNS: &str = r#"
    id, email, username, phone, full_name, avatar_url, country, bio, password_hash,
    is_verified, is_active, is_staff, is_superuser,
    otp, otp_expires_at, last_login, created_at, updated_at
"#;

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// True if any identifier is already taken by another account.
    pub async fn identifier_taken(
        db: &PgPool,
        email: &str,
        username: Option<&str>,
        phone: Option<&str>,
    ) -> anyhow::Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM users
                WHERE email = $1
                   OR ($2::text IS NOT NULL AND username = $2)
                   OR ($3::text IS NOT NULL AND phone = $3)
            )
            "#,
        )
        .bind(email)
        .bind(username)
        .bind(phone)
        .fetch_one(db)
        .await?;
        Ok(taken)
    }

    /// Insert a new account. Returns `Ok(None)` when a unique constraint
    /// fires: the pre-insert availability check is advisory only, and a raced
    /// duplicate must surface as the same conflict as a sequential one.
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        email: &str,
        username: Option<&str>,
        phone: Option<&str>,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, phone, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(username)
        .bind(phone)
        .bind(password_hash)
        .fetch_one(&mut **tx)
        .await;

        match result {
            Ok(user) => Ok(Some(user)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create an already-verified account from a social-login profile.
    pub async fn create_social(
        db: &PgPool,
        email: &str,
        username: &str,
        full_name: Option<&str>,
        avatar_url: Option<&str>,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, full_name, avatar_url, password_hash, is_verified)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(username)
        .bind(full_name)
        .bind(avatar_url)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Store a fresh OTP, replacing any outstanding one.
    pub async fn set_otp(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET otp = $2, otp_expires_at = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(code)
        .bind(expires_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// All users currently holding the given code. Fetches at most two rows;
    /// the caller treats more than one holder as a collision.
    pub async fn find_by_otp(db: &PgPool, code: &str) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE otp = $1 LIMIT 2"
        ))
        .bind(code)
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    /// Consume a signup OTP: clear the code pair and mark verified in one
    /// conditional update so the same code can never verify twice.
    /// Returns false when another request consumed it first.
    pub async fn consume_signup_otp(db: &PgPool, user_id: Uuid, code: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET otp = NULL, otp_expires_at = NULL, is_verified = TRUE, updated_at = now()
            WHERE id = $1 AND otp = $2
            "#,
        )
        .bind(user_id)
        .bind(code)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Consume a password-reset OTP without touching the verified flag.
    pub async fn consume_reset_otp(db: &PgPool, user_id: Uuid, code: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET otp = NULL, otp_expires_at = NULL, updated_at = now()
            WHERE id = $1 AND otp = $2
            "#,
        )
        .bind(user_id)
        .bind(code)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn update_last_login(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_login = now(), updated_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn update_password(
        db: &PgPool,
        user_id: Uuid,
        password_hash: &str,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Write full_name / avatar_url from a social profile, but only the
    /// fields that actually changed. Returns the fresh row.
    pub async fn update_profile_if_changed(
        db: &PgPool,
        current: &User,
        full_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> anyhow::Result<User> {
        let name_changed =
            full_name.is_some() && full_name != current.full_name.as_deref();
        let avatar_changed =
            avatar_url.is_some() && avatar_url != current.avatar_url.as_deref();

        if !name_changed && !avatar_changed {
            return Ok(current.clone());
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET full_name = CASE WHEN $2 THEN $3 ELSE full_name END,
                avatar_url = CASE WHEN $4 THEN $5 ELSE avatar_url END,
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(current.id)
        .bind(name_changed)
        .bind(full_name)
        .bind(avatar_changed)
        .bind(avatar_url)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn delete_by_id(db: &PgPool, user_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
