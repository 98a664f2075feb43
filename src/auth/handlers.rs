use axum::{
    extract::{FromRef, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, post},
    Json, Router,
};
use std::str::FromStr;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgetPasswordRequest, JwtKeys, LoginRequest, PublicUser,
            ResendOtpRequest, ResetPasswordRequest, ResetTokenResponse, ResendOtpResponse,
            SignupRequest, SignupResponse, SocialLoginRequest, VerifyOtpRequest,
        },
        otp,
        ratelimit::{client_ip, LoginThrottle, ResetThrottle},
        repo::User,
        services::{
            generate_username, hash_password, is_valid_email, random_password, verify_password,
            AuthUser, ResetUser,
        },
        social::Provider,
    },
    notifications::Notification,
    response::{created, message_only, ok, ApiError, ApiResult, Envelope},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/auth/login", post(login))
        .route("/forget-password", post(forget_password))
        .route("/verify-otp/forgetpass", post(verify_reset_otp))
        .route("/reset-password", post(reset_password))
        .route("/social-login", post(social_login))
        .route("/users/:id/delete-account", delete(delete_account))
}

fn validate_signup(payload: &SignupRequest) -> Result<(), ApiError> {
    let mut errors = serde_json::Map::new();
    if !is_valid_email(&payload.email) {
        errors.insert("email".into(), "Invalid email.".into());
    }
    if payload.password.len() < 8 {
        errors.insert("password".into(), "Password too short.".into());
    }
    if payload.password != payload.confirm_password {
        errors.insert(
            "confirm_password".into(),
            "Passwords do not match.".into(),
        );
    }
    if let Some(phone) = payload.phone.as_deref() {
        if !phone.chars().all(|c| c.is_ascii_digit()) {
            errors.insert("phone".into(), "Phone number must contain only digits.".into());
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors.into()))
    }
}

#[instrument(skip(state, payload))]
async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<SignupResponse>>)> {
    payload.email = payload.email.trim().to_lowercase();
    validate_signup(&payload)?;

    if User::identifier_taken(
        &state.db,
        &payload.email,
        payload.username.as_deref(),
        payload.phone.as_deref(),
    )
    .await
    .map_err(ApiError::Internal)?
    {
        warn!(email = %payload.email, "signup identifier already registered");
        return Err(ApiError::Conflict(
            "Email, username or phone already registered.".into(),
        ));
    }

    let hash = hash_password(&payload.password).map_err(ApiError::Internal)?;
    let code = otp::generate_code();
    let expires_at = otp::expiry(state.config.otp_ttl_minutes);

    let mut tx = state.db.begin().await?;
    // A raced duplicate slips past the check above and trips the unique
    // constraint instead; both paths report the same conflict.
    let user = User::create(
        &mut tx,
        &payload.email,
        payload.username.as_deref(),
        payload.phone.as_deref(),
        &hash,
    )
    .await
    .map_err(ApiError::Internal)?
    .ok_or_else(|| {
        ApiError::Conflict("Email, username or phone already registered.".into())
    })?;
    User::set_otp(&mut tx, user.id, &code, expires_at)
        .await
        .map_err(ApiError::Internal)?;
    Notification::record_user_created(&mut tx, user.id, &payload.email)
        .await
        .map_err(ApiError::Internal)?;
    tx.commit().await?;

    // Email dispatch is best-effort here: the account and code are already
    // committed, the caller just learns whether the send worked.
    let message = match state.mailer.send_otp(&payload.email, &code).await {
        Ok(()) => "User created successfully. OTP sent to email.",
        Err(e) => {
            error!(error = %e, email = %payload.email, "OTP email failed after signup");
            "User created successfully, but the verification email could not be sent."
        }
    };

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id).map_err(ApiError::Internal)?;

    info!(user_id = %user.id, "user registered");
    Ok(created(
        message,
        SignupResponse {
            user: user.into(),
            access_token,
        },
    ))
}

#[instrument(skip(state, payload))]
async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<()>>)> {
    let holder = find_otp_holder(&state, &payload.otp).await?;

    if holder.is_verified {
        return Err(ApiError::BadRequest("Email is already verified.".into()));
    }
    if !otp::is_valid(&holder.otp, &holder.otp_expires_at) {
        return Err(invalid_otp());
    }

    if !User::consume_signup_otp(&state.db, holder.id, &payload.otp)
        .await
        .map_err(ApiError::Internal)?
    {
        // another request consumed the code first
        return Err(invalid_otp());
    }

    info!(user_id = %holder.id, "email verified");
    Ok(message_only("Email verified successfully."))
}

#[instrument(skip(state, payload))]
async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<ResendOtpRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<ResendOtpResponse>>)> {
    let email = payload.email.trim().to_lowercase();
    let user = User::find_by_email(&state.db, &email)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::NotFound("No account found for this email.".into()))?;

    if !user.is_active {
        return Err(ApiError::Forbidden("Account is inactive.".into()));
    }
    if user.is_verified {
        return Err(ApiError::BadRequest("Email is already verified.".into()));
    }

    let code = otp::generate_code();
    let expires_at = otp::expiry(state.config.otp_ttl_minutes);
    let mut tx = state.db.begin().await?;
    User::set_otp(&mut tx, user.id, &code, expires_at)
        .await
        .map_err(ApiError::Internal)?;
    tx.commit().await?;

    // Unlike signup, a failed send here is fatal: the caller asked for
    // exactly this email to go out.
    state
        .mailer
        .send_otp(&email, &code)
        .await
        .map_err(ApiError::Internal)?;

    Ok(ok(
        "OTP re-sent to email.",
        ResendOtpResponse {
            otp: code,
            otp_expires_at: expires_at,
        },
    ))
}

#[instrument(skip(state, payload, headers))]
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<AuthResponse>>)> {
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        return Err(ApiError::field("email", "Invalid email."));
    }

    let ip = client_ip(&headers);
    let throttle = LoginThrottle::new(state.counters.as_ref());
    throttle.check(&ip, &payload.email).await?;

    let user = match User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(ApiError::Internal)?
    {
        Some(u) => u,
        None => {
            throttle
                .record_failure(&ip, &payload.email)
                .await
                .map_err(ApiError::Internal)?;
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid credentials.".into()));
        }
    };

    let password_ok =
        verify_password(&payload.password, &user.password_hash).map_err(ApiError::Internal)?;
    if !password_ok {
        throttle
            .record_failure(&ip, &payload.email)
            .await
            .map_err(ApiError::Internal)?;
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials.".into()));
    }

    if !user.is_active {
        return Err(ApiError::Forbidden("Account is inactive.".into()));
    }
    if !user.is_verified {
        return Err(ApiError::Forbidden("Email is not verified.".into()));
    }

    let mut tx = state.db.begin().await?;
    User::update_last_login(&mut tx, user.id)
        .await
        .map_err(ApiError::Internal)?;
    tx.commit().await?;

    throttle
        .clear(&ip, &payload.email)
        .await
        .map_err(ApiError::Internal)?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id).map_err(ApiError::Internal)?;
    let refresh_token = keys.sign_refresh(user.id).map_err(ApiError::Internal)?;

    info!(user_id = %user.id, "user logged in");
    Ok(ok(
        "Login successful.",
        AuthResponse {
            access_token,
            refresh_token,
            user: user.into(),
        },
    ))
}

const RESET_REQUESTED_MESSAGE: &str =
    "If the account exists, a password reset code has been sent.";

#[instrument(skip(state, payload))]
async fn forget_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgetPasswordRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<()>>)> {
    let email = payload.email.trim().to_lowercase();

    let throttle = ResetThrottle::new(state.counters.as_ref());
    throttle.check(&email).await?;
    // Bookkeeping happens whether or not the account exists, so the response
    // never reveals which identifiers are registered.
    throttle.record(&email).await.map_err(ApiError::Internal)?;

    let user = User::find_by_email(&state.db, &email)
        .await
        .map_err(ApiError::Internal)?;

    if let Some(user) = user.filter(|u| u.is_active && u.is_verified) {
        let code = otp::generate_code();
        let expires_at = otp::expiry(state.config.otp_ttl_minutes);
        let mut tx = state.db.begin().await?;
        User::set_otp(&mut tx, user.id, &code, expires_at)
            .await
            .map_err(ApiError::Internal)?;
        tx.commit().await?;

        if let Err(e) = state.mailer.send_otp(&email, &code).await {
            // swallowed: an error response here would leak account existence
            error!(error = %e, user_id = %user.id, "reset OTP email failed");
        }
    }

    Ok(message_only(RESET_REQUESTED_MESSAGE))
}

#[instrument(skip(state, payload))]
async fn verify_reset_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<ResetTokenResponse>>)> {
    let holder = find_otp_holder(&state, &payload.otp).await?;

    if !otp::is_valid(&holder.otp, &holder.otp_expires_at) {
        return Err(invalid_otp());
    }
    if !User::consume_reset_otp(&state.db, holder.id, &payload.otp)
        .await
        .map_err(ApiError::Internal)?
    {
        return Err(invalid_otp());
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_reset(holder.id).map_err(ApiError::Internal)?;

    info!(user_id = %holder.id, "reset OTP verified");
    Ok(ok(
        "OTP verified. Use the token to reset your password.",
        ResetTokenResponse { access_token },
    ))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    ResetUser(user_id): ResetUser,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<()>>)> {
    if payload.new_password.len() < 8 {
        return Err(ApiError::field("new_password", "Password too short."));
    }
    if payload.new_password != payload.confirm_password {
        return Err(ApiError::field(
            "confirm_password",
            "Passwords do not match.",
        ));
    }

    let hash = hash_password(&payload.new_password).map_err(ApiError::Internal)?;
    User::update_password(&state.db, user_id, &hash)
        .await
        .map_err(ApiError::Internal)?;

    info!(user_id = %user_id, "password reset");
    Ok(message_only("Password reset successfully."))
}

#[instrument(skip(state, payload))]
async fn social_login(
    State(state): State<AppState>,
    Json(payload): Json<SocialLoginRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<AuthResponse>>)> {
    let provider = Provider::from_str(&payload.provider)
        .map_err(|_| ApiError::BadRequest("Unsupported social provider.".into()))?;

    let profile = match state.social.verify(provider, &payload.token).await {
        Ok(p) => p,
        Err(e) => {
            warn!(provider = ?provider, error = %e, "social token rejected");
            return Err(ApiError::BadRequest("Invalid social token.".into()));
        }
    };
    if profile.email.is_empty() {
        return Err(ApiError::BadRequest("Invalid social token.".into()));
    }
    let email = profile.email.trim().to_lowercase();

    let user = match User::find_by_email(&state.db, &email)
        .await
        .map_err(ApiError::Internal)?
    {
        Some(existing) => {
            User::update_profile_if_changed(
                &state.db,
                &existing,
                profile.full_name.as_deref(),
                profile.avatar_url.as_deref(),
            )
            .await
            .map_err(ApiError::Internal)?
        }
        None => {
            let username = generate_username(&email);
            let hash = hash_password(&random_password()).map_err(ApiError::Internal)?;
            let user = User::create_social(
                &state.db,
                &email,
                &username,
                profile.full_name.as_deref(),
                profile.avatar_url.as_deref(),
                &hash,
            )
            .await
            .map_err(ApiError::Internal)?;
            info!(user_id = %user.id, provider = ?provider, "social user created");
            user
        }
    };

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id).map_err(ApiError::Internal)?;
    let refresh_token = keys.sign_refresh(user.id).map_err(ApiError::Internal)?;

    Ok(ok(
        "Login successful.",
        AuthResponse {
            access_token,
            refresh_token,
            user: user.into(),
        },
    ))
}

#[instrument(skip(state))]
async fn delete_account(
    State(state): State<AppState>,
    AuthUser(caller_id): AuthUser,
    Path(target_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if caller_id != target_id {
        let caller = User::find_by_id(&state.db, caller_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::Unauthorized("User not found.".into()))?;
        if !caller.is_superuser {
            return Err(ApiError::Forbidden(
                "You may only delete your own account.".into(),
            ));
        }
    }

    if !User::delete_by_id(&state.db, target_id)
        .await
        .map_err(ApiError::Internal)?
    {
        return Err(ApiError::NotFound("User not found.".into()));
    }

    info!(user_id = %target_id, deleted_by = %caller_id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn invalid_otp() -> ApiError {
    ApiError::BadRequest("Invalid or expired OTP.".into())
}

/// OTP lookup is by code alone: the verify endpoints carry no user identity.
/// More than one holder means a cross-user collision, rejected outright.
async fn find_otp_holder(state: &AppState, code: &str) -> Result<User, ApiError> {
    let mut holders = User::find_by_otp(&state.db, code)
        .await
        .map_err(ApiError::Internal)?;
    match holders.len() {
        1 => Ok(holders.remove(0)),
        0 => Err(invalid_otp()),
        _ => {
            warn!("OTP code collision across users");
            Err(invalid_otp())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_signup() -> SignupRequest {
        SignupRequest {
            email: "new@example.com".into(),
            username: None,
            phone: None,
            password: "long-enough".into(),
            confirm_password: "long-enough".into(),
        }
    }

    #[test]
    fn signup_validation_accepts_good_payload() {
        assert!(validate_signup(&base_signup()).is_ok());
    }

    #[test]
    fn signup_validation_rejects_bad_email() {
        let mut payload = base_signup();
        payload.email = "nope".into();
        let err = validate_signup(&payload).unwrap_err();
        match err {
            ApiError::Validation(fields) => assert!(fields.get("email").is_some()),
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn signup_validation_rejects_password_mismatch() {
        let mut payload = base_signup();
        payload.confirm_password = "different-pw".into();
        let err = validate_signup(&payload).unwrap_err();
        match err {
            ApiError::Validation(fields) => assert!(fields.get("confirm_password").is_some()),
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn signup_validation_rejects_short_password() {
        let mut payload = base_signup();
        payload.password = "short".into();
        payload.confirm_password = "short".into();
        assert!(validate_signup(&payload).is_err());
    }

    #[test]
    fn signup_validation_rejects_alpha_phone() {
        let mut payload = base_signup();
        payload.phone = Some("555-HELLO".into());
        assert!(validate_signup(&payload).is_err());
    }
}
