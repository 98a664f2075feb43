use jsonwebtoken::{DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Token type used to distinguish Access, Refresh and Reset JWTs.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    /// Short-lived token issued after a password-reset OTP is verified.
    Reset,
}

/// Standard JWT claims used in the app.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub exp: usize,      // expiration time
    pub iat: usize,      // issued at
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // access, refresh or reset
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub reset_ttl: Duration,
}

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub password: String,
    pub confirm_password: String,
}

/// Request body for OTP verification (signup and password-reset flows).
#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: String,
}

/// Request body for re-issuing a signup OTP.
#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub email: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for requesting a password-reset code.
#[derive(Debug, Deserialize)]
pub struct ForgetPasswordRequest {
    pub email: String,
}

/// Request body for setting a new password with a reset token.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
    pub confirm_password: String,
}

/// Request body for social login.
#[derive(Debug, Deserialize)]
pub struct SocialLoginRequest {
    pub provider: String,
    pub token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
    pub is_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
}

impl From<crate::auth::repo::User> for PublicUser {
    fn from(u: crate::auth::repo::User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            phone: u.phone,
            full_name: u.full_name,
            avatar_url: u.avatar_url,
            country: u.country,
            bio: u.bio,
            is_verified: u.is_verified,
            created_at: u.created_at,
            last_login: u.last_login,
        }
    }
}

/// Response returned after signup.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user: PublicUser,
    pub access_token: String,
}

/// Response returned after login and social login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Response for resend-otp, echoing the issued code.
///
/// Carried over from the original API surface; see DESIGN.md for the
/// security note on exposing the raw code.
#[derive(Debug, Serialize)]
pub struct ResendOtpResponse {
    pub otp: String,
    #[serde(with = "time::serde::rfc3339")]
    pub otp_expires_at: OffsetDateTime,
}

/// Response for reset-OTP verification: a short-lived reset token.
#[derive(Debug, Serialize)]
pub struct ResetTokenResponse {
    pub access_token: String,
}
