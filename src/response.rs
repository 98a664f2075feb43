use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Response envelope returned by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

pub fn ok<T: Serialize>(message: &str, data: T) -> (StatusCode, Json<Envelope<T>>) {
    (
        StatusCode::OK,
        Json(Envelope {
            success: true,
            message: message.to_string(),
            data: Some(data),
            errors: None,
        }),
    )
}

pub fn created<T: Serialize>(message: &str, data: T) -> (StatusCode, Json<Envelope<T>>) {
    (
        StatusCode::CREATED,
        Json(Envelope {
            success: true,
            message: message.to_string(),
            data: Some(data),
            errors: None,
        }),
    )
}

pub fn message_only(message: &str) -> (StatusCode, Json<Envelope<()>>) {
    (
        StatusCode::OK,
        Json(Envelope {
            success: true,
            message: message.to_string(),
            data: None,
            errors: None,
        }),
    )
}

/// Application error type that converts to enveloped HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input, with field-level detail.
    #[error("Validation failed.")]
    Validation(serde_json::Value),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("Internal server error.")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Single-field validation error.
    pub fn field(field: &str, message: &str) -> Self {
        ApiError::Validation(serde_json::json!({ field: message }))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, errors) = match &self {
            ApiError::Validation(fields) => (StatusCode::BAD_REQUEST, Some(fields.clone())),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, None),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, None),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, None),
            ApiError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, None),
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let body = Envelope::<()> {
            success: false,
            message: self.to_string(),
            data: None,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_skips_empty_fields() {
        let json = serde_json::to_string(&Envelope::<()> {
            success: true,
            message: "Success.".into(),
            data: None,
            errors: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"success":true,"message":"Success."}"#);
    }

    #[test]
    fn envelope_includes_data() {
        let (_status, Json(env)) = ok("Done.", serde_json::json!({"n": 1}));
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains(r#""success":true"#));
        assert!(json.contains(r#""n":1"#));
    }

    #[test]
    fn validation_error_carries_field_detail() {
        let err = ApiError::field("email", "Invalid email.");
        match err {
            ApiError::Validation(fields) => {
                assert_eq!(fields["email"], "Invalid email.");
            }
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn duplicate_resources_render_as_conflict() {
        let resp = ApiError::Conflict("Email, username or phone already registered.".into())
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn internal_error_has_generic_message() {
        let err = ApiError::Internal(anyhow::anyhow!("secret database detail"));
        assert_eq!(err.to_string(), "Internal server error.");
    }
}
