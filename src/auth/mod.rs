use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod otp;
pub mod ratelimit;
pub mod repo;
pub mod services;
pub mod social;

pub fn router() -> Router<AppState> {
    handlers::router()
}
