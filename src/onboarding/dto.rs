use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::onboarding::repo::{CoachingStyle, OnboardingStep};

#[derive(Debug, Serialize)]
pub struct CoachingStyleResponse {
    pub value: String,
    pub name: String,
    pub description: String,
}

impl From<CoachingStyle> for CoachingStyleResponse {
    fn from(s: CoachingStyle) -> Self {
        Self {
            value: s.value,
            name: s.name,
            description: s.description,
        }
    }
}

/// Request body for saving onboarding answers.
#[derive(Debug, Deserialize)]
pub struct OnboardingRequest {
    pub coaching_style: String,
    #[serde(default)]
    pub focus: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OnboardingResponse {
    pub id: Uuid,
    pub coaching_style: CoachingStyleSnapshot,
    pub focus: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The style as it was when the user picked it, not the live catalog row.
#[derive(Debug, Serialize)]
pub struct CoachingStyleSnapshot {
    pub value: String,
    pub name: String,
}

impl From<OnboardingStep> for OnboardingResponse {
    fn from(step: OnboardingStep) -> Self {
        let focus = serde_json::from_value(step.focus).unwrap_or_default();
        Self {
            id: step.id,
            coaching_style: CoachingStyleSnapshot {
                value: step.style_value,
                name: step.style_name,
            },
            focus,
            created_at: step.created_at,
            updated_at: step.updated_at,
        }
    }
}
