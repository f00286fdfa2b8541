use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerStatus {
    Open,
    Praying,
    Answered,
}

impl PrayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerStatus::Open => "open",
            PrayerStatus::Praying => "praying",
            PrayerStatus::Answered => "answered",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PrayerRequest {
    pub id: Uuid,
    pub church_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub requested_by: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub is_private: bool,
    pub is_anonymous: bool,
    pub status: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
