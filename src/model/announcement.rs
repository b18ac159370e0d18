use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Internal notice published to every employee.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub created_by: Option<String>,
    pub image_url: Option<String>,
    pub active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AnnouncementRow {
    pub id: String,
    pub title: String,
    pub message: String,
    pub priority: String,
    pub created_by: Option<String>,
    pub image_url: Option<String>,
    pub active: bool,
    pub published_at: DateTime<Utc>,
}

impl From<AnnouncementRow> for Announcement {
    fn from(row: AnnouncementRow) -> Self {
        Announcement {
            id: row.id,
            title: row.title,
            message: row.message,
            priority: row.priority.parse().unwrap_or(Priority::Low),
            created_by: row.created_by,
            image_url: row.image_url,
            active: row.active,
            published_at: row.published_at,
        }
    }
}
