use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Direction of a clock punch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PunchKind {
    Entrance,
    Exit,
}

/// How the punch was produced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PunchSource {
    Manual,
    Card,
    Terminal,
}

/// A single clock-in or clock-out event. Append-only: never updated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "7d4c1b0e-3c55-4a61-9a8e-0f6f1d2f8a10",
    "employee_id": "E1",
    "employee_name": "Ana Ruiz",
    "kind": "entrance",
    "timestamp": "2025-03-03T08:00:00Z",
    "source": "card",
    "location": null
}))]
pub struct Punch {
    pub id: String,
    pub employee_id: String,
    pub employee_name: String,
    pub kind: PunchKind,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
    pub source: PunchSource,
    pub location: Option<String>,
}

/// Row shape of the `punches` table; enum columns are stored as text.
#[derive(Debug, sqlx::FromRow)]
pub struct PunchRow {
    pub id: String,
    pub employee_id: String,
    pub employee_name: String,
    pub kind: String,
    pub ts: DateTime<Utc>,
    pub source: String,
    pub location: Option<String>,
}

impl TryFrom<PunchRow> for Punch {
    type Error = strum::ParseError;

    fn try_from(row: PunchRow) -> Result<Self, Self::Error> {
        Ok(Punch {
            id: row.id,
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            kind: row.kind.parse()?,
            timestamp: row.ts,
            // unknown sources are legacy manual entries
            source: row.source.parse().unwrap_or(PunchSource::Manual),
            location: row.location,
        })
    }
}

/// A punch that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewPunch {
    pub employee_id: String,
    pub employee_name: String,
    pub kind: PunchKind,
    pub timestamp: DateTime<Utc>,
    pub source: PunchSource,
    pub location: Option<String>,
}

impl NewPunch {
    pub fn into_punch(self, id: String) -> Punch {
        Punch {
            id,
            employee_id: self.employee_id,
            employee_name: self.employee_name,
            kind: self.kind,
            timestamp: self.timestamp,
            source: self.source,
            location: self.location,
        }
    }
}
