use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    /// Field service assigned to an operator
    Service,
    /// Work report
    Report,
    Punch,
    Absence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[schema(value_type = String, format = "date")]
    pub start: NaiveDate,
    /// Inclusive last day; single-day events leave it empty
    #[schema(value_type = Option<String>, format = "date")]
    pub end: Option<NaiveDate>,
    pub color: Option<String>,
    pub operator_id: Option<String>,
    pub client: Option<String>,
    pub kind: EventKind,
}
