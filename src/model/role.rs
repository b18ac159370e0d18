use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    SuperAdmin,
    Admin,
    // older profiles were created with the "user" role
    #[strum(to_string = "employee", serialize = "user")]
    Employee,
}

impl Role {
    /// Parses the role column of a profile row; unknown values resolve to `None`.
    pub fn from_column(value: &str) -> Option<Self> {
        value.trim().parse().ok()
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}
