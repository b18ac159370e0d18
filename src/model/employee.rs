use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": "0b6c2f7e-6a43-4c1a-8d7f-3f1b6a0e9c21",
        "employee_code": "EMP-001",
        "first_name": "Ana",
        "last_name": "Ruiz",
        "email": "ana.ruiz@company.com",
        "phone": "+34600111222",
        "department": "Operations",
        "position": "Technician",
        "card_id": "04A1B2C3",
        "hire_date": "2024-01-01",
        "status": "active"
    })
)]
pub struct Employee {
    #[schema(example = "0b6c2f7e-6a43-4c1a-8d7f-3f1b6a0e9c21")]
    pub id: String,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "Ana")]
    pub first_name: String,

    #[schema(example = "Ruiz", nullable = true)]
    pub last_name: Option<String>,

    #[schema(example = "ana.ruiz@company.com")]
    pub email: String,

    #[schema(example = "+34600111222", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = "Operations", nullable = true)]
    pub department: Option<String>,

    #[schema(example = "Technician", nullable = true)]
    pub position: Option<String>,

    /// Badge read by the clock terminal
    #[schema(example = "04A1B2C3", nullable = true)]
    pub card_id: Option<String>,

    #[schema(
        example = "2024-01-01",
        value_type = String,
        format = "date"
    )]
    pub hire_date: NaiveDate,

    #[schema(example = "active")]
    pub status: String,
}

/// "First Last", or just the first name when the last name is blank.
pub fn display_name(first_name: &str, last_name: Option<&str>) -> String {
    match last_name.map(str::trim).filter(|l| !l.is_empty()) {
        Some(last) => format!("{} {}", first_name.trim(), last),
        None => first_name.trim().to_string(),
    }
}
