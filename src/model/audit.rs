use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 42,
    "actor": "admin",
    "action": "employee.update",
    "details": "id=0b6c2f7e-6a43-4c1a-8d7f-3f1b6a0e9c21",
    "ip": "10.0.0.12",
    "created_at": "2025-03-03T09:15:00Z"
}))]
pub struct AuditLog {
    pub id: u64,
    pub actor: String,
    pub action: String,
    pub details: Option<String>,
    pub ip: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
