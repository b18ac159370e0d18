use crate::{
    api::{db_error, paging},
    auth::auth::AuthUser,
    model::audit::AuditLog,
};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub actor: Option<String>,
    /// Prefix match, e.g. `employee.`
    pub action: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AuditListResponse {
    pub data: Vec<AuditLog>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[utoipa::path(
    get,
    path = "/api/audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit trail, newest first", body = AuditListResponse),
        (status = 403, description = "Admin only")
    ),
    tag = "Audit",
    security(("bearer_auth" = []))
)]
pub async fn list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AuditQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let (page, per_page, offset) = paging(query.page, query.per_page);

    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(actor) = query.actor.as_deref().filter(|a| !a.is_empty()) {
        conditions.push("actor = ?");
        bindings.push(actor.to_string());
    }
    if let Some(action) = query.action.as_deref().filter(|a| !a.is_empty()) {
        conditions.push("action LIKE ?");
        bindings.push(format!("{}%", action));
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM audit_logs {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }
    let total = count_query
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("Failed to count audit logs"))?;

    let data_sql = format!(
        "SELECT id, actor, action, details, ip, created_at FROM audit_logs {} \
         ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, "Fetching audit logs");

    let mut data_query = sqlx::query_as::<_, AuditLog>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    let data = data_query
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("Failed to fetch audit logs"))?;

    Ok(HttpResponse::Ok().json(AuditListResponse {
        data,
        page,
        per_page,
        total,
    }))
}
