use crate::{api::db_error, auth::auth::AuthUser, utils::audit::record_action};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LinkEmployee {
    /// Employee record the account clocks for; null or blank unlinks
    #[schema(example = "0b6c2f7e-6a43-4c1a-8d7f-3f1b6a0e9c21")]
    pub employee_id: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum LinkCheck {
    Allowed,
    UnknownEmployee,
    TakenBy(String),
}

/// An employee record belongs to at most one account.
fn check_link(user_id: &str, employee_exists: bool, owner: Option<&str>) -> LinkCheck {
    if !employee_exists {
        return LinkCheck::UnknownEmployee;
    }
    match owner {
        Some(other) if other != user_id => LinkCheck::TakenBy(other.to_string()),
        _ => LinkCheck::Allowed,
    }
}

/// Link an account to an employee record (or unlink it).
///
/// The account's refresh tokens are revoked so the new link is picked up at
/// the next login.
#[utoipa::path(
    put,
    path = "/api/users/{user_id}/employee",
    params(("user_id", Path, description = "Account ID")),
    request_body = LinkEmployee,
    responses(
        (status = 200, description = "Link updated", body = Object, example = json!({
            "user_id": "7d1c...", "employee_id": "0b6c..."
        })),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Unknown account or employee"),
        (status = 409, description = "Employee already linked to another account")
    ),
    tag = "Account",
    security(("bearer_auth" = []))
)]
pub async fn link_employee(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    payload: web::Json<LinkEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let user_id = path.into_inner();
    let employee_id = payload
        .into_inner()
        .employee_id
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());

    let user_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(&user_id)
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("Failed to look up account"))?
        > 0;
    if !user_exists {
        return Ok(HttpResponse::NotFound().json(json!({ "message": "Account not found" })));
    }

    if let Some(employee_id) = employee_id.as_deref() {
        let employee_exists =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE id = ?")
                .bind(employee_id)
                .fetch_one(pool.get_ref())
                .await
                .map_err(db_error("Failed to look up employee"))?
                > 0;
        let owner = sqlx::query_scalar::<_, String>(
            "SELECT id FROM users WHERE employee_id = ? LIMIT 1",
        )
        .bind(employee_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(db_error("Failed to look up employee link"))?;

        match check_link(&user_id, employee_exists, owner.as_deref()) {
            LinkCheck::Allowed => {}
            LinkCheck::UnknownEmployee => {
                return Ok(HttpResponse::NotFound().json(json!({ "message": "Employee not found" })));
            }
            LinkCheck::TakenBy(_) => {
                return Ok(HttpResponse::Conflict().json(json!({
                    "message": "Employee already linked to another account"
                })));
            }
        }
    }

    let updated = sqlx::query("UPDATE users SET employee_id = ? WHERE id = ?")
        .bind(employee_id.as_deref())
        .bind(&user_id)
        .execute(pool.get_ref())
        .await;
    if let Err(sqlx::Error::Database(db_err)) = &updated {
        // unique index on users.employee_id lost a race
        if db_err.code().as_deref() == Some("23000") {
            return Ok(HttpResponse::Conflict().json(json!({
                "message": "Employee already linked to another account"
            })));
        }
    }
    updated.map_err(db_error("Failed to link employee"))?;

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE")
        .bind(&user_id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error("Failed to revoke refresh tokens"))?;

    record_action(
        pool.get_ref(),
        &req,
        &auth,
        "user.link_employee",
        format!("user={} employee={}", user_id, employee_id.as_deref().unwrap_or("-")),
    )
    .await;
    info!(user_id = %user_id, employee_id = ?employee_id, "Account link updated");

    Ok(HttpResponse::Ok().json(json!({ "user_id": user_id, "employee_id": employee_id })))
}
