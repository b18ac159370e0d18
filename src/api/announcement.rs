use crate::{
    api::db_error,
    auth::auth::AuthUser,
    model::announcement::{Announcement, AnnouncementRow, Priority},
    state::AppState,
    store::change_feed::{ANNOUNCEMENTS, ChangeOp},
    utils::audit::record_action,
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use chrono::{SubsecRound, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const SELECT_ANNOUNCEMENTS: &str = r#"
    SELECT id, title, message, priority, created_by, image_url, active, published_at
    FROM announcements
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAnnouncement {
    #[schema(example = "Office closed on Friday")]
    pub title: String,
    pub message: String,
    /// Defaults to low
    pub priority: Option<Priority>,
    pub image_url: Option<String>,
}

async fn fetch(pool: &MySqlPool, only_active: bool) -> Result<Vec<Announcement>, sqlx::Error> {
    let sql = if only_active {
        format!("{SELECT_ANNOUNCEMENTS} WHERE active = TRUE ORDER BY published_at DESC")
    } else {
        format!("{SELECT_ANNOUNCEMENTS} ORDER BY published_at DESC")
    };

    let rows = sqlx::query_as::<_, AnnouncementRow>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Announcement::from).collect())
}

/// Active announcements, newest first
#[utoipa::path(
    get,
    path = "/api/announcements",
    responses(
        (status = 200, description = "Active announcements", body = [Announcement])
    ),
    tag = "Announcement",
    security(("bearer_auth" = []))
)]
pub async fn list_active(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let items = fetch(pool.get_ref(), true)
        .await
        .map_err(db_error("Failed to list announcements"))?;
    Ok(HttpResponse::Ok().json(items))
}

/// Every announcement, including inactive ones
#[utoipa::path(
    get,
    path = "/api/announcements/all",
    responses(
        (status = 200, description = "All announcements", body = [Announcement]),
        (status = 403, description = "Admin only")
    ),
    tag = "Announcement",
    security(("bearer_auth" = []))
)]
pub async fn list_all(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let items = fetch(pool.get_ref(), false)
        .await
        .map_err(db_error("Failed to list announcements"))?;
    Ok(HttpResponse::Ok().json(items))
}

/// Publish an announcement and mail active employees
#[utoipa::path(
    post,
    path = "/api/announcements",
    request_body = CreateAnnouncement,
    responses(
        (status = 201, description = "Published", body = Announcement),
        (status = 400, description = "Title and message are required"),
        (status = 403, description = "Admin only")
    ),
    tag = "Announcement",
    security(("bearer_auth" = []))
)]
pub async fn create(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
    payload: web::Json<CreateAnnouncement>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let payload = payload.into_inner();
    if payload.title.trim().is_empty() || payload.message.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Title and message are required"
        })));
    }

    let announcement = Announcement {
        id: Uuid::new_v4().to_string(),
        title: payload.title.trim().to_string(),
        message: payload.message.trim().to_string(),
        priority: payload.priority.unwrap_or(Priority::Low),
        created_by: Some(auth.username.clone()),
        image_url: payload.image_url.filter(|u| !u.trim().is_empty()),
        active: true,
        published_at: Utc::now().trunc_subsecs(0),
    };

    sqlx::query(
        r#"
        INSERT INTO announcements (id, title, message, priority, created_by, image_url, active, published_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&announcement.id)
    .bind(&announcement.title)
    .bind(&announcement.message)
    .bind(announcement.priority.as_ref())
    .bind(&announcement.created_by)
    .bind(&announcement.image_url)
    .bind(announcement.active)
    .bind(announcement.published_at)
    .execute(pool.get_ref())
    .await
    .map_err(db_error("Failed to create announcement"))?;

    state.feed.publish(ANNOUNCEMENTS, ChangeOp::Insert);
    record_action(
        pool.get_ref(),
        &req,
        &auth,
        "announcement.create",
        format!("id={}", announcement.id),
    )
    .await;
    info!(announcement_id = %announcement.id, "Announcement published");

    // Mail in the background; delivery problems never fail the request.
    let mailer = state.mailer.clone();
    let pool = pool.get_ref().clone();
    let to_send = announcement.clone();
    actix_web::rt::spawn(async move {
        let recipients = match sqlx::query_scalar::<_, String>(
            "SELECT email FROM employees WHERE status = 'active' AND email IS NOT NULL",
        )
        .fetch_all(&pool)
        .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Could not load announcement recipients");
                return;
            }
        };

        if let Err(e) = mailer.notify_announcement(&to_send, recipients).await {
            warn!(error = %e, announcement_id = %to_send.id, "Announcement mail failed");
        }
    });

    Ok(HttpResponse::Created().json(announcement))
}

/// Show or hide an announcement
#[utoipa::path(
    put,
    path = "/api/announcements/{id}/toggle",
    params(("id", Path, description = "Announcement ID")),
    responses(
        (status = 200, description = "New state", body = Object, example = json!({ "active": false })),
        (status = 404, description = "Not found")
    ),
    tag = "Announcement",
    security(("bearer_auth" = []))
)]
pub async fn toggle(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();

    let result = sqlx::query("UPDATE announcements SET active = NOT active WHERE id = ?")
        .bind(&id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error("Failed to toggle announcement"))?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({ "message": "Announcement not found" })));
    }

    let active = sqlx::query_scalar::<_, bool>("SELECT active FROM announcements WHERE id = ?")
        .bind(&id)
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("Failed to read announcement"))?;

    state.feed.publish(ANNOUNCEMENTS, ChangeOp::Update);
    record_action(
        pool.get_ref(),
        &req,
        &auth,
        "announcement.toggle",
        format!("id={} active={}", id, active),
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "active": active })))
}

#[utoipa::path(
    delete,
    path = "/api/announcements/{id}",
    params(("id", Path, description = "Announcement ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not found")
    ),
    tag = "Announcement",
    security(("bearer_auth" = []))
)]
pub async fn delete(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();

    let result = sqlx::query("DELETE FROM announcements WHERE id = ?")
        .bind(&id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error("Failed to delete announcement"))?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({ "message": "Announcement not found" })));
    }

    state.feed.publish(ANNOUNCEMENTS, ChangeOp::Delete);
    record_action(pool.get_ref(), &req, &auth, "announcement.delete", format!("id={}", id)).await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}
