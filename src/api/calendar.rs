use crate::{
    auth::auth::AuthUser,
    calendar::{CalendarError, CalendarFilter, NewEvent},
    state::AppState,
    utils::audit::record_action,
};
use actix_web::{HttpRequest, HttpResponse, Responder, http::header, web};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveEvent {
    #[schema(value_type = String, format = "date")]
    pub start: NaiveDate,
    #[schema(value_type = Option<String>, format = "date")]
    pub end: Option<NaiveDate>,
}

fn invalid(e: CalendarError) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "message": e.to_string() }))
}

#[utoipa::path(
    get,
    path = "/api/calendar",
    params(
        ("kind", Query, description = "service, report, punch or absence"),
        ("operator_id", Query, description = "Assigned operator"),
        ("q", Query, description = "Title or client fragment")
    ),
    responses((status = 200, description = "Events by start date", body = [CalendarEvent])),
    tag = "Calendar",
    security(("bearer_auth" = []))
)]
pub async fn list(
    auth: AuthUser,
    state: web::Data<AppState>,
    filter: web::Query<CalendarFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    Ok(HttpResponse::Ok().json(state.calendar.list(&filter)))
}

#[utoipa::path(
    get,
    path = "/api/calendar/summary",
    responses((status = 200, description = "Events per day and kind", body = [DayCounts])),
    tag = "Calendar",
    security(("bearer_auth" = []))
)]
pub async fn summary(
    auth: AuthUser,
    state: web::Data<AppState>,
    filter: web::Query<CalendarFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    Ok(HttpResponse::Ok().json(state.calendar.day_counts(&filter)))
}

#[utoipa::path(
    post,
    path = "/api/calendar",
    request_body = NewEvent,
    responses(
        (status = 201, description = "Event added", body = CalendarEvent),
        (status = 400, description = "Empty title or end before start")
    ),
    tag = "Calendar",
    security(("bearer_auth" = []))
)]
pub async fn add(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
    body: web::Json<NewEvent>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    match state.calendar.add(body.into_inner()) {
        Ok(event) => {
            record_action(
                pool.get_ref(),
                &req,
                &auth,
                "calendar.add",
                format!("id={} kind={}", event.id, event.kind),
            )
            .await;
            Ok(HttpResponse::Created().json(event))
        }
        Err(e) => Ok(invalid(e)),
    }
}

#[utoipa::path(
    put,
    path = "/api/calendar/{id}",
    params(("id", Path, description = "Event ID")),
    request_body = MoveEvent,
    responses(
        (status = 200, description = "Event moved", body = CalendarEvent),
        (status = 400, description = "End before start"),
        (status = 404, description = "Unknown event")
    ),
    tag = "Calendar",
    security(("bearer_auth" = []))
)]
pub async fn move_event(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<MoveEvent>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();

    match state.calendar.move_event(&id, body.start, body.end) {
        Ok(Some(event)) => {
            record_action(pool.get_ref(), &req, &auth, "calendar.move", format!("id={}", id)).await;
            Ok(HttpResponse::Ok().json(event))
        }
        Ok(None) => Ok(HttpResponse::NotFound().json(json!({ "message": "Event not found" }))),
        Err(e) => Ok(invalid(e)),
    }
}

#[utoipa::path(
    delete,
    path = "/api/calendar/{id}",
    params(("id", Path, description = "Event ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Unknown event")
    ),
    tag = "Calendar",
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

    if !state.calendar.delete(&id) {
        return Ok(HttpResponse::NotFound().json(json!({ "message": "Event not found" })));
    }
    record_action(pool.get_ref(), &req, &auth, "calendar.delete", format!("id={}", id)).await;
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[utoipa::path(
    delete,
    path = "/api/calendar",
    responses((status = 200, description = "Number of events removed", body = Object, example = json!({ "removed": 4 }))),
    tag = "Calendar",
    security(("bearer_auth" = []))
)]
pub async fn clear(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let removed = state.calendar.clear();
    record_action(pool.get_ref(), &req, &auth, "calendar.clear", format!("removed={}", removed)).await;
    Ok(HttpResponse::Ok().json(json!({ "removed": removed })))
}

/// iCalendar file of the filtered events
#[utoipa::path(
    get,
    path = "/api/calendar/ics",
    responses((status = 200, description = "text/calendar body", content_type = "text/calendar")),
    tag = "Calendar",
    security(("bearer_auth" = []))
)]
pub async fn ics(
    auth: AuthUser,
    state: web::Data<AppState>,
    filter: web::Query<CalendarFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let body = state.calendar.to_ics(&filter, Utc::now());

    Ok(HttpResponse::Ok()
        .content_type("text/calendar; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"operations-calendar.ics\"",
        ))
        .body(body))
}
