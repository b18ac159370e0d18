use crate::api::{internal, paging};
use crate::attendance::service::{
    absent_today as absent_employees, punch_log, punch_manual, recent_punches, today_progress,
};
use crate::attendance::session::local_date;
use crate::auth::auth::AuthUser;
use crate::model::punch::PunchKind;
use crate::state::AppState;
use crate::store::directory::Directory;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PunchRequest {
    /// Omit to toggle against the last punch
    pub kind: Option<PunchKind>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Local days to look back, 1 to 92 (default 10)
    pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PunchLogQuery {
    /// First local day, inclusive (default: six days before `to`)
    #[param(value_type = Option<String>, example = "2025-03-01")]
    pub from: Option<NaiveDate>,
    /// Last local day, inclusive (default: today)
    #[param(value_type = Option<String>, example = "2025-03-07")]
    pub to: Option<NaiveDate>,
    pub employee_id: Option<String>,
    pub page: Option<u32>,
    /// Default 20
    pub per_page: Option<u32>,
}

/// Inclusive day window of the punch log.
fn log_window(query: &PunchLogQuery, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), String> {
    let last = query.to.unwrap_or(today);
    let first = query.from.unwrap_or(last - Duration::days(6));
    if first > last {
        return Err(format!("from ({first}) is after to ({last})"));
    }
    Ok((first, last))
}

/// Manual punch for the caller's own employee record
#[utoipa::path(
    post,
    path = "/api/attendance/punch",
    request_body = PunchRequest,
    responses(
        (status = 201, description = "Punch recorded", body = Punch),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn punch(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: Option<web::Json<PunchRequest>>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id()?;
    let kind = body.and_then(|b| b.into_inner().kind);

    let name = match state.directory.display_name(employee_id).await {
        Ok(Some(name)) => name,
        Ok(None) => auth.username.clone(),
        Err(e) => {
            warn!(error = %e, employee_id, "Name lookup failed, using username");
            auth.username.clone()
        }
    };

    let stored = punch_manual(&state.punches, &state.feed, employee_id, &name, kind, Utc::now())
        .await
        .map_err(internal("Manual punch failed"))?;

    Ok(HttpResponse::Created().json(stored))
}

/// Worked time so far today
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's progress", body = TodayProgress),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(auth: AuthUser, state: web::Data<AppState>) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id()?;

    let progress = today_progress(&state.punches, employee_id, Utc::now(), &state.settings)
        .await
        .map_err(internal("Failed to load today's punches"))?;

    Ok(HttpResponse::Ok().json(progress))
}

/// Own punches, newest first
#[utoipa::path(
    get,
    path = "/api/attendance/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Punches", body = [Punch]),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<HistoryQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id()?;
    let days = query.days.unwrap_or(10);

    let punches = recent_punches(&state.punches, employee_id, days, Utc::now(), &state.settings)
        .await
        .map_err(internal("Failed to load punch history"))?;

    Ok(HttpResponse::Ok().json(punches))
}

/// Every employee's punches over a date range, newest first
#[utoipa::path(
    get,
    path = "/api/attendance/admin",
    params(PunchLogQuery),
    responses(
        (status = 200, description = "Page of punches", body = PunchLog),
        (status = 400, description = "from is after to"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn admin_log(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PunchLogQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let today = local_date(Utc::now(), state.settings.offset);
    let (first, last) = match log_window(&query, today) {
        Ok(window) => window,
        Err(message) => return Ok(HttpResponse::BadRequest().json(json!({ "message": message }))),
    };
    let employee_id = query.employee_id.as_deref().map(str::trim).filter(|e| !e.is_empty());

    let log = punch_log(
        &state.punches,
        employee_id,
        first,
        last,
        paging(query.page, query.per_page),
        &state.settings,
    )
    .await
    .map_err(internal("Failed to load punch log"))?;

    Ok(HttpResponse::Ok().json(log))
}

/// Active employees with no punch today
#[utoipa::path(
    get,
    path = "/api/attendance/absent-today",
    responses(
        (status = 200, description = "Absent employees, by name", body = [RosterEntry]),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn absent_today(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let absent = absent_employees(&state.punches, &state.directory, Utc::now(), &state.settings)
        .await
        .map_err(internal("Failed to list absent employees"))?;

    Ok(HttpResponse::Ok().json(absent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn log_window_defaults_to_the_last_week() {
        let window = log_window(&PunchLogQuery::default(), day(10)).unwrap();
        assert_eq!(window, (day(4), day(10)));

        let query = PunchLogQuery {
            to: Some(day(8)),
            ..Default::default()
        };
        assert_eq!(log_window(&query, day(10)).unwrap(), (day(2), day(8)));
    }

    #[test]
    fn log_window_rejects_reversed_range() {
        let query = PunchLogQuery {
            from: Some(day(9)),
            to: Some(day(3)),
            ..Default::default()
        };
        assert!(log_window(&query, day(10)).is_err());
    }
}
