use crate::attendance::aggregate::{AggregateFilter, YearMonth};
use crate::attendance::export::{RateSettings, build_export};
use crate::attendance::service::monthly_overtime;
use crate::attendance::session::local_date;
use crate::auth::auth::AuthUser;
use crate::state::AppState;
use actix_web::{HttpResponse, Responder, error::ErrorBadRequest, web};
use chrono::{FixedOffset, Utc};
use serde::Deserialize;
use tracing::debug;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct OvertimeQuery {
    /// `YYYY-MM`; defaults to the current month
    pub month: Option<String>,
    pub employee_id: Option<String>,
    /// Name fragment or `dd/mm/yyyy` date
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExportQuery {
    pub month: Option<String>,
    pub employee_id: Option<String>,
    pub regular_hour_rate: Option<f64>,
    pub extra_hour_multiplier: Option<f64>,
    pub weekend_multiplier: Option<f64>,
    pub night_multiplier: Option<f64>,
}

fn resolve_month(raw: Option<&str>, offset: FixedOffset) -> actix_web::Result<YearMonth> {
    match raw.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m
            .parse()
            .map_err(|_| ErrorBadRequest("month must be YYYY-MM")),
        None => Ok(YearMonth::of(local_date(Utc::now(), offset))),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Monthly overtime dashboard
#[utoipa::path(
    get,
    path = "/api/overtime",
    params(OvertimeQuery),
    responses(
        (status = 200, description = "Monthly aggregate; status is no_data when nothing could be computed", body = OvertimeReport),
        (status = 400, description = "Malformed month"),
        (status = 403, description = "Super admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Overtime"
)]
pub async fn report(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<OvertimeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_super_admin()?;

    let month = resolve_month(query.month.as_deref(), state.settings.offset)?;
    let filter = AggregateFilter {
        employee_id: non_empty(&query.employee_id),
        text: non_empty(&query.q),
    };
    debug!(%month, ?filter, "Overtime report requested");

    let report = monthly_overtime(
        state.board.as_ref(),
        &state.directory,
        month,
        &filter,
        &state.settings,
    )
    .await;

    Ok(HttpResponse::Ok().json(report))
}

/// Payload for the overtime spreadsheet
#[utoipa::path(
    get,
    path = "/api/overtime/export",
    params(ExportQuery),
    responses(
        (status = 200, description = "Export payload", body = OvertimeExport),
        (status = 400, description = "Malformed month"),
        (status = 403, description = "Super admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Overtime"
)]
pub async fn export(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<ExportQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_super_admin()?;

    let month = resolve_month(query.month.as_deref(), state.settings.offset)?;
    let employee_id = non_empty(&query.employee_id);
    let filter = AggregateFilter {
        employee_id: employee_id.clone(),
        text: None,
    };

    let defaults = RateSettings::default();
    let rates = RateSettings {
        regular_hour_rate: query.regular_hour_rate.unwrap_or(defaults.regular_hour_rate),
        extra_hour_multiplier: query
            .extra_hour_multiplier
            .unwrap_or(defaults.extra_hour_multiplier),
        weekend_multiplier: query.weekend_multiplier.unwrap_or(defaults.weekend_multiplier),
        night_multiplier: query.night_multiplier.unwrap_or(defaults.night_multiplier),
    };

    let report = monthly_overtime(
        state.board.as_ref(),
        &state.directory,
        month,
        &filter,
        &state.settings,
    )
    .await;

    let payload = build_export(&report.aggregate, employee_id, rates, state.settings.offset);
    Ok(HttpResponse::Ok().json(payload))
}
