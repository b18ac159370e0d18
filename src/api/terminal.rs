use crate::api::internal;
use crate::attendance::service::{CardOutcome, punch_by_card};
use crate::auth::auth::AuthUser;
use crate::model::punch::PunchSource;
use crate::state::AppState;
use crate::utils::audit::record_action;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CardRead {
    #[schema(example = "04A1B2C3")]
    pub card_id: String,
    #[schema(example = "Main gate")]
    pub location: Option<String>,
}

impl CardRead {
    /// Trimmed card id and location; `None` when the card id is blank.
    fn normalized(self) -> Option<(String, Option<String>)> {
        let card_id = self.card_id.trim().to_string();
        if card_id.is_empty() {
            return None;
        }
        let location = self.location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
        Some((card_id, location))
    }
}

fn card_response(outcome: CardOutcome) -> HttpResponse {
    match outcome {
        CardOutcome::Recorded(punch) => HttpResponse::Created().json(punch),
        CardOutcome::UnknownCard => {
            HttpResponse::NotFound().json(json!({ "message": "Unknown card" }))
        }
        CardOutcome::InactiveEmployee { employee_name } => HttpResponse::Forbidden().json(json!({
            "message": "Employee inactive",
            "employee_name": employee_name
        })),
    }
}

async fn read_card(
    state: &AppState,
    body: CardRead,
    source: PunchSource,
) -> actix_web::Result<HttpResponse> {
    let Some((card_id, location)) = body.normalized() else {
        return Ok(HttpResponse::BadRequest().json(json!({ "message": "card_id is required" })));
    };

    let outcome = punch_by_card(
        &state.punches,
        &state.directory,
        &state.feed,
        &card_id,
        source,
        location,
        Utc::now(),
    )
    .await
    .map_err(internal("Card punch failed"))?;

    Ok(card_response(outcome))
}

/// Badge read at a clock terminal
#[utoipa::path(
    post,
    path = "/terminal/card",
    request_body = CardRead,
    responses(
        (status = 201, description = "Punch recorded", body = Punch),
        (status = 400, description = "Empty card id"),
        (status = 403, description = "Card of an inactive employee", body = Object, example = json!({
            "message": "Employee inactive", "employee_name": "Luis Mora"
        })),
        (status = 404, description = "Card not assigned to any employee", body = Object, example = json!({
            "message": "Unknown card"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Terminal"
)]
pub async fn card(
    state: web::Data<AppState>,
    body: web::Json<CardRead>,
) -> actix_web::Result<impl Responder> {
    read_card(&state, body.into_inner(), PunchSource::Terminal).await
}

/// Badge read from the scanner on the admin employee page
#[utoipa::path(
    post,
    path = "/api/employees/scan",
    request_body = CardRead,
    responses(
        (status = 201, description = "Punch recorded", body = Punch),
        (status = 400, description = "Empty card id"),
        (status = 403, description = "Admin only, or card of an inactive employee"),
        (status = 404, description = "Unknown card")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn scan(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
    body: web::Json<CardRead>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let response = read_card(&state, body.into_inner(), PunchSource::Card).await?;

    if response.status().is_success() {
        record_action(pool.get_ref(), &req, &auth, "attendance.scan", None::<String>).await;
    }
    Ok(response)
}
