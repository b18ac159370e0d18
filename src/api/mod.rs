pub mod account;
pub mod announcement;
pub mod attendance;
pub mod audit;
pub mod calendar;
pub mod employee;
pub mod overtime;
pub mod terminal;

use actix_web::error::ErrorInternalServerError;
use tracing::error;

use crate::store::error::StoreError;

/// Logs a store failure and hides its details from the caller.
pub(crate) fn internal(context: &'static str) -> impl Fn(StoreError) -> actix_web::Error {
    move |e| {
        error!(error = %e, "{context}");
        ErrorInternalServerError("Internal Server Error")
    }
}

pub(crate) fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> actix_web::Error {
    move |e| {
        error!(error = %e, "{context}");
        ErrorInternalServerError("Database error")
    }
}

/// Page window from optional query values.
pub(crate) fn paging(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    (page, per_page, (page - 1) * per_page)
}
