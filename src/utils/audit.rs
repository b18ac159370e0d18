use actix_web::HttpRequest;
use sqlx::MySqlPool;
use tracing::warn;

use crate::auth::auth::AuthUser;

/// Best-effort audit trail: a failed insert is logged, never surfaced.
pub async fn record(
    pool: &MySqlPool,
    actor: &str,
    action: &str,
    details: Option<String>,
    ip: Option<String>,
) {
    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO audit_logs (actor, action, details, ip, created_at)
        VALUES (?, ?, ?, ?, UTC_TIMESTAMP())
        "#,
    )
    .bind(actor)
    .bind(action)
    .bind(&details)
    .bind(&ip)
    .execute(pool)
    .await
    {
        warn!(error = %e, actor, action, "Failed to write audit log");
    }
}

/// Records an admin action with the caller's username and peer address.
pub async fn record_action(
    pool: &MySqlPool,
    req: &HttpRequest,
    auth: &AuthUser,
    action: &str,
    details: impl Into<Option<String>>,
) {
    let ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_string);
    record(pool, &auth.username, action, details.into(), ip).await;
}
