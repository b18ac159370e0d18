use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;

mod api;
mod attendance;
mod auth;
mod calendar;
mod config;
mod db;
mod docs;
mod model;
mod models;
mod routes;
mod state;
mod store;
mod utils;

use config::Config;
use db::init_db;
use state::AppState;

use crate::docs::ApiDoc;
use crate::utils::{lookup_filter, username_cache};
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Timeclock is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(
        addr = %config.server_addr,
        threshold_minutes = config.daily_threshold_minutes,
        utc_offset_minutes = config.utc_offset_minutes,
        "Server starting..."
    );

    let pool = init_db(&config.database_url).await?;

    let state = Data::new(AppState::new(&config, pool.clone()).context("Failed to build mailer")?);
    if !state.mailer.is_enabled() {
        info!("MAIL_API_KEY not set, announcement e-mails are logged only");
    }

    // card lookups need a populated filter before the first badge read
    if let Err(e) = lookup_filter::warmup_all(&pool, 100).await {
        error!(error = ?e, "Failed to warm up lookup filters");
    }

    let pool_for_cache_warmup = pool.clone();
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    actix_web::rt::spawn(async move {
        // Warm up last 30 days of recent users in batches of 250
        if let Err(e) = username_cache::warmup(&pool_for_cache_warmup, 30, 250).await {
            error!(error = ?e, "Failed to warm up username cache");
        }
    });

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(state.clone())
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
