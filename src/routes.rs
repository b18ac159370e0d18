use crate::{
    api::{account, announcement, attendance, audit, calendar, employee, overtime, terminal},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;
use tracing::warn;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| {
            warn!(requests_per_min, "Invalid rate limit, using governor defaults");
            GovernorConfig::default()
        });
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));
    let terminal_limiter = Arc::new(build_limiter(config.rate_terminal_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Clock terminals authenticate by badge only
    cfg.service(
        web::scope("/terminal").service(
            web::resource("/card")
                .wrap(terminal_limiter)
                .route(web::post().to(terminal::card)),
        ),
    );

    // Protected routes; role checks live in the handlers
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(handlers::me)
            .service(
                web::scope("/attendance")
                    .service(web::resource("/punch").route(web::post().to(attendance::punch)))
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(web::resource("/history").route(web::get().to(attendance::history)))
                    .service(web::resource("/admin").route(web::get().to(attendance::admin_log)))
                    .service(
                        web::resource("/absent-today").route(web::get().to(attendance::absent_today)),
                    ),
            )
            .service(
                web::scope("/overtime")
                    .service(web::resource("").route(web::get().to(overtime::report)))
                    .service(web::resource("/export").route(web::get().to(overtime::export))),
            )
            .service(
                web::scope("/employees")
                    // /employees
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(web::resource("/stats").route(web::get().to(employee::employee_stats)))
                    .service(web::resource("/scan").route(web::post().to(terminal::scan)))
                    // /employees/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    // /employees/{id}/status
                    .service(
                        web::resource("/{id}/status")
                            .route(web::put().to(employee::toggle_status)),
                    ),
            )
            .service(
                web::scope("/announcements")
                    .service(
                        web::resource("")
                            .route(web::get().to(announcement::list_active))
                            .route(web::post().to(announcement::create)),
                    )
                    .service(web::resource("/all").route(web::get().to(announcement::list_all)))
                    .service(
                        web::resource("/{id}").route(web::delete().to(announcement::delete)),
                    )
                    .service(
                        web::resource("/{id}/toggle").route(web::put().to(announcement::toggle)),
                    ),
            )
            .service(
                web::resource("/users/{id}/employee").route(web::put().to(account::link_employee)),
            )
            .service(web::resource("/audit").route(web::get().to(audit::list)))
            .service(
                web::scope("/calendar")
                    .service(
                        web::resource("")
                            .route(web::get().to(calendar::list))
                            .route(web::post().to(calendar::add))
                            .route(web::delete().to(calendar::clear)),
                    )
                    .service(web::resource("/summary").route(web::get().to(calendar::summary)))
                    .service(web::resource("/ics").route(web::get().to(calendar::ics)))
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(calendar::move_event))
                            .route(web::delete().to(calendar::delete)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token
//       └─ role resolved from the directory on every request

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ old refresh token revoked, new pair returned
