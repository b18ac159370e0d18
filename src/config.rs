use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use crate::attendance::bucket::DEFAULT_DAILY_THRESHOLD_MINUTES;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,
    pub rate_terminal_per_min: u32,

    pub api_prefix: String,
    pub log_level: tracing::Level,

    // Attendance engine
    pub daily_threshold_minutes: i64,
    pub utc_offset_minutes: i32,
    /// Seconds a cached month of punches is trusted without a local write
    pub snapshot_ttl_secs: u64,

    // Outgoing mail (announcements)
    pub mail_api_url: String,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    pub app_url: String,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn or_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|l| tracing::Level::from_str(&l).ok())
            .unwrap_or(tracing::Level::DEBUG);

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: or_default("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: or_default("REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: or_default("RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: or_default("RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: or_default("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: or_default("RATE_PROTECTED_PER_MIN", 1000)?,
            rate_terminal_per_min: or_default("RATE_TERMINAL_PER_MIN", 120)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_level,

            daily_threshold_minutes: or_default(
                "DAILY_THRESHOLD_MINUTES",
                DEFAULT_DAILY_THRESHOLD_MINUTES,
            )?,
            utc_offset_minutes: or_default("ATTENDANCE_UTC_OFFSET_MINUTES", 0)?,
            snapshot_ttl_secs: or_default("SNAPSHOT_TTL_SECS", 60)?,

            mail_api_url: env::var("MAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
            mail_api_key: env::var("MAIL_API_KEY").ok().filter(|k| !k.is_empty()),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "notifications@localhost".to_string()),
            app_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }
}
