// config.rs
use std::ops::RangeInclusive;
use std::str::FromStr;

use anyhow::bail;

/// Minimum length in bytes of the HS256 key behind admin tokens.
pub const MIN_JWT_SECRET_LEN: usize = 32;
pub const MAX_LISTING_DURATION_DAYS: i64 = 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub website_url: String,
    pub admin_email: String,
    pub jwt_secret: String,
    pub allowed_origins: Vec<String>,
    pub trust_proxy_headers: bool,

    // Listing lifecycle
    pub listing_duration_days: i64,
    pub reminder_days_before: i64,
    pub expiration_cron: String,
    pub reminder_cron: String,
    pub run_startup_reconciliation: bool,

    // Uploads
    pub upload_dir: String,
    pub max_photo_count: usize,
    pub max_photo_bytes: usize,

    // Email
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub notification_queue_capacity: usize,

    // Contact forms
    pub contact_rate_limit: usize,
    pub contact_rate_window_secs: u64,

    // Extraction
    pub extraction_use_browser: bool,
}

impl Config {
    pub fn init() -> anyhow::Result<Config> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/fsbo.db".to_string());
        let website_url = std::env::var("WEBSITE_URL")
            .unwrap_or_else(|_| "http://localhost:5500".to_string());
        let admin_email = std::env::var("ADMIN_EMAIL")
            .unwrap_or_else(|_| "admin@vdirealty.com".to_string());
        let jwt_secret = require_jwt_secret(std::env::var("JWT_SECRET_KEY").ok())?;
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5500,http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let smtp_host = std::env::var("SMTP_HOST").unwrap_or_default();
        let smtp_username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let smtp_password = std::env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_email = std::env::var("FROM_EMAIL")
            .unwrap_or_else(|_| "VDI Realty <noreply@vdirealty.com>".to_string());

        let listing_duration_days = env_in_range(
            "LISTING_DURATION_DAYS",
            14,
            1..=MAX_LISTING_DURATION_DAYS,
        );
        let reminder_days_before = env_in_range(
            "REMINDER_DAYS_BEFORE",
            2_i64.min(listing_duration_days - 1),
            0..=listing_duration_days - 1,
        );

        Ok(Config {
            database_url,
            port: env_or("PORT", 3000),
            website_url,
            admin_email,
            jwt_secret,
            allowed_origins,
            trust_proxy_headers: env_or("TRUST_PROXY_HEADERS", false),
            listing_duration_days,
            reminder_days_before,
            expiration_cron: std::env::var("EXPIRATION_CRON")
                .unwrap_or_else(|_| "0 0 0 * * *".to_string()),
            reminder_cron: std::env::var("REMINDER_CRON")
                .unwrap_or_else(|_| "0 0 9 * * *".to_string()),
            run_startup_reconciliation: env_or("RUN_STARTUP_RECONCILIATION", true),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            max_photo_count: env_or("MAX_PHOTO_COUNT", 10),
            max_photo_bytes: env_or("MAX_PHOTO_BYTES", 5 * 1024 * 1024),
            smtp_host,
            smtp_port: env_or("SMTP_PORT", 587),
            smtp_username,
            smtp_password,
            from_email,
            notification_queue_capacity: env_or("NOTIFICATION_QUEUE_CAPACITY", 256),
            contact_rate_limit: env_or("CONTACT_RATE_LIMIT", 5),
            contact_rate_window_secs: env_or("CONTACT_RATE_WINDOW_SECS", 3600),
            extraction_use_browser: env_or("EXTRACTION_USE_BROWSER", false),
        })
    }
}

/// The admin token key has no fallback; a missing or short key stops startup.
fn require_jwt_secret(raw: Option<String>) -> anyhow::Result<String> {
    let Some(secret) = raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) else {
        bail!("JWT_SECRET_KEY must be set");
    };
    if secret.len() < MIN_JWT_SECRET_LEN {
        bail!("JWT_SECRET_KEY must be at least {} bytes long", MIN_JWT_SECRET_LEN);
    }
    Ok(secret)
}

/// Reads and parses an env var, falling back to `default` when it is unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("{} has an invalid value {:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// Like [`env_or`], but values outside `range` are also replaced by `default`.
fn env_in_range<T>(key: &str, default: T, range: RangeInclusive<T>) -> T
where
    T: FromStr + PartialOrd + std::fmt::Debug + Copy,
{
    let value = env_or(key, default);
    if range.contains(&value) {
        value
    } else {
        tracing::warn!(
            "{} is {:?}, outside {:?}..={:?}, using default {:?}",
            key,
            value,
            range.start(),
            range.end(),
            default
        );
        default
    }
}

#[cfg(test)]
impl Config {
    /// Settings for tests; nothing is read from the environment.
    pub fn for_tests(upload_dir: &str) -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            port: 0,
            website_url: "http://localhost:5500".to_string(),
            admin_email: "admin@example.com".to_string(),
            jwt_secret: "test-secret".to_string(),
            allowed_origins: vec![],
            trust_proxy_headers: false,
            listing_duration_days: 14,
            reminder_days_before: 2,
            expiration_cron: "0 0 0 * * *".to_string(),
            reminder_cron: "0 0 9 * * *".to_string(),
            run_startup_reconciliation: false,
            upload_dir: upload_dir.to_string(),
            max_photo_count: 10,
            max_photo_bytes: 5 * 1024 * 1024,
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: "VDI Realty <noreply@example.com>".to_string(),
            notification_queue_capacity: 16,
            contact_rate_limit: 5,
            contact_rate_window_secs: 3600,
            extraction_use_browser: false,
        }
    }
}
