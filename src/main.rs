mod config;
mod db;
mod dtos;
mod error;
mod extraction;
mod handler;
mod mail;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use config::Config;
use db::{db::DBClient, listingdb::ListingExt};
use dotenv::dotenv;
use extraction::{
    fetcher::{BrowserFetcher, HttpFetcher},
    traits::PageFetcher,
    ListingExtractor,
};
use mail::{
    mails::MailContext,
    sendmail::{default_retry_delay, MailTransport, SmtpMailer},
};
use middleware::RateLimiter;
use routes::create_router;
use service::{
    lifecycle_service::LifecycleService,
    listing_service::{ListingService, UploadSettings},
    notification_service::{EmailNotificationService, NotificationDispatcher, NotificationGateway},
    scheduler::{start_lifecycle_scheduler, LifecycleJobs},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;
use utils::{
    clock::{Clock, SystemClock},
    token::{create_token, ADMIN_ROLE},
};

const ADMIN_TOKEN_TTL_SECS: i64 = 60 * 60 * 24 * 30;

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: DBClient,
    pub lifecycle: Arc<LifecycleService>,
    pub listing_service: Arc<ListingService>,
    pub extractor: Arc<ListingExtractor>,
    pub contact_limiter: RateLimiter,
}

impl AppState {
    /// Wires the services together. Starts the notification worker, so it
    /// must run inside the tokio runtime.
    pub fn new(
        env: Config,
        db_client: DBClient,
        notifier: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let store: Arc<dyn ListingExt> = Arc::new(db_client.clone());

        let lifecycle = Arc::new(LifecycleService::new(
            store.clone(),
            notifier.clone(),
            clock,
            env.listing_duration_days,
            env.reminder_days_before,
        ));
        let dispatcher =
            NotificationDispatcher::start(notifier.clone(), env.notification_queue_capacity);
        let listing_service = Arc::new(ListingService::new(
            store,
            lifecycle.clone(),
            notifier,
            dispatcher,
            UploadSettings {
                upload_dir: PathBuf::from(&env.upload_dir),
                max_photo_count: env.max_photo_count,
                max_photo_bytes: env.max_photo_bytes,
            },
        ));
        let contact_limiter = RateLimiter::new(
            env.contact_rate_limit,
            Duration::from_secs(env.contact_rate_window_secs),
        );

        AppState {
            env,
            db_client,
            lifecycle,
            listing_service,
            extractor: Arc::new(ListingExtractor::new(fetcher)),
            contact_limiter,
        }
    }
}

fn log_level() -> LevelFilter {
    std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::INFO)
}

/// `issue-admin-token <email>` prints a bearer token for the admin endpoints.
fn issue_admin_token(config: &Config, subject: Option<String>) {
    let Some(subject) = subject else {
        eprintln!("usage: fsbo-listings issue-admin-token <email>");
        std::process::exit(2);
    };

    match create_token(&subject, ADMIN_ROLE, config.jwt_secret.as_bytes(), ADMIN_TOKEN_TTL_SECS) {
        Ok(token) => println!("{}", token),
        Err(e) => {
            eprintln!("Failed to create admin token: {}", e);
            std::process::exit(1);
        }
    }
}

fn page_fetcher(config: &Config) -> Arc<dyn PageFetcher> {
    if config.extraction_use_browser {
        tracing::info!("Listing extraction uses headless Chrome");
        return Arc::new(BrowserFetcher);
    }

    match HttpFetcher::new() {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            tracing::error!("Failed to create HTTP client for extraction: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt().with_max_level(log_level()).init();

    let config = match Config::init() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => {}
        Some("issue-admin-token") => {
            issue_admin_token(&config, args.next());
            return;
        }
        Some(other) => {
            eprintln!("unknown command '{}'", other);
            std::process::exit(2);
        }
    }

    let db_client = match DBClient::connect(&config.database_url, 5).await {
        Ok(client) => {
            tracing::info!("Connection to the database is successful");
            client
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let transport = match SmtpMailer::from_config(&config) {
        Ok(mailer) => mailer.map(|m| Arc::new(m) as Arc<dyn MailTransport>),
        Err(e) => {
            tracing::error!("Invalid SMTP configuration, outbound email disabled: {}", e);
            None
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier: Arc<dyn NotificationGateway> = Arc::new(EmailNotificationService::new(
        transport,
        MailContext {
            website_url: config.website_url.clone(),
            admin_email: config.admin_email.clone(),
            listing_duration_days: config.listing_duration_days,
            reminder_days_before: config.reminder_days_before,
        },
        clock.clone(),
        default_retry_delay(),
    ));

    let app_state = Arc::new(AppState::new(
        config.clone(),
        db_client,
        notifier,
        clock,
        page_fetcher(&config),
    ));

    let jobs = LifecycleJobs::new(app_state.lifecycle.clone());
    if config.run_startup_reconciliation {
        jobs.reconcile().await;
    }

    let _scheduler =
        match start_lifecycle_scheduler(jobs, &config.expiration_cron, &config.reminder_cron).await {
            Ok(scheduler) => scheduler,
            Err(e) => {
                tracing::error!("Failed to start lifecycle scheduler: {:#}", e);
                std::process::exit(1);
            }
        };

    let app = create_router(app_state).layer(cors_layer(&config));

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind port {}: {}", config.port, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server is running on http://localhost:{}", config.port);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!("Server error: {}", e);
    }
}
