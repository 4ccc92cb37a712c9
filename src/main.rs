mod auth;
mod config;
mod db;
mod error;
mod extractors;
mod geo;
mod handlers;
mod middleware;
mod models;
mod openapi;
mod search;
mod startup;
mod store;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth::{LogDelivery, OtpCache, OtpDelivery, WebhookDelivery};
use config::StoreBackend;
use store::{MemoryStore, PgStore, Store};

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use handlers::MetricsState;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub otp: OtpCache,
    pub otp_delivery: Arc<dyn OtpDelivery>,
    pub config: AppConfig,
    pub metrics: Arc<MetricsState>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with conditional JSON/text output
    let use_json = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "text".to_string()) == "json";

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,medfinder=debug,tower_http=debug".into());

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        // Human-readable for development
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    handlers::health::mark_started();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Configuration error: {}", e);
        e
    })?;

    let store: Arc<dyn Store> = match (&config.store_backend, &config.database_url) {
        (StoreBackend::Postgres, Some(database_url)) => {
            let pool = db::create_pool(database_url).await.map_err(|e| {
                tracing::error!("Failed to create database pool: {}", e);
                e
            })?;
            tracing::info!("Database pool created successfully");

            db::run_migrations(&pool).await.map_err(|e| {
                tracing::error!("Failed to apply migrations: {}", e);
                e
            })?;
            tracing::info!("Database migrations applied");

            Arc::new(PgStore::new(pool))
        }
        (StoreBackend::Postgres, None) => return Err("DATABASE_URL must be set when STORE_BACKEND=postgres".into()),
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        startup::seed_admin(store.as_ref(), email, password).await?;
    }

    // Initialize metrics recorder
    let metrics_state = Arc::new(handlers::setup_metrics_recorder()?);
    tracing::info!("Metrics recorder initialized");

    let otp_delivery: Arc<dyn OtpDelivery> = match &config.otp_webhook_url {
        Some(url) => {
            tracing::info!("OTP codes delivered via webhook");
            Arc::new(WebhookDelivery::new(url.clone()))
        }
        None => {
            tracing::warn!("OTP_WEBHOOK_URL not set; OTP codes are written to the log");
            Arc::new(LogDelivery)
        }
    };

    // Create application state
    let state = Arc::new(AppState {
        store,
        otp: OtpCache::new(config.otp_ttl_secs),
        otp_delivery,
        config: config.clone(),
        metrics: metrics_state,
    });

    // Build router
    let app = startup::build_router(state);

    // Start server
    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
