//! Billing reconciler service entrypoint.
//!
//! Loads configuration, connects to PostgreSQL, wires the billing module
//! and serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use billing_reconciler::adapters::http::billing::{billing_router, BillingAppState};
use billing_reconciler::adapters::postgres::{
    PostgresEventStore, PostgresInvoiceRepository, PostgresProfileRepository,
    PostgresSubscriptionRepository,
};
use billing_reconciler::config::AppConfig;
use billing_reconciler::domain::billing::WebhookVerifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");
    }

    let state = BillingAppState {
        event_store: Arc::new(PostgresEventStore::new(pool.clone())),
        subscription_repository: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
        profile_repository: Arc::new(PostgresProfileRepository::new(pool.clone())),
        invoice_repository: Arc::new(PostgresInvoiceRepository::new(pool)),
        webhook_verifier: Arc::new(WebhookVerifier::new(
            config
                .payment
                .webhook_secret
                .expose_secret()
                .as_bytes()
                .to_vec(),
        )),
    };

    let app = Router::new()
        .nest("/api", billing_router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.server.socket_addr()).await?;
    info!("Billing reconciler listening at {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
