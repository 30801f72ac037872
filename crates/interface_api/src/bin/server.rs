//! Condominium Core - API Server Binary
//!
//! Starts the HTTP API on top of the PostgreSQL repositories and the HTTP
//! bank data provider.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin condo-api
//!
//! # Run with environment variables
//! CONDO_PORT=8080 CONDO_DATABASE_URL=postgres://... cargo run --bin condo-api
//! ```
//!
//! # Environment Variables
//!
//! * `CONDO_HOST` - Server host (default: 0.0.0.0)
//! * `CONDO_PORT` - Server port (default: 8080)
//! * `CONDO_JWT_SECRET` - JWT signing secret (required in production)
//! * `CONDO_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `CONDO_DATABASE_URL` - PostgreSQL connection string
//! * `CONDO_LOG_LEVEL` - Log level or filter directive (default: info)
//! * `CONDO_LOG_JSON` - Emit JSON log lines (default: false)
//! * `CONDO_BANK_API_BASE_URL`, `CONDO_BANK_API_KEY` - Bank data provider
//! * `CONDO_BANK_TIMEOUT_SECS`, `CONDO_BANK_MAX_RETRIES` - Provider call limits

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use core_kernel::{CircuitBreakerConfig, TracingNotifier};
use domain_banking::{BankApiConfig, HttpBankDataProvider, ReconciliationConfig, ReconciliationPorts};
use infra_db::{
    create_pool, DatabaseConfig, PgBankingRepository, PgBuildingRepository,
    PgPaymentLedgerRepository, PgProjectRepository,
};
use interface_api::{config::ApiConfig, create_router, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("invalid CONDO_* configuration")?;

    init_tracing(&config.log_level, config.log_json);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting Condominium Core API Server"
    );
    if config.uses_default_secret() {
        tracing::warn!("CONDO_JWT_SECRET is not set, using the development secret");
    }

    let pool = create_pool(DatabaseConfig::new(&config.database_url))
        .await
        .context("database connection failed")?;

    let provider = HttpBankDataProvider::new(BankApiConfig {
        base_url: config.bank_api_base_url.clone(),
        api_key: config.bank_api_key.clone(),
        timeout_secs: config.bank_timeout_secs,
        circuit_breaker: Some(CircuitBreakerConfig::default()),
    })
    .context("bank data provider setup failed")?;

    let ports = ReconciliationPorts {
        buildings: Arc::new(PgBuildingRepository::new(pool.clone())),
        payments: Arc::new(PgPaymentLedgerRepository::new(pool.clone())),
        projects: Arc::new(PgProjectRepository::new(pool.clone())),
        banking: Arc::new(PgBankingRepository::new(pool)),
        provider: Arc::new(provider),
        notifier: Arc::new(TracingNotifier),
    };
    let reconciliation = ReconciliationConfig {
        call_timeout_secs: config.bank_timeout_secs,
        max_retries: config.bank_max_retries,
        ..Default::default()
    };

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .context("invalid CONDO_HOST/CONDO_PORT")?;
    let app = create_router(AppState::new(ports, reconciliation, config));

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
