//! HTTP API Layer
//!
//! This crate provides the REST API for the condominium core using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers per area (buildings, payments, projects, banking)
//! - **Middleware**: Authentication, tracing, audit logging
//! - **Access**: Resolves the building behind a resource before any read or write
//! - **DTOs**: Request bodies and query strings, validated with `validator`
//! - **Error Handling**: Consistent `{error, message}` responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(ports, ReconciliationConfig::default(), config);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod access;
pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use domain_banking::{ReconciliationConfig, ReconciliationPorts, ReconciliationService};
use domain_building::BuildingService;
use domain_payments::{LedgerService, ReportingService};
use domain_projects::{InstallmentLedgerView, ProjectService};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{banking, buildings, health, payments, projects};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    /// Raw ports, used for access resolution and readiness checks
    pub ports: ReconciliationPorts,
    pub buildings: Arc<BuildingService>,
    pub ledger: Arc<LedgerService>,
    pub reporting: Arc<ReportingService>,
    pub projects: Arc<ProjectService>,
    pub reconciliation: Arc<ReconciliationService>,
}

impl AppState {
    /// Wires every service on top of the given ports
    pub fn new(ports: ReconciliationPorts, reconciliation: ReconciliationConfig, config: ApiConfig) -> Self {
        let buildings = BuildingService::new(ports.buildings.clone());
        let ledger = LedgerService::new(
            ports.buildings.clone(),
            ports.payments.clone(),
            ports.notifier.clone(),
        );
        let reporting = ReportingService::new(
            ports.buildings.clone(),
            ports.payments.clone(),
            Arc::new(InstallmentLedgerView::new(ports.projects.clone())),
        );
        let projects = ProjectService::new(ports.buildings.clone(), ports.projects.clone());
        let reconciliation = ReconciliationService::new(ports.clone(), reconciliation);

        Self {
            config: Arc::new(config),
            ports,
            buildings: Arc::new(buildings),
            ledger: Arc::new(ledger),
            reporting: Arc::new(reporting),
            projects: Arc::new(projects),
            reconciliation: Arc::new(reconciliation),
        }
    }
}

/// Creates the main API router
///
/// Everything under `/api/v1` requires a bearer token; `/health` and
/// `/health/ready` are public.
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let building_routes = Router::new()
        .route("/", post(buildings::create_building))
        .route("/:id/apartments", post(buildings::add_apartment))
        .route("/:id/activate", post(buildings::activate_building))
        .route("/:id/archive", post(buildings::archive_building))
        .route("/:id/payment-map", get(payments::get_payment_map))
        .route("/:id/stats", get(payments::get_building_stats))
        .route(
            "/:id/projects",
            post(projects::create_project).get(projects::list_projects),
        )
        .route("/:id/bank/sync", post(banking::sync_bank_data))
        .route(
            "/:id/bank/transactions/unmatched",
            get(banking::list_unmatched_transactions),
        )
        .route("/:id/bank/iban-matching", post(banking::run_iban_matching));

    let apartment_routes = Router::new()
        .route("/:id/payments/:year/:month", put(payments::update_payment_status))
        .route("/:id/payments/bulk", post(payments::bulk_update_payments))
        .route("/:id/ibans", post(buildings::add_resident_iban));

    let bank_routes = Router::new()
        .route("/transactions/:id/match", post(banking::match_transaction))
        .route("/transactions/:id/ignore", post(banking::ignore_transaction));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/buildings", building_routes)
        .nest("/apartments", apartment_routes)
        .nest("/bank", bank_routes)
        .route("/ibans/:id", delete(buildings::remove_resident_iban))
        .route("/projects/:id", patch(projects::update_project))
        .route("/installments/:id", put(projects::update_installment))
        .route(
            "/residents/me/extraordinary-payments",
            get(projects::resident_extraordinary_payments),
        )
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
