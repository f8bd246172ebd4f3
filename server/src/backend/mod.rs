//! # Backend Module
//!
//! Contains all non-UI logic for the campus card wallet.
//!
//! ## Architecture
//!
//! The backend follows a layered architecture:
//! ```text
//! HTTP clients (student app, parent portal, admin reports)
//!     ↓
//! IO Layer (REST API, handlers)
//!     ↓
//! Domain Layer (Business logic, services)
//!     ↓
//! Storage Layer (SQLite repositories)
//! ```
//!
//! ## Key Responsibilities
//!
//! - Initialize the application state from an explicit `AppConfig`
//! - Set up the REST API router with CORS and request tracing
//! - Coordinate between domain logic and data persistence

pub mod config;
pub mod domain;
pub mod io;
pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::backend::config::{AppConfig, PolicyConfig};
use crate::backend::domain::{
    AlertService, CatalogService, DepositService, GiftService, LinkService, PaymentMethodService,
    PurchaseService, ReportingService, SpendingService,
};
use crate::backend::storage::{DbConnection, PurchaseHistory, TransactionRepository};

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub spending_service: SpendingService,
    pub purchase_service: PurchaseService,
    pub deposit_service: DepositService,
    pub payment_method_service: PaymentMethodService,
    pub link_service: LinkService,
    pub alert_service: AlertService,
    pub reporting_service: ReportingService,
    pub catalog_service: CatalogService,
    pub gift_service: GiftService,
    /// Secret expected from the payment processor, `None` disables settlement
    pub payment_token: Option<String>,
}

impl AppState {
    /// Wire every service to one database and one policy
    pub fn new(db: Arc<DbConnection>, policy: &PolicyConfig) -> Self {
        let history: Arc<dyn PurchaseHistory> = Arc::new(TransactionRepository::new((*db).clone()));

        let alert_service = AlertService::new(db.clone());
        let catalog_service = CatalogService::new(db.clone());
        let spending_service = SpendingService::new(db.clone(), history.clone(), policy.clone());
        let purchase_service = PurchaseService::new(
            db.clone(),
            spending_service.clone(),
            catalog_service.clone(),
            alert_service.clone(),
            policy.clone(),
        );
        let deposit_service = DepositService::new(db.clone(), policy, alert_service.clone());
        let gift_service = GiftService::new(db.clone(), catalog_service.clone(), spending_service.clone());

        Self {
            spending_service,
            purchase_service,
            deposit_service,
            payment_method_service: PaymentMethodService::new(db.clone()),
            link_service: LinkService::new(db),
            alert_service,
            reporting_service: ReportingService::new(history),
            catalog_service,
            gift_service,
            payment_token: None,
        }
    }

    pub fn with_payment_token(mut self, payment_token: Option<String>) -> Self {
        self.payment_token = payment_token;
        self
    }
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: &AppConfig) -> Result<AppState> {
    config.validate()?;

    info!("Setting up database at {}", config.database_url);
    let db = DbConnection::new(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    info!("Setting up domain model");
    Ok(AppState::new(Arc::new(db), &config.policy).with_payment_token(config.payment_token.clone()))
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, cors_origin: &str) -> Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin '{}'", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/spending/check", post(io::check_purchase))
        .route("/spending/:school_id/:student_id/status", get(io::get_spending_status))
        .route(
            "/spending/:school_id/:student_id/limits",
            get(io::get_spending_limit).put(io::update_spending_limit),
        )
        .route("/purchases", post(io::record_purchase))
        .route("/deposits", get(io::list_deposits).post(io::create_deposit))
        .route("/deposits/validate", post(io::validate_deposit))
        .route("/deposits/:id/complete", post(io::complete_deposit))
        .route("/deposits/:id/fail", post(io::fail_deposit))
        .route("/deposits/:id/cancel", post(io::cancel_deposit))
        .route(
            "/payment-methods",
            get(io::list_payment_methods).post(io::add_payment_method),
        )
        .route("/payment-methods/:id", delete(io::remove_payment_method))
        .route("/payment-methods/:id/default", post(io::set_default_payment_method))
        .route(
            "/links",
            get(io::list_links).post(io::link_student).delete(io::unlink_student),
        )
        .route("/alerts", post(io::create_alert))
        .route("/alerts/unread", get(io::get_unread_alerts))
        .route("/alerts/:id/read", post(io::mark_alert_read))
        .route("/reports/schools/:school_id", get(io::get_school_report))
        .route("/reports/students/:student_id", get(io::get_student_report))
        .route("/schools/:school_id/products", get(io::list_products))
        .route("/profiles/:school_id/:student_id", get(io::get_profile))
        .route("/favorites", get(io::list_favorites).post(io::add_favorite))
        .route("/favorites/:product_id", delete(io::remove_favorite))
        .route("/gifts", get(io::list_received_gifts).post(io::send_gift))
        .route("/gifts/redeem", post(io::redeem_gift))
        .route("/gifts/:id/thanks", post(io::send_thank_you))
        .route("/thanks", get(io::list_thank_you_notes));

    Ok(Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state))
}
