//! # Domain Module
//!
//! Business rules for the campus card wallet.
//!
//! ## Module Organization
//!
//! - **limit_policy**: pure purchase eligibility rules and status math
//! - **usage**: lazy daily/monthly windows over purchase history
//! - **spending_service**: spending limits, status and `can_make_purchase`
//! - **deposit_validator** / **deposit_service**: deposit checks and lifecycle
//! - **payment_method_service**, **link_service**: parent-side records
//! - **alert_service**: append-only parent alerts
//! - **reporting_service**: school and student roll-ups
//! - **purchase_service**: recording purchases with debit and alerts
//! - **gift_service**, **catalog_service**: gifts, notes, profiles, products, favorites
//!
//! ## Business Rules
//!
//! - A student without a stored limit gets the configured defaults, never "unlimited"
//! - Purchase checks fail closed
//! - Money uses the two-decimal convention and a single currency
//! - Deposits only change status while pending
//! - Balance changes and the records that cause them are written atomically

pub mod alert_service;
pub mod catalog_service;
pub mod deposit_service;
pub mod deposit_validator;
pub mod errors;
pub mod gift_service;
pub mod limit_policy;
pub mod link_service;
pub mod money;
pub mod payment_method_service;
pub mod purchase_service;
pub mod reporting_service;
pub mod spending_service;
pub mod usage;

pub use alert_service::AlertService;
pub use catalog_service::CatalogService;
pub use deposit_service::DepositService;
pub use deposit_validator::DepositValidator;
pub use errors::{DomainError, DomainResult};
pub use gift_service::GiftService;
pub use limit_policy::{PurchaseDecision, PurchaseDenial, UsageSnapshot};
pub use link_service::LinkService;
pub use payment_method_service::PaymentMethodService;
pub use purchase_service::PurchaseService;
pub use reporting_service::ReportingService;
pub use spending_service::SpendingService;
