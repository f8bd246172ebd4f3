//! # REST API Interface Layer
//!
//! JSON endpoints for the campus card backend. Each `*_apis` module holds
//! the handlers for one area and translates between HTTP and the domain
//! services held in `AppState`.
//!
//! Failures are returned as `{"error": "..."}` with the status chosen by
//! the `DomainError` variant.

pub mod error;
pub mod extractors;

pub mod alert_apis;
pub mod catalog_apis;
pub mod deposit_apis;
pub mod gift_apis;
pub mod link_apis;
pub mod payment_method_apis;
pub mod purchase_apis;
pub mod report_apis;
pub mod spending_apis;

pub use alert_apis::*;
pub use catalog_apis::*;
pub use deposit_apis::*;
pub use extractors::{CurrentUser, PaymentProcessor};
pub use gift_apis::*;
pub use link_apis::*;
pub use payment_method_apis::*;
pub use purchase_apis::*;
pub use report_apis::*;
pub use spending_apis::*;
