//! # Storage Module
//!
//! SQLite persistence for the campus card backend. Each table has a
//! repository that owns its SQL; flows touching several tables (purchases,
//! gifts, deposit completion) run inside one database transaction in the
//! repository that owns the primary record.
//!
//! Timestamps are stored as RFC 3339 UTC strings with millisecond precision
//! so that string comparison orders them chronologically.

pub mod connection;
pub mod repositories;
pub mod traits;

use chrono::{DateTime, SecondsFormat, Utc};

pub use connection::DbConnection;
pub use repositories::{
    AlertRepository, DebitOutcome, DepositCompletion, DepositRepository, FavoriteRepository, GiftRedemption,
    GiftRepository, LinkRepository, PaymentMethodRepository, ProductRepository, ProfileRepository, SpendingGuard,
    SpendingLimitRepository, TransactionRepository,
};
pub use traits::PurchaseHistory;

/// Canonical storage format for timestamps
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored or client-supplied RFC 3339 timestamp into UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
