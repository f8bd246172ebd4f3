//! Campus card wallet backend.
//!
//! Spending limits, deposits, alerts, reports, gifts and the product
//! catalog, served over a JSON REST API backed by SQLite.

pub mod backend;
