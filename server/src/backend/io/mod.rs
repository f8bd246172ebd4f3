//! # IO Module
//!
//! Adapter layer between HTTP clients and the domain services.
//!
//! ## Key Responsibilities
//!
//! - **API Endpoints**: JSON REST endpoints under `/api`
//! - **Identity**: the caller's opaque user id comes from the `x-user-id` header
//! - **Error Translation**: `DomainError` variants become HTTP status codes
//!
//! Handlers contain no business rules; every decision is made in the domain.

pub mod rest;

pub use rest::*;
