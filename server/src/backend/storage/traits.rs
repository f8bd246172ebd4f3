//! # Storage Traits
//!
//! Read-side abstraction over purchase history so the usage and reporting
//! code can be driven by any transaction source, not only SQLite.

use anyhow::Result;
use async_trait::async_trait;
use shared::PurchaseTransaction;

/// Bulk query source for purchases
#[async_trait]
pub trait PurchaseHistory: Send + Sync {
    /// Purchases by one student at one school with `start <= created_at < end`,
    /// oldest first. Bounds are storage-format timestamps.
    async fn purchases_for_student(
        &self,
        student_id: &str,
        school_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<PurchaseTransaction>>;

    /// Every purchase at a school with `created_at >= since`, oldest first
    async fn purchases_for_school(&self, school_id: &str, since: &str) -> Result<Vec<PurchaseTransaction>>;

    /// Number of student profiles registered at the school
    async fn student_count(&self, school_id: &str) -> Result<u64>;
}
