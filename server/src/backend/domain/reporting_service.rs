//! Read-only roll-ups of purchase history.
//!
//! Aggregation happens here rather than in SQL so the same code runs over
//! any `PurchaseHistory` source. No data is never an error: empty windows
//! produce zeroed totals and empty top lists.

use chrono::{DateTime, Duration, Utc};
use shared::{OperatingUnitSummary, ProductSummary, PurchaseTransaction, SchoolReport, StudentTransactionReport};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::errors::{require_id, DomainError, DomainResult};
use super::money::round_cents;
use crate::backend::storage::{format_timestamp, parse_timestamp, PurchaseHistory};

/// Entries kept in each top list
pub const TOP_ENTRIES: usize = 5;
/// Longest window a school report may cover
pub const MAX_WINDOW_DAYS: u32 = 366;

/// Totals over a set of purchases, without the school-level context
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseSummary {
    pub total_transactions: u64,
    pub total_revenue: f64,
    pub top_products: Vec<ProductSummary>,
    pub top_operating_units: Vec<OperatingUnitSummary>,
}

fn by_revenue_then_name(a_revenue: f64, a_name: &str, b_revenue: f64, b_name: &str) -> Ordering {
    b_revenue
        .partial_cmp(&a_revenue)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a_name.cmp(b_name))
}

pub fn summarize_purchases(purchases: &[PurchaseTransaction]) -> PurchaseSummary {
    let mut products: HashMap<&str, ProductSummary> = HashMap::new();
    let mut units: HashMap<&str, OperatingUnitSummary> = HashMap::new();
    let mut total_revenue = 0.0;

    for purchase in purchases {
        total_revenue += purchase.amount;

        let product = products.entry(purchase.product_id.as_str()).or_insert_with(|| ProductSummary {
            product_id: purchase.product_id.clone(),
            product_name: purchase.product_name.clone(),
            quantity: 0,
            revenue: 0.0,
        });
        product.quantity += 1;
        product.revenue += purchase.amount;

        let unit = units
            .entry(purchase.operating_unit.as_str())
            .or_insert_with(|| OperatingUnitSummary {
                operating_unit: purchase.operating_unit.clone(),
                transactions: 0,
                revenue: 0.0,
            });
        unit.transactions += 1;
        unit.revenue += purchase.amount;
    }

    let mut top_products: Vec<ProductSummary> = products
        .into_values()
        .map(|mut p| {
            p.revenue = round_cents(p.revenue);
            p
        })
        .collect();
    top_products.sort_by(|a, b| by_revenue_then_name(a.revenue, &a.product_name, b.revenue, &b.product_name));
    top_products.truncate(TOP_ENTRIES);

    let mut top_operating_units: Vec<OperatingUnitSummary> = units
        .into_values()
        .map(|mut u| {
            u.revenue = round_cents(u.revenue);
            u
        })
        .collect();
    top_operating_units
        .sort_by(|a, b| by_revenue_then_name(a.revenue, &a.operating_unit, b.revenue, &b.operating_unit));
    top_operating_units.truncate(TOP_ENTRIES);

    PurchaseSummary {
        total_transactions: purchases.len() as u64,
        total_revenue: round_cents(total_revenue),
        top_products,
        top_operating_units,
    }
}

#[derive(Clone)]
pub struct ReportingService {
    history: Arc<dyn PurchaseHistory>,
}

impl ReportingService {
    pub fn new(history: Arc<dyn PurchaseHistory>) -> Self {
        Self { history }
    }

    pub async fn get_school_report(&self, school_id: &str, window_days: u32) -> DomainResult<SchoolReport> {
        self.get_school_report_at(school_id, window_days, Utc::now()).await
    }

    /// Report over the trailing `window_days` ending at `now`
    pub async fn get_school_report_at(
        &self,
        school_id: &str,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> DomainResult<SchoolReport> {
        require_id("school_id", school_id)?;
        if window_days == 0 || window_days > MAX_WINDOW_DAYS {
            return Err(DomainError::Validation(format!(
                "window_days must be between 1 and {}",
                MAX_WINDOW_DAYS
            )));
        }

        let since = format_timestamp(now - Duration::days(i64::from(window_days)));
        let purchases = self.history.purchases_for_school(school_id, &since).await?;
        let student_count = self.history.student_count(school_id).await?;
        let summary = summarize_purchases(&purchases);

        info!(
            "School report for {} over {} days: {} transactions, {:.2} revenue",
            school_id, window_days, summary.total_transactions, summary.total_revenue
        );
        Ok(SchoolReport {
            school_id: school_id.to_string(),
            window_days,
            student_count,
            total_transactions: summary.total_transactions,
            total_revenue: summary.total_revenue,
            top_products: summary.top_products,
            top_operating_units: summary.top_operating_units,
        })
    }

    /// Totals for one student over `[start, end)`. Bounds are RFC 3339.
    pub async fn get_student_transaction_report(
        &self,
        student_id: &str,
        school_id: &str,
        start: &str,
        end: &str,
    ) -> DomainResult<StudentTransactionReport> {
        require_id("student_id", student_id)?;
        require_id("school_id", school_id)?;

        let start_at = parse_timestamp(start)
            .ok_or_else(|| DomainError::Validation(format!("Invalid start timestamp '{}'", start)))?;
        let end_at = parse_timestamp(end)
            .ok_or_else(|| DomainError::Validation(format!("Invalid end timestamp '{}'", end)))?;
        if end_at < start_at {
            return Err(DomainError::Validation("end must not be before start".to_string()));
        }

        let purchases = self
            .history
            .purchases_for_student(student_id, school_id, &format_timestamp(start_at), &format_timestamp(end_at))
            .await?;
        let total_amount = round_cents(purchases.iter().map(|p| p.amount).sum());

        Ok(StudentTransactionReport {
            student_id: student_id.to_string(),
            school_id: school_id.to_string(),
            total_transactions: purchases.len() as u64,
            total_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::{DbConnection, ProfileRepository, TransactionRepository};
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn purchase(id: &str, product: &str, unit: &str, amount: f64, at: &str) -> PurchaseTransaction {
        PurchaseTransaction {
            id: id.to_string(),
            student_id: "stu-1".to_string(),
            school_id: "sch-1".to_string(),
            product_id: format!("prod-{}", product.to_lowercase()),
            product_name: product.to_string(),
            operating_unit: unit.to_string(),
            amount,
            created_at: at.to_string(),
        }
    }

    /// History source that always fails, for the error path
    struct BrokenHistory;

    #[async_trait]
    impl PurchaseHistory for BrokenHistory {
        async fn purchases_for_student(&self, _: &str, _: &str, _: &str, _: &str) -> anyhow::Result<Vec<PurchaseTransaction>> {
            Err(anyhow::anyhow!("connection reset"))
        }

        async fn purchases_for_school(&self, _: &str, _: &str) -> anyhow::Result<Vec<PurchaseTransaction>> {
            Err(anyhow::anyhow!("connection reset"))
        }

        async fn student_count(&self, _: &str) -> anyhow::Result<u64> {
            Err(anyhow::anyhow!("connection reset"))
        }
    }

    async fn setup_test() -> (ReportingService, TransactionRepository, ProfileRepository) {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        let transactions = TransactionRepository::new(db.clone());
        let profiles = ProfileRepository::new(db);
        (ReportingService::new(Arc::new(transactions.clone())), transactions, profiles)
    }

    #[test]
    fn test_summarize_empty_history() {
        let summary = summarize_purchases(&[]);
        assert_eq!(summary.total_transactions, 0);
        assert_eq!(summary.total_revenue, 0.0);
        assert!(summary.top_products.is_empty());
        assert!(summary.top_operating_units.is_empty());
    }

    #[test]
    fn test_top_lists_sorted_by_revenue_then_name() {
        let at = "2025-09-17T12:00:00.000Z";
        let purchases = vec![
            purchase("1", "Pizza", "Cafeteria", 4.5, at),
            purchase("2", "Pizza", "Cafeteria", 4.5, at),
            purchase("3", "Apple", "Snack Bar", 1.0, at),
            purchase("4", "Cookie", "Snack Bar", 2.0, at),
            purchase("5", "Bagel", "Cafeteria", 2.0, at),
        ];

        let summary = summarize_purchases(&purchases);
        assert_eq!(summary.total_transactions, 5);
        assert_eq!(summary.total_revenue, 14.0);

        let names: Vec<_> = summary.top_products.iter().map(|p| p.product_name.as_str()).collect();
        assert_eq!(names, vec!["Pizza", "Bagel", "Cookie", "Apple"]);
        assert_eq!(summary.top_products[0].quantity, 2);
        assert_eq!(summary.top_products[0].revenue, 9.0);

        assert_eq!(summary.top_operating_units[0].operating_unit, "Cafeteria");
        assert_eq!(summary.top_operating_units[0].transactions, 3);
        assert_eq!(summary.top_operating_units[1].revenue, 3.0);
    }

    #[test]
    fn test_top_lists_are_capped() {
        let purchases: Vec<_> = (0..8)
            .map(|i| purchase(&i.to_string(), &format!("Item {}", i), "Cafeteria", 1.0 + i as f64, "2025-09-17T12:00:00.000Z"))
            .collect();
        let summary = summarize_purchases(&purchases);
        assert_eq!(summary.top_products.len(), TOP_ENTRIES);
        assert_eq!(summary.top_products[0].product_name, "Item 7");
    }

    #[tokio::test]
    async fn test_school_report_without_transactions() {
        let (service, _, profiles) = setup_test().await;
        profiles.create_profile("stu-1", "sch-1", "Sam", 0.0).await.unwrap();

        let report = service.get_school_report("sch-1", 30).await.unwrap();
        assert_eq!(report.student_count, 1);
        assert_eq!(report.total_transactions, 0);
        assert_eq!(report.total_revenue, 0.0);
        assert!(report.top_products.is_empty());
        assert!(report.top_operating_units.is_empty());
    }

    #[tokio::test]
    async fn test_school_report_respects_window() {
        let (service, transactions, _) = setup_test().await;
        let now = Utc.with_ymd_and_hms(2025, 9, 30, 12, 0, 0).unwrap();
        transactions
            .store_purchase(&purchase("old", "Pizza", "Cafeteria", 4.5, "2025-08-01T12:00:00.000Z"))
            .await
            .unwrap();
        transactions
            .store_purchase(&purchase("new", "Apple", "Snack Bar", 1.25, "2025-09-29T12:00:00.000Z"))
            .await
            .unwrap();

        let report = service.get_school_report_at("sch-1", 7, now).await.unwrap();
        assert_eq!(report.total_transactions, 1);
        assert_eq!(report.total_revenue, 1.25);
        assert_eq!(report.top_products[0].product_name, "Apple");

        assert!(matches!(
            service.get_school_report_at("sch-1", 0, now).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_student_report_is_half_open() {
        let (service, transactions, _) = setup_test().await;
        for (id, at) in [
            ("a", "2025-09-01T00:00:00.000Z"),
            ("b", "2025-09-15T08:30:00.000Z"),
            ("c", "2025-10-01T00:00:00.000Z"),
        ] {
            transactions
                .store_purchase(&purchase(id, "Pizza", "Cafeteria", 3.1, at))
                .await
                .unwrap();
        }

        let report = service
            .get_student_transaction_report("stu-1", "sch-1", "2025-09-01T00:00:00Z", "2025-10-01T00:00:00Z")
            .await
            .unwrap();
        assert_eq!(report.total_transactions, 2);
        assert_eq!(report.total_amount, 6.2);

        let empty = service
            .get_student_transaction_report("stu-9", "sch-1", "2025-09-01T00:00:00Z", "2025-10-01T00:00:00Z")
            .await
            .unwrap();
        assert_eq!(empty.total_transactions, 0);
        assert_eq!(empty.total_amount, 0.0);

        assert!(matches!(
            service.get_student_transaction_report("stu-1", "sch-1", "last week", "2025-10-01T00:00:00Z").await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_store_failures_are_not_reported_as_empty() {
        let service = ReportingService::new(Arc::new(BrokenHistory));
        assert!(matches!(
            service.get_school_report("sch-1", 30).await,
            Err(DomainError::Storage(_))
        ));
    }
}
