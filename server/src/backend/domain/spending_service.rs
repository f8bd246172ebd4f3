//! Spending limits and usage status.
//!
//! Limits are created lazily with the configured defaults the first time a
//! student is looked at, so a missing record never means "unlimited".

use chrono::{DateTime, Utc};
use shared::{SpendingLimit, SpendingStatus};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::errors::{require_id, DomainError, DomainResult};
use super::limit_policy::{evaluate_purchase, spending_status, PurchaseDecision, PurchaseDenial, UsageSnapshot};
use super::money::has_cent_precision;
use super::usage::{accumulate, month_bounds, UsageWindows};
use crate::backend::config::PolicyConfig;
use crate::backend::storage::{
    format_timestamp, DbConnection, DebitOutcome, PurchaseHistory, SpendingGuard, SpendingLimitRepository,
};

/// Everything the purchase flow needs to know about a prospective purchase
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseEvaluation {
    pub decision: PurchaseDecision,
    pub limit: SpendingLimit,
    pub usage: UsageSnapshot,
    /// Same windows and caps, re-checked when the debit is written
    pub guard: SpendingGuard,
}

impl PurchaseEvaluation {
    /// Denial for a guarded debit that hit a limit after this evaluation
    /// allowed it, because other spend landed in between
    pub fn late_denial(&self, outcome: &DebitOutcome, amount: f64) -> Option<PurchaseDenial> {
        match *outcome {
            DebitOutcome::DailyLimitReached { spent } => Some(PurchaseDenial::DailyLimitExceeded {
                spent,
                limit: self.limit.daily_limit,
                amount,
            }),
            DebitOutcome::MonthlyLimitReached { spent } => Some(PurchaseDenial::MonthlyLimitExceeded {
                spent,
                limit: self.limit.monthly_limit,
                amount,
            }),
            _ => None,
        }
    }
}

fn spending_guard(limit: &SpendingLimit, windows: &UsageWindows) -> SpendingGuard {
    SpendingGuard {
        day_start: format_timestamp(windows.day_start),
        day_end: format_timestamp(windows.day_end),
        daily_limit: limit.daily_limit,
        month_start: format_timestamp(windows.month_start),
        month_end: format_timestamp(windows.month_end),
        monthly_limit: limit.monthly_limit,
    }
}

#[derive(Clone)]
pub struct SpendingService {
    limit_repository: SpendingLimitRepository,
    history: Arc<dyn PurchaseHistory>,
    policy: PolicyConfig,
}

impl SpendingService {
    pub fn new(db: Arc<DbConnection>, history: Arc<dyn PurchaseHistory>, policy: PolicyConfig) -> Self {
        let limit_repository = SpendingLimitRepository::new((*db).clone());
        Self {
            limit_repository,
            history,
            policy,
        }
    }

    /// Stored limit for the student, created with defaults on first access
    pub async fn get_or_create_limit(&self, student_id: &str, school_id: &str) -> DomainResult<SpendingLimit> {
        require_id("student_id", student_id)?;
        require_id("school_id", school_id)?;

        if let Some(limit) = self.limit_repository.get_limit(student_id, school_id).await? {
            return Ok(limit);
        }

        let now = format_timestamp(Utc::now());
        let defaults = SpendingLimit {
            student_id: student_id.to_string(),
            school_id: school_id.to_string(),
            daily_limit: self.policy.default_daily_limit,
            monthly_limit: self.policy.default_monthly_limit,
            created_at: now.clone(),
            updated_at: now,
        };
        info!(
            "Creating default spending limit for student {} at school {} (daily {:.2}, monthly {:.2})",
            student_id, school_id, defaults.daily_limit, defaults.monthly_limit
        );
        Ok(self.limit_repository.get_or_insert_limit(&defaults).await?)
    }

    pub async fn update_limit(
        &self,
        student_id: &str,
        school_id: &str,
        daily_limit: f64,
        monthly_limit: f64,
    ) -> DomainResult<SpendingLimit> {
        for (name, value) in [("Daily limit", daily_limit), ("Monthly limit", monthly_limit)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(DomainError::Validation(format!("{} must be greater than 0", name)));
            }
            if !has_cent_precision(value) {
                return Err(DomainError::Validation(format!(
                    "{} must have at most 2 decimal places",
                    name
                )));
            }
        }

        let mut limit = self.get_or_create_limit(student_id, school_id).await?;
        limit.daily_limit = daily_limit;
        limit.monthly_limit = monthly_limit;
        limit.updated_at = format_timestamp(Utc::now());
        self.limit_repository.upsert_limit(&limit).await?;

        info!(
            "Updated spending limit for student {} at school {}: daily {:.2}, monthly {:.2}",
            student_id, school_id, daily_limit, monthly_limit
        );
        Ok(limit)
    }

    /// Spend in the local day and month containing `now`
    pub async fn usage_at(&self, student_id: &str, school_id: &str, now: DateTime<Utc>) -> DomainResult<UsageSnapshot> {
        let windows = UsageWindows::at(now, self.policy.local_offset());
        let (start, end) = month_bounds(&windows);
        let purchases = self
            .history
            .purchases_for_student(student_id, school_id, &start, &end)
            .await?;
        Ok(accumulate(&purchases, &windows))
    }

    pub async fn get_spending_status(&self, student_id: &str, school_id: &str) -> DomainResult<SpendingStatus> {
        self.get_spending_status_at(student_id, school_id, Utc::now()).await
    }

    pub async fn get_spending_status_at(
        &self,
        student_id: &str,
        school_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<SpendingStatus> {
        let limit = self.get_or_create_limit(student_id, school_id).await?;
        let usage = self.usage_at(student_id, school_id, now).await?;
        Ok(spending_status(&limit, &usage))
    }

    pub async fn evaluate_purchase_at(
        &self,
        student_id: &str,
        school_id: &str,
        amount: f64,
        now: DateTime<Utc>,
    ) -> DomainResult<PurchaseEvaluation> {
        let limit = self.get_or_create_limit(student_id, school_id).await?;
        let usage = self.usage_at(student_id, school_id, now).await?;
        let decision = evaluate_purchase(&limit, &usage, amount);
        let guard = spending_guard(&limit, &UsageWindows::at(now, self.policy.local_offset()));
        Ok(PurchaseEvaluation {
            decision,
            limit,
            usage,
            guard,
        })
    }

    pub async fn can_make_purchase(&self, student_id: &str, school_id: &str, amount: f64) -> bool {
        self.can_make_purchase_at(student_id, school_id, amount, Utc::now()).await
    }

    /// Fails closed: bad input and storage failures both answer `false`
    pub async fn can_make_purchase_at(&self, student_id: &str, school_id: &str, amount: f64, now: DateTime<Utc>) -> bool {
        match self.evaluate_purchase_at(student_id, school_id, amount, now).await {
            Ok(evaluation) => {
                if let Some(reason) = evaluation.decision.reason() {
                    info!("Purchase check denied for student {}: {}", student_id, reason);
                }
                evaluation.decision.allowed
            }
            Err(DomainError::Validation(message)) => {
                warn!("Purchase check rejected input: {}", message);
                false
            }
            Err(e) => {
                error!("Purchase check failed for student {}: {}", student_id, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::TransactionRepository;
    use chrono::TimeZone;
    use shared::PurchaseTransaction;

    async fn setup_test() -> (SpendingService, TransactionRepository) {
        let db = Arc::new(DbConnection::init_test().await.expect("Failed to create test database"));
        let transactions = TransactionRepository::new((*db).clone());
        let service = SpendingService::new(db, Arc::new(transactions.clone()), PolicyConfig::default());
        (service, transactions)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 17, 12, 0, 0).unwrap()
    }

    async fn spend(repo: &TransactionRepository, id: &str, amount: f64, at: DateTime<Utc>) {
        repo.store_purchase(&PurchaseTransaction {
            id: id.to_string(),
            student_id: "stu-1".to_string(),
            school_id: "sch-1".to_string(),
            product_id: "prod-1".to_string(),
            product_name: "Lunch".to_string(),
            operating_unit: "Cafeteria".to_string(),
            amount,
            created_at: format_timestamp(at),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_limit_is_created_lazily_with_defaults() {
        let (service, _) = setup_test().await;

        let limit = service.get_or_create_limit("stu-1", "sch-1").await.unwrap();
        assert_eq!(limit.daily_limit, 50.0);
        assert_eq!(limit.monthly_limit, 500.0);

        // Second access returns the same stored record
        let again = service.get_or_create_limit("stu-1", "sch-1").await.unwrap();
        assert_eq!(again, limit);
    }

    #[tokio::test]
    async fn test_update_limit_validates_and_persists() {
        let (service, _) = setup_test().await;

        assert!(matches!(
            service.update_limit("stu-1", "sch-1", 0.0, 100.0).await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            service.update_limit("stu-1", "sch-1", 20.0, -1.0).await,
            Err(DomainError::Validation(_))
        ));

        let updated = service.update_limit("stu-1", "sch-1", 200.0, 2000.0).await.unwrap();
        assert_eq!(updated.daily_limit, 200.0);
        let stored = service.get_or_create_limit("stu-1", "sch-1").await.unwrap();
        assert_eq!(stored.daily_limit, 200.0);
        assert_eq!(stored.monthly_limit, 2000.0);
    }

    #[tokio::test]
    async fn test_can_make_purchase_example() {
        let (service, repo) = setup_test().await;
        service.update_limit("stu-1", "sch-1", 200.0, 2000.0).await.unwrap();
        spend(&repo, "tx-1", 190.0, Utc.with_ymd_and_hms(2025, 9, 17, 8, 0, 0).unwrap()).await;

        assert!(!service.can_make_purchase_at("stu-1", "sch-1", 15.0, now()).await);
        assert!(service.can_make_purchase_at("stu-1", "sch-1", 5.0, now()).await);
    }

    #[tokio::test]
    async fn test_can_make_purchase_rejects_bad_input_without_error() {
        let (service, _) = setup_test().await;

        // Default daily limit is 50
        assert!(!service.can_make_purchase_at("stu-1", "sch-1", 50.01, now()).await);
        assert!(!service.can_make_purchase_at("stu-1", "sch-1", 1e12, now()).await);
        assert!(!service.can_make_purchase_at("stu-1", "sch-1", -1.0, now()).await);
        assert!(!service.can_make_purchase_at("", "sch-1", 1.0, now()).await);
        assert!(service.can_make_purchase_at("stu-1", "sch-1", 50.0, now()).await);
    }

    #[tokio::test]
    async fn test_status_resets_lazily_and_clamps_percentages() {
        let (service, repo) = setup_test().await;
        service.update_limit("stu-1", "sch-1", 20.0, 100.0).await.unwrap();

        spend(&repo, "old", 80.0, Utc.with_ymd_and_hms(2025, 8, 30, 12, 0, 0).unwrap()).await;
        spend(&repo, "yesterday", 60.0, Utc.with_ymd_and_hms(2025, 9, 16, 12, 0, 0).unwrap()).await;
        spend(&repo, "today", 30.0, Utc.with_ymd_and_hms(2025, 9, 17, 9, 0, 0).unwrap()).await;
        spend(&repo, "today-2", 15.0, Utc.with_ymd_and_hms(2025, 9, 17, 10, 0, 0).unwrap()).await;

        let status = service.get_spending_status_at("stu-1", "sch-1", now()).await.unwrap();
        assert_eq!(status.daily_spent, 45.0);
        assert_eq!(status.daily_percentage, 100.0);
        assert_eq!(status.monthly_spent, 105.0);
        assert_eq!(status.monthly_percentage, 100.0);

        // A day later only the monthly counter remembers today's spend
        let tomorrow = Utc.with_ymd_and_hms(2025, 9, 18, 12, 0, 0).unwrap();
        let status = service.get_spending_status_at("stu-1", "sch-1", tomorrow).await.unwrap();
        assert_eq!(status.daily_spent, 0.0);
        assert_eq!(status.daily_percentage, 0.0);
        assert_eq!(status.monthly_spent, 105.0);

        // And the next month starts from zero
        let next_month = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();
        let status = service.get_spending_status_at("stu-1", "sch-1", next_month).await.unwrap();
        assert_eq!(status.monthly_spent, 0.0);
    }

    #[tokio::test]
    async fn test_evaluation_carries_guard_for_the_debit() {
        let (service, _) = setup_test().await;
        service.update_limit("stu-1", "sch-1", 10.0, 100.0).await.unwrap();

        let evaluation = service.evaluate_purchase_at("stu-1", "sch-1", 8.0, now()).await.unwrap();
        assert!(evaluation.decision.allowed);
        assert_eq!(evaluation.guard.day_start, "2025-09-17T00:00:00.000Z");
        assert_eq!(evaluation.guard.day_end, "2025-09-18T00:00:00.000Z");
        assert_eq!(evaluation.guard.month_start, "2025-09-01T00:00:00.000Z");
        assert_eq!(evaluation.guard.month_end, "2025-10-01T00:00:00.000Z");
        assert_eq!(evaluation.guard.daily_limit, 10.0);
        assert_eq!(evaluation.guard.monthly_limit, 100.0);

        assert_eq!(
            evaluation.late_denial(&DebitOutcome::DailyLimitReached { spent: 8.0 }, 8.0),
            Some(PurchaseDenial::DailyLimitExceeded {
                spent: 8.0,
                limit: 10.0,
                amount: 8.0
            })
        );
        assert_eq!(evaluation.late_denial(&DebitOutcome::InsufficientBalance, 8.0), None);
    }
}
