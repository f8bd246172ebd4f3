//! Purchase recording.
//!
//! A purchase is checked against the spending policy and the student's
//! balance, then the debit and the transaction row are written in one
//! database transaction whose debit re-checks the balance and both spending
//! windows, so concurrent purchases cannot overrun a limit. Parents are alerted when a purchase is declined,
//! when daily usage crosses the warning threshold and when the balance
//! drops below the low balance threshold.

use chrono::{DateTime, Utc};
use shared::{AlertSeverity, AlertType, Product, PurchaseTransaction, RecordPurchaseResponse};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::alert_service::AlertService;
use super::catalog_service::CatalogService;
use super::errors::{require_id, DomainResult};
use super::limit_policy::crosses_threshold;
use super::money::{format_amount, round_cents};
use super::spending_service::SpendingService;
use crate::backend::config::PolicyConfig;
use crate::backend::storage::{format_timestamp, DbConnection, DebitOutcome, TransactionRepository};

const INSUFFICIENT_BALANCE: &str = "Insufficient balance";

#[derive(Clone)]
pub struct PurchaseService {
    transaction_repository: TransactionRepository,
    spending_service: SpendingService,
    catalog_service: CatalogService,
    alert_service: AlertService,
    policy: PolicyConfig,
}

impl PurchaseService {
    pub fn new(
        db: Arc<DbConnection>,
        spending_service: SpendingService,
        catalog_service: CatalogService,
        alert_service: AlertService,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            transaction_repository: TransactionRepository::new((*db).clone()),
            spending_service,
            catalog_service,
            alert_service,
            policy,
        }
    }

    pub async fn record_purchase(
        &self,
        student_id: &str,
        school_id: &str,
        product_id: &str,
    ) -> DomainResult<RecordPurchaseResponse> {
        self.record_purchase_at(student_id, school_id, product_id, Utc::now()).await
    }

    pub async fn record_purchase_at(
        &self,
        student_id: &str,
        school_id: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<RecordPurchaseResponse> {
        require_id("student_id", student_id)?;
        require_id("school_id", school_id)?;

        let product = self.catalog_service.get_active_product(school_id, product_id).await?;
        let profile = self.catalog_service.get_profile(student_id, school_id).await?;

        let evaluation = self
            .spending_service
            .evaluate_purchase_at(student_id, school_id, product.price, now)
            .await?;
        if let Some(reason) = evaluation.decision.reason() {
            return Ok(self.decline_by_policy(student_id, school_id, &product, reason, now).await);
        }

        if profile.balance < product.price {
            info!(
                "Declined purchase of {} by student {}: balance {} is below price {}",
                product.name,
                student_id,
                format_amount(profile.balance),
                format_amount(product.price)
            );
            return Ok(declined(INSUFFICIENT_BALANCE.to_string()));
        }

        let transaction = PurchaseTransaction {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            school_id: school_id.to_string(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            operating_unit: product.operating_unit.clone(),
            amount: product.price,
            created_at: format_timestamp(now),
        };
        let outcome = self
            .transaction_repository
            .store_purchase_with_debit(&transaction, &evaluation.guard)
            .await?;
        let (new_balance, daily_spent) = match outcome {
            DebitOutcome::Debited {
                new_balance,
                daily_spent,
            } => (new_balance, daily_spent),
            DebitOutcome::InsufficientBalance => {
                // Balance moved between the check and the debit
                warn!("Debit for student {} failed after balance check", student_id);
                return Ok(declined(INSUFFICIENT_BALANCE.to_string()));
            }
            limited => {
                // Concurrent spend used up the window after the policy check
                let reason = evaluation
                    .late_denial(&limited, product.price)
                    .map(|denial| denial.to_string())
                    .unwrap_or_else(|| INSUFFICIENT_BALANCE.to_string());
                return Ok(self.decline_by_policy(student_id, school_id, &product, reason, now).await);
            }
        };

        info!(
            "Recorded purchase {} of {} by student {}, balance now {}",
            transaction.id,
            product.name,
            student_id,
            format_amount(new_balance)
        );

        let spent_before = round_cents(daily_spent - product.price);
        self.raise_usage_alerts(
            student_id,
            school_id,
            spent_before,
            daily_spent,
            evaluation.limit.daily_limit,
            now,
        )
        .await;

        let threshold = self.policy.low_balance_threshold;
        let previous_balance = round_cents(new_balance + product.price);
        if new_balance < threshold && previous_balance >= threshold {
            self.alert_service
                .notify_parents(
                    student_id,
                    school_id,
                    AlertType::LowBalance,
                    AlertSeverity::Warning,
                    &format!("Balance is low: {} remaining", format_amount(new_balance)),
                    now,
                )
                .await;
        }

        Ok(RecordPurchaseResponse {
            approved: true,
            transaction: Some(transaction),
            reason: None,
            new_balance: Some(new_balance),
        })
    }

    async fn decline_by_policy(
        &self,
        student_id: &str,
        school_id: &str,
        product: &Product,
        reason: String,
        now: DateTime<Utc>,
    ) -> RecordPurchaseResponse {
        info!("Declined purchase of {} by student {}: {}", product.name, student_id, reason);
        self.alert_service
            .notify_parents(
                student_id,
                school_id,
                AlertType::PurchaseDeclined,
                AlertSeverity::Critical,
                &format!(
                    "Purchase of {} ({}) was declined: {}",
                    product.name,
                    format_amount(product.price),
                    reason
                ),
                now,
            )
            .await;
        declined(reason)
    }

    async fn raise_usage_alerts(
        &self,
        student_id: &str,
        school_id: &str,
        spent_before: f64,
        spent_after: f64,
        daily_limit: f64,
        now: DateTime<Utc>,
    ) {
        let (alert_type, severity, message) = if crosses_threshold(spent_before, spent_after, daily_limit, 100.0) {
            (
                AlertType::LimitExceeded,
                AlertSeverity::Critical,
                format!("Daily limit of {} has been reached", format_amount(daily_limit)),
            )
        } else if crosses_threshold(spent_before, spent_after, daily_limit, self.policy.alert_threshold_percent) {
            (
                AlertType::LimitWarning,
                AlertSeverity::Warning,
                format!(
                    "{} of the {} daily limit has been spent",
                    format_amount(spent_after),
                    format_amount(daily_limit)
                ),
            )
        } else {
            return;
        };

        self.alert_service
            .notify_parents(student_id, school_id, alert_type, severity, &message, now)
            .await;
    }
}

fn declined(reason: String) -> RecordPurchaseResponse {
    RecordPurchaseResponse {
        approved: false,
        transaction: None,
        reason: Some(reason),
        new_balance: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::errors::DomainError;
    use crate::backend::storage::LinkRepository;
    use chrono::TimeZone;
    use shared::ParentStudentLink;

    struct Fixture {
        service: PurchaseService,
        spending: SpendingService,
        catalog: CatalogService,
        alerts: AlertService,
    }

    async fn setup_test(opening_balance: f64) -> Fixture {
        let db = Arc::new(DbConnection::init_test().await.expect("Failed to create test database"));
        let policy = PolicyConfig::default();
        let history = Arc::new(TransactionRepository::new((*db).clone()));

        let alerts = AlertService::new(db.clone());
        let catalog = CatalogService::new(db.clone());
        let spending = SpendingService::new(db.clone(), history, policy.clone());
        let service = PurchaseService::new(db.clone(), spending.clone(), catalog.clone(), alerts.clone(), policy);

        catalog.create_profile("stu-1", "sch-1", "Sam", opening_balance).await.unwrap();
        for (id, name, price) in [("p-lunch", "Lunch", 8.0), ("p-juice", "Juice", 1.5)] {
            catalog
                .add_product(Product {
                    id: id.to_string(),
                    school_id: "sch-1".to_string(),
                    name: name.to_string(),
                    price,
                    operating_unit: "Cafeteria".to_string(),
                    is_active: true,
                })
                .await
                .unwrap();
        }
        LinkRepository::new((*db).clone())
            .upsert_link(&ParentStudentLink {
                parent_user_id: "parent-1".to_string(),
                student_id: "stu-1".to_string(),
                school_id: "sch-1".to_string(),
                is_active: true,
                created_at: "2025-09-01T00:00:00.000Z".to_string(),
            })
            .await
            .unwrap();

        Fixture {
            service,
            spending,
            catalog,
            alerts,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 17, 12, 0, 0).unwrap()
    }

    async fn unread_types(alerts: &AlertService) -> Vec<AlertType> {
        alerts
            .get_unread_alerts("parent-1", "sch-1")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.alert_type)
            .collect()
    }

    #[tokio::test]
    async fn test_approved_purchase_debits_and_counts_toward_usage() {
        let fixture = setup_test(50.0).await;

        let response = fixture.service.record_purchase_at("stu-1", "sch-1", "p-lunch", now()).await.unwrap();
        assert!(response.approved);
        assert_eq!(response.new_balance, Some(42.0));
        assert_eq!(response.transaction.unwrap().amount, 8.0);

        assert_eq!(fixture.catalog.get_profile("stu-1", "sch-1").await.unwrap().balance, 42.0);
        let status = fixture.spending.get_spending_status_at("stu-1", "sch-1", now()).await.unwrap();
        assert_eq!(status.daily_spent, 8.0);
        assert!(unread_types(&fixture.alerts).await.is_empty());
    }

    #[tokio::test]
    async fn test_declined_by_policy_alerts_parents() {
        let fixture = setup_test(100.0).await;
        fixture.spending.update_limit("stu-1", "sch-1", 10.0, 100.0).await.unwrap();

        fixture.service.record_purchase_at("stu-1", "sch-1", "p-lunch", now()).await.unwrap();
        let response = fixture.service.record_purchase_at("stu-1", "sch-1", "p-lunch", now()).await.unwrap();
        assert!(!response.approved);
        assert!(response.reason.unwrap().contains("Daily limit exceeded"));
        assert!(response.transaction.is_none());

        assert_eq!(fixture.catalog.get_profile("stu-1", "sch-1").await.unwrap().balance, 92.0);
        let types = unread_types(&fixture.alerts).await;
        assert!(types.contains(&AlertType::LimitWarning));
        assert!(types.contains(&AlertType::PurchaseDeclined));
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_declined_without_debit() {
        let fixture = setup_test(5.0).await;

        let response = fixture.service.record_purchase_at("stu-1", "sch-1", "p-lunch", now()).await.unwrap();
        assert!(!response.approved);
        assert_eq!(response.reason.as_deref(), Some(INSUFFICIENT_BALANCE));
        assert_eq!(fixture.catalog.get_profile("stu-1", "sch-1").await.unwrap().balance, 5.0);
    }

    #[tokio::test]
    async fn test_low_balance_alert_fires_once_when_crossing() {
        let fixture = setup_test(9.5).await;

        fixture.service.record_purchase_at("stu-1", "sch-1", "p-lunch", now()).await.unwrap();
        assert_eq!(unread_types(&fixture.alerts).await, vec![AlertType::LowBalance]);

        // Already below the threshold: no second alert
        fixture.service.record_purchase_at("stu-1", "sch-1", "p-juice", now()).await.unwrap();
        assert_eq!(unread_types(&fixture.alerts).await, vec![AlertType::LowBalance]);
    }

    #[tokio::test]
    async fn test_reaching_daily_limit_raises_limit_exceeded() {
        let fixture = setup_test(100.0).await;
        fixture.spending.update_limit("stu-1", "sch-1", 8.0, 100.0).await.unwrap();

        fixture.service.record_purchase_at("stu-1", "sch-1", "p-lunch", now()).await.unwrap();
        assert_eq!(unread_types(&fixture.alerts).await, vec![AlertType::LimitExceeded]);
    }

    #[tokio::test]
    async fn test_unknown_product_or_profile_is_not_found() {
        let fixture = setup_test(10.0).await;
        assert!(matches!(
            fixture.service.record_purchase_at("stu-1", "sch-1", "p-missing", now()).await,
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            fixture.service.record_purchase_at("stu-9", "sch-1", "p-juice", now()).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_purchases_cannot_overrun_daily_limit() {
        let fixture = setup_test(100.0).await;
        fixture.spending.update_limit("stu-1", "sch-1", 10.0, 100.0).await.unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = fixture.service.clone();
                tokio::spawn(async move { service.record_purchase_at("stu-1", "sch-1", "p-lunch", now()).await })
            })
            .collect();

        let mut approved = 0;
        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            if response.approved {
                approved += 1;
            } else {
                assert!(response.reason.unwrap().contains("limit"));
            }
        }

        assert_eq!(approved, 1);
        let status = fixture.spending.get_spending_status_at("stu-1", "sch-1", now()).await.unwrap();
        assert_eq!(status.daily_spent, 8.0);
        assert_eq!(fixture.catalog.get_profile("stu-1", "sch-1").await.unwrap().balance, 92.0);
    }

    #[tokio::test]
    async fn test_alerts_are_stamped_with_purchase_time() {
        let fixture = setup_test(9.5).await;

        fixture.service.record_purchase_at("stu-1", "sch-1", "p-lunch", now()).await.unwrap();
        let alerts = fixture.alerts.get_unread_alerts("parent-1", "sch-1").await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].created_at, format_timestamp(now()));
    }
}
