//! Deposit lifecycle: Pending -> Completed | Failed | Cancelled.
//!
//! Only pending deposits move. Completion and failure are reported by the
//! payment processor once the transfer settles; the parent who created a
//! deposit can only cancel it. Completion credits the student's balance in
//! the same database transaction that flips the status, so a deposit is
//! credited at most once.

use chrono::Utc;
use shared::{AlertSeverity, AlertType, CreateAlertRequest, Deposit, DepositRequest, DepositStatus, DepositValidation};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::alert_service::AlertService;
use super::deposit_validator::DepositValidator;
use super::errors::{require_id, DomainError, DomainResult};
use super::money::format_amount;
use crate::backend::config::PolicyConfig;
use crate::backend::storage::{format_timestamp, DbConnection, DepositCompletion, DepositRepository};

#[derive(Clone)]
pub struct DepositService {
    deposit_repository: DepositRepository,
    validator: DepositValidator,
    alert_service: AlertService,
}

impl DepositService {
    pub fn new(db: Arc<DbConnection>, policy: &PolicyConfig, alert_service: AlertService) -> Self {
        Self {
            deposit_repository: DepositRepository::new((*db).clone()),
            validator: DepositValidator::new(db, policy.max_deposit_amount),
            alert_service,
        }
    }

    pub async fn validate_deposit(&self, request: &DepositRequest) -> DepositValidation {
        self.validator.validate_deposit(request).await
    }

    /// Validate and persist a pending deposit
    pub async fn create_deposit(&self, request: DepositRequest) -> DomainResult<Deposit> {
        let validation = self.validator.validate_deposit(&request).await;
        if !validation.valid {
            let reason = validation.reason.unwrap_or_else(|| "Invalid deposit".to_string());
            return Err(DomainError::Validation(reason));
        }

        let deposit = Deposit {
            id: Uuid::new_v4().to_string(),
            parent_user_id: request.parent_user_id,
            student_id: request.student_id,
            school_id: request.school_id,
            amount: request.amount,
            payment_method_id: request.payment_method_id,
            notes: request.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            status: DepositStatus::Pending,
            failure_reason: None,
            created_at: format_timestamp(Utc::now()),
            deposited_at: None,
            completed_at: None,
        };
        self.deposit_repository.store_deposit(&deposit).await?;

        info!(
            "Created pending deposit {} of {} from parent {} to student {}",
            deposit.id,
            format_amount(deposit.amount),
            deposit.parent_user_id,
            deposit.student_id
        );
        Ok(deposit)
    }

    pub async fn list_deposits(&self, parent_user_id: &str) -> DomainResult<Vec<Deposit>> {
        require_id("parent_user_id", parent_user_id)?;
        Ok(self.deposit_repository.list_deposits_for_parent(parent_user_id).await?)
    }

    /// Settle a pending deposit and credit the student. Returns the
    /// completed deposit and the student's new balance.
    pub async fn complete_deposit(&self, deposit_id: &str) -> DomainResult<(Deposit, f64)> {
        require_id("deposit_id", deposit_id)?;

        let completed_at = format_timestamp(Utc::now());
        match self.deposit_repository.complete_and_credit(deposit_id, &completed_at).await? {
            DepositCompletion::Completed { deposit, new_balance } => {
                info!(
                    "Deposit {} completed, student {} balance is now {}",
                    deposit.id,
                    deposit.student_id,
                    format_amount(new_balance)
                );

                let alert = CreateAlertRequest {
                    student_id: deposit.student_id.clone(),
                    school_id: deposit.school_id.clone(),
                    parent_user_id: deposit.parent_user_id.clone(),
                    alert_type: AlertType::DepositCompleted,
                    severity: AlertSeverity::Info,
                    message: format!("Deposit of {} has been completed", format_amount(deposit.amount)),
                };
                if let Err(e) = self.alert_service.create_alert(alert).await {
                    warn!("Failed to raise deposit alert for {}: {}", deposit.id, e);
                }

                Ok((deposit, new_balance))
            }
            DepositCompletion::NotFound => Err(DomainError::NotFound(format!("Deposit {}", deposit_id))),
            DepositCompletion::NotPending(status) => Err(DomainError::Conflict(format!(
                "Deposit {} is {} and can no longer change",
                deposit_id, status
            ))),
            DepositCompletion::MissingProfile => Err(DomainError::NotFound("Student profile".to_string())),
        }
    }

    /// Record a transfer the payment processor could not settle
    pub async fn fail_deposit(&self, deposit_id: &str, reason: &str) -> DomainResult<Deposit> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::Validation("Failure reason must not be empty".to_string()));
        }
        let deposit = match self.deposit_repository.get_deposit(deposit_id).await? {
            Some(deposit) => deposit,
            None => return Err(DomainError::NotFound(format!("Deposit {}", deposit_id))),
        };
        self.close(deposit, DepositStatus::Failed, Some(reason)).await
    }

    pub async fn cancel_deposit(&self, parent_user_id: &str, deposit_id: &str) -> DomainResult<Deposit> {
        let deposit = self.owned_deposit(parent_user_id, deposit_id).await?;
        self.close(deposit, DepositStatus::Cancelled, None).await
    }

    async fn close(&self, deposit: Deposit, status: DepositStatus, failure_reason: Option<&str>) -> DomainResult<Deposit> {
        let deposit_id = deposit.id.as_str();
        let closed_at = format_timestamp(Utc::now());
        let closed = self
            .deposit_repository
            .close_pending_deposit(deposit_id, status, failure_reason, &closed_at)
            .await?;
        if !closed {
            return Err(DomainError::Conflict(format!(
                "Deposit {} is {} and can no longer change",
                deposit_id, deposit.status
            )));
        }

        info!("Deposit {} moved to {}", deposit_id, status);
        match self.deposit_repository.get_deposit(deposit_id).await? {
            Some(updated) => Ok(updated),
            None => Err(DomainError::NotFound(format!("Deposit {}", deposit_id))),
        }
    }

    /// Deposits belonging to another parent look exactly like missing ones
    async fn owned_deposit(&self, parent_user_id: &str, deposit_id: &str) -> DomainResult<Deposit> {
        match self.deposit_repository.get_deposit(deposit_id).await? {
            Some(deposit) if deposit.parent_user_id == parent_user_id => Ok(deposit),
            _ => Err(DomainError::NotFound(format!("Deposit {}", deposit_id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::{LinkRepository, ProfileRepository};
    use shared::ParentStudentLink;

    async fn setup_test() -> (DepositService, AlertService, ProfileRepository) {
        let db = Arc::new(DbConnection::init_test().await.expect("Failed to create test database"));
        let profiles = ProfileRepository::new((*db).clone());
        profiles.create_profile("stu-1", "sch-1", "Sam", 10.0).await.unwrap();
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

        let alerts = AlertService::new(db.clone());
        let service = DepositService::new(db, &PolicyConfig::default(), alerts.clone());
        (service, alerts, profiles)
    }

    fn request(amount: f64) -> DepositRequest {
        DepositRequest {
            parent_user_id: "parent-1".to_string(),
            student_id: "stu-1".to_string(),
            school_id: "sch-1".to_string(),
            amount,
            payment_method_id: None,
            notes: Some("Lunch money".to_string()),
        }
    }

    async fn balance(profiles: &ProfileRepository) -> f64 {
        profiles.get_profile("stu-1", "sch-1").await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn test_create_deposit_is_pending_and_does_not_credit() {
        let (service, _, profiles) = setup_test().await;

        let deposit = service.create_deposit(request(25.0)).await.unwrap();
        assert_eq!(deposit.status, DepositStatus::Pending);
        assert!(deposit.completed_at.is_none());
        assert_eq!(balance(&profiles).await, 10.0);

        let listed = service.list_deposits("parent-1").await.unwrap();
        assert_eq!(listed, vec![deposit]);
    }

    #[tokio::test]
    async fn test_invalid_deposit_is_rejected_with_reason() {
        let (service, _, _) = setup_test().await;

        match service.create_deposit(request(15_000.0)).await {
            Err(DomainError::Validation(reason)) => assert!(reason.contains("maximum")),
            other => panic!("expected validation error, got {:?}", other.map(|d| d.id)),
        }
        assert!(service.list_deposits("parent-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_credits_exactly_once() {
        let (service, alerts, profiles) = setup_test().await;
        let deposit = service.create_deposit(request(25.5)).await.unwrap();

        let (completed, new_balance) = service.complete_deposit(&deposit.id).await.unwrap();
        assert_eq!(completed.status, DepositStatus::Completed);
        assert!(completed.deposited_at.is_some());
        assert_eq!(new_balance, 35.5);
        assert_eq!(balance(&profiles).await, 35.5);

        assert!(matches!(
            service.complete_deposit(&deposit.id).await,
            Err(DomainError::Conflict(_))
        ));
        assert_eq!(balance(&profiles).await, 35.5);

        let unread = alerts.get_unread_alerts("parent-1", "sch-1").await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].alert_type, AlertType::DepositCompleted);
        assert_eq!(unread[0].severity, AlertSeverity::Info);
    }

    #[tokio::test]
    async fn test_fail_and_cancel_only_leave_pending() {
        let (service, _, profiles) = setup_test().await;

        let failed = service.create_deposit(request(20.0)).await.unwrap();
        let failed = service.fail_deposit(&failed.id, "Card declined").await.unwrap();
        assert_eq!(failed.status, DepositStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("Card declined"));

        assert!(matches!(
            service.complete_deposit(&failed.id).await,
            Err(DomainError::Conflict(_))
        ));
        assert!(matches!(
            service.cancel_deposit("parent-1", &failed.id).await,
            Err(DomainError::Conflict(_))
        ));

        let cancelled = service.create_deposit(request(20.0)).await.unwrap();
        let cancelled = service.cancel_deposit("parent-1", &cancelled.id).await.unwrap();
        assert_eq!(cancelled.status, DepositStatus::Cancelled);

        assert_eq!(balance(&profiles).await, 10.0);
    }

    #[tokio::test]
    async fn test_other_parents_cannot_cancel_deposit() {
        let (service, _, _) = setup_test().await;
        let deposit = service.create_deposit(request(20.0)).await.unwrap();

        assert!(matches!(
            service.cancel_deposit("parent-2", &deposit.id).await,
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            service.complete_deposit("missing").await,
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            service.fail_deposit("missing", "Card declined").await,
            Err(DomainError::NotFound(_))
        ));
    }
}
