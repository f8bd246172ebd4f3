//! Deposit validation.
//!
//! Checks a parent-initiated transfer before anything is written. Validation
//! never mutates state and never errors on bad input: every rejection comes
//! back as a `DepositValidation` carrying the reason.

use shared::{DepositRequest, DepositValidation};
use std::sync::Arc;
use tracing::{error, info};

use super::money::{format_amount, has_cent_precision};
use crate::backend::storage::{DbConnection, LinkRepository, PaymentMethodRepository};

pub const MAX_NOTES_LENGTH: usize = 500;

/// Amount rules alone, without touching storage
pub fn check_amount(amount: f64, max_deposit_amount: f64) -> Result<(), String> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err("Amount must be greater than 0".to_string());
    }
    if amount > max_deposit_amount {
        return Err(format!(
            "Amount exceeds the maximum deposit of {}",
            format_amount(max_deposit_amount)
        ));
    }
    if !has_cent_precision(amount) {
        return Err("Amount cannot have more than 2 decimal places".to_string());
    }
    Ok(())
}

/// Field rules that need no storage access
pub fn check_request_fields(request: &DepositRequest, max_deposit_amount: f64) -> Result<(), String> {
    for (field, value) in [
        ("Parent id", &request.parent_user_id),
        ("Student id", &request.student_id),
        ("School id", &request.school_id),
    ] {
        if value.trim().is_empty() {
            return Err(format!("{} is required", field));
        }
    }

    check_amount(request.amount, max_deposit_amount)?;

    if let Some(notes) = &request.notes {
        if notes.chars().count() > MAX_NOTES_LENGTH {
            return Err(format!("Notes cannot exceed {} characters", MAX_NOTES_LENGTH));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct DepositValidator {
    link_repository: LinkRepository,
    payment_method_repository: PaymentMethodRepository,
    max_deposit_amount: f64,
}

impl DepositValidator {
    pub fn new(db: Arc<DbConnection>, max_deposit_amount: f64) -> Self {
        Self {
            link_repository: LinkRepository::new((*db).clone()),
            payment_method_repository: PaymentMethodRepository::new((*db).clone()),
            max_deposit_amount,
        }
    }

    pub async fn validate_deposit(&self, request: &DepositRequest) -> DepositValidation {
        if let Err(reason) = check_request_fields(request, self.max_deposit_amount) {
            info!("Deposit from parent {} rejected: {}", request.parent_user_id, reason);
            return DepositValidation::invalid(reason);
        }

        match self
            .link_repository
            .has_active_link(&request.parent_user_id, &request.student_id, &request.school_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    "Deposit rejected: parent {} is not linked to student {} at school {}",
                    request.parent_user_id, request.student_id, request.school_id
                );
                return DepositValidation::invalid("No active parent-student relationship for this school");
            }
            Err(e) => {
                error!("Failed to look up parent-student link: {}", e);
                return DepositValidation::invalid("Unable to verify parent-student relationship");
            }
        }

        if let Some(method_id) = &request.payment_method_id {
            match self.payment_method_repository.get_payment_method(method_id).await {
                Ok(Some(method)) if method.parent_user_id == request.parent_user_id => {}
                Ok(_) => return DepositValidation::invalid("Payment method not found"),
                Err(e) => {
                    error!("Failed to look up payment method {}: {}", method_id, e);
                    return DepositValidation::invalid("Unable to verify payment method");
                }
            }
        }

        DepositValidation::valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ParentStudentLink, PaymentMethod, PaymentMethodType};

    async fn setup_test() -> DepositValidator {
        let db = Arc::new(DbConnection::init_test().await.expect("Failed to create test database"));
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
        PaymentMethodRepository::new((*db).clone())
            .add_payment_method(&PaymentMethod {
                id: "pm-1".to_string(),
                parent_user_id: "parent-1".to_string(),
                label: "Visa".to_string(),
                method_type: PaymentMethodType::Card,
                last_four: Some("4242".to_string()),
                is_default: false,
                created_at: "2025-09-01T00:00:00.000Z".to_string(),
            })
            .await
            .unwrap();
        DepositValidator::new(db, 10_000.0)
    }

    fn request(amount: f64) -> DepositRequest {
        DepositRequest {
            parent_user_id: "parent-1".to_string(),
            student_id: "stu-1".to_string(),
            school_id: "sch-1".to_string(),
            amount,
            payment_method_id: None,
            notes: None,
        }
    }

    #[test]
    fn test_check_amount() {
        assert!(check_amount(25.0, 10_000.0).is_ok());
        assert!(check_amount(10_000.0, 10_000.0).is_ok());
        assert!(check_amount(0.0, 10_000.0).is_err());
        assert!(check_amount(-20.0, 10_000.0).is_err());
        assert!(check_amount(15_000.0, 10_000.0).is_err());
        assert!(check_amount(f64::NAN, 10_000.0).is_err());
        assert_eq!(
            check_amount(12.345, 10_000.0),
            Err("Amount cannot have more than 2 decimal places".to_string())
        );
    }

    #[tokio::test]
    async fn test_valid_deposit_with_link() {
        let validator = setup_test().await;
        let validation = validator.validate_deposit(&request(25.0)).await;
        assert!(validation.valid);
        assert!(validation.reason.is_none());
    }

    #[tokio::test]
    async fn test_non_positive_and_oversized_amounts_are_invalid() {
        let validator = setup_test().await;
        for amount in [0.0, -0.01, -500.0, 15_000.0, 10_000.01] {
            let validation = validator.validate_deposit(&request(amount)).await;
            assert!(!validation.valid, "amount {} should be invalid", amount);
            assert!(validation.reason.is_some());
        }
    }

    #[tokio::test]
    async fn test_missing_relationship_is_invalid() {
        let validator = setup_test().await;

        let mut other_school = request(25.0);
        other_school.school_id = "sch-2".to_string();
        let validation = validator.validate_deposit(&other_school).await;
        assert!(!validation.valid);
        assert_eq!(
            validation.reason.as_deref(),
            Some("No active parent-student relationship for this school")
        );

        let mut stranger = request(25.0);
        stranger.parent_user_id = "parent-2".to_string();
        assert!(!validator.validate_deposit(&stranger).await.valid);
    }

    #[tokio::test]
    async fn test_payment_method_must_belong_to_parent() {
        let validator = setup_test().await;

        let mut with_method = request(25.0);
        with_method.payment_method_id = Some("pm-1".to_string());
        assert!(validator.validate_deposit(&with_method).await.valid);

        with_method.payment_method_id = Some("pm-missing".to_string());
        let validation = validator.validate_deposit(&with_method).await;
        assert_eq!(validation.reason.as_deref(), Some("Payment method not found"));
    }

    #[tokio::test]
    async fn test_blank_ids_and_long_notes_are_invalid() {
        let validator = setup_test().await;

        let mut blank = request(25.0);
        blank.student_id = "  ".to_string();
        assert_eq!(
            validator.validate_deposit(&blank).await.reason.as_deref(),
            Some("Student id is required")
        );

        let mut chatty = request(25.0);
        chatty.notes = Some("x".repeat(MAX_NOTES_LENGTH + 1));
        assert!(!validator.validate_deposit(&chatty).await.valid);
    }
}
