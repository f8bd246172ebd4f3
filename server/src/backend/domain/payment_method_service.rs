use chrono::Utc;
use shared::{AddPaymentMethodRequest, PaymentMethod};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::errors::{require_id, DomainError, DomainResult};
use crate::backend::storage::{format_timestamp, DbConnection, PaymentMethodRepository};

const MAX_LABEL_LENGTH: usize = 64;

/// Service for parents' payment methods
#[derive(Clone)]
pub struct PaymentMethodService {
    payment_method_repository: PaymentMethodRepository,
}

impl PaymentMethodService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            payment_method_repository: PaymentMethodRepository::new((*db).clone()),
        }
    }

    /// Add a method for the parent; the first one becomes the default
    pub async fn add_payment_method(
        &self,
        parent_user_id: &str,
        request: AddPaymentMethodRequest,
    ) -> DomainResult<PaymentMethod> {
        require_id("parent_user_id", parent_user_id)?;

        let label = request.label.trim();
        if label.is_empty() {
            return Err(DomainError::Validation("Label must not be empty".to_string()));
        }
        if label.chars().count() > MAX_LABEL_LENGTH {
            return Err(DomainError::Validation(format!(
                "Label cannot exceed {} characters",
                MAX_LABEL_LENGTH
            )));
        }

        let last_four = request.last_four.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        if let Some(digits) = &last_four {
            if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(DomainError::Validation("last_four must be exactly 4 digits".to_string()));
            }
        }

        let method = PaymentMethod {
            id: Uuid::new_v4().to_string(),
            parent_user_id: parent_user_id.to_string(),
            label: label.to_string(),
            method_type: request.method_type,
            last_four,
            is_default: false,
            created_at: format_timestamp(Utc::now()),
        };
        let stored = self.payment_method_repository.add_payment_method(&method).await?;

        info!(
            "Added {} payment method {} for parent {} (default: {})",
            stored.method_type.as_str(),
            stored.id,
            parent_user_id,
            stored.is_default
        );
        Ok(stored)
    }

    pub async fn list_payment_methods(&self, parent_user_id: &str) -> DomainResult<Vec<PaymentMethod>> {
        require_id("parent_user_id", parent_user_id)?;
        Ok(self.payment_method_repository.list_payment_methods(parent_user_id).await?)
    }

    /// Make one method the parent's only default
    pub async fn set_default(&self, parent_user_id: &str, method_id: &str) -> DomainResult<Vec<PaymentMethod>> {
        if !self.payment_method_repository.set_default(parent_user_id, method_id).await? {
            return Err(DomainError::NotFound(format!("Payment method {}", method_id)));
        }
        info!("Payment method {} is now default for parent {}", method_id, parent_user_id);
        self.list_payment_methods(parent_user_id).await
    }

    /// Deposits keep their reference to a removed method. Removing the
    /// default leaves the parent without one.
    pub async fn remove_payment_method(&self, parent_user_id: &str, method_id: &str) -> DomainResult<()> {
        if !self
            .payment_method_repository
            .delete_payment_method(parent_user_id, method_id)
            .await?
        {
            return Err(DomainError::NotFound(format!("Payment method {}", method_id)));
        }
        info!("Removed payment method {} for parent {}", method_id, parent_user_id);
        Ok(())
    }
}
