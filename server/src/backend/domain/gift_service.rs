//! Peer gifts and thank-you notes.
//!
//! A gift is a purchase made by the sender on the receiver's behalf. It goes
//! through the sender's spending limits, counts toward the sender's daily
//! and monthly usage, and the debit, the purchase row and the gift are
//! stored in one database transaction.

use chrono::{DateTime, Utc};
use shared::{
    Gift, GiftItem, GiftStatus, PurchaseTransaction, SendGiftRequest, SendGiftResponse, ThankYouNote,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::catalog_service::CatalogService;
use super::errors::{require_id, DomainError, DomainResult};
use super::money::format_amount;
use super::spending_service::SpendingService;
use crate::backend::storage::{format_timestamp, DbConnection, DebitOutcome, GiftRedemption, GiftRepository};

pub const REDEMPTION_CODE_LENGTH: usize = 8;
pub const MAX_NOTE_LENGTH: usize = 500;

/// Short uppercase code printed on the gift
pub fn generate_redemption_code() -> String {
    let mut code = Uuid::new_v4().simple().to_string();
    code.truncate(REDEMPTION_CODE_LENGTH);
    code.to_uppercase()
}

#[derive(Clone)]
pub struct GiftService {
    gift_repository: GiftRepository,
    catalog_service: CatalogService,
    spending_service: SpendingService,
}

impl GiftService {
    pub fn new(db: Arc<DbConnection>, catalog_service: CatalogService, spending_service: SpendingService) -> Self {
        Self {
            gift_repository: GiftRepository::new((*db).clone()),
            catalog_service,
            spending_service,
        }
    }

    pub async fn send_gift(&self, sender_id: &str, request: SendGiftRequest) -> DomainResult<SendGiftResponse> {
        self.send_gift_at(sender_id, request, Utc::now()).await
    }

    pub async fn send_gift_at(
        &self,
        sender_id: &str,
        request: SendGiftRequest,
        now: DateTime<Utc>,
    ) -> DomainResult<SendGiftResponse> {
        require_id("sender_id", sender_id)?;
        require_id("receiver_id", &request.receiver_id)?;
        if sender_id == request.receiver_id {
            return Err(DomainError::Validation("Cannot send a gift to yourself".to_string()));
        }

        let product = self
            .catalog_service
            .get_active_product(&request.school_id, &request.product_id)
            .await?;
        self.catalog_service.get_profile(sender_id, &request.school_id).await?;
        self.catalog_service
            .get_profile(&request.receiver_id, &request.school_id)
            .await?;

        let evaluation = self
            .spending_service
            .evaluate_purchase_at(sender_id, &request.school_id, product.price, now)
            .await?;
        if let Some(reason) = evaluation.decision.reason() {
            info!("Declined gift of {} from student {}: {}", product.name, sender_id, reason);
            return Err(DomainError::Validation(reason));
        }

        let created_at = format_timestamp(now);
        let purchase = PurchaseTransaction {
            id: Uuid::new_v4().to_string(),
            student_id: sender_id.to_string(),
            school_id: request.school_id.clone(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            operating_unit: product.operating_unit.clone(),
            amount: product.price,
            created_at: created_at.clone(),
        };
        let gift = Gift {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: request.receiver_id,
            school_id: request.school_id,
            item: GiftItem {
                product_id: product.id,
                product_name: product.name,
                price: product.price,
            },
            redemption_code: generate_redemption_code(),
            status: GiftStatus::Pending,
            created_at,
            redeemed_at: None,
        };

        let outcome = self
            .gift_repository
            .create_gift_with_debit(&gift, &purchase, &evaluation.guard)
            .await?;
        let sender_balance = match outcome {
            DebitOutcome::Debited { new_balance, .. } => new_balance,
            DebitOutcome::InsufficientBalance => {
                return Err(DomainError::Validation(format!(
                    "Insufficient balance to send {} ({})",
                    gift.item.product_name,
                    format_amount(gift.item.price)
                )));
            }
            limited => {
                let reason = evaluation
                    .late_denial(&limited, gift.item.price)
                    .map(|denial| denial.to_string())
                    .unwrap_or_else(|| "Spending limit reached".to_string());
                return Err(DomainError::Validation(reason));
            }
        };

        info!(
            "Student {} sent gift {} ({}) to {}, balance now {}",
            gift.sender_id,
            gift.id,
            gift.item.product_name,
            gift.receiver_id,
            format_amount(sender_balance)
        );
        Ok(SendGiftResponse { gift, sender_balance })
    }

    /// Codes are matched case-insensitively
    pub async fn redeem_gift(&self, receiver_id: &str, redemption_code: &str) -> DomainResult<Gift> {
        let code = redemption_code.trim().to_uppercase();
        if code.is_empty() {
            return Err(DomainError::Validation("Redemption code must not be empty".to_string()));
        }

        match self
            .gift_repository
            .redeem(&code, receiver_id, &format_timestamp(Utc::now()))
            .await?
        {
            GiftRedemption::Redeemed(gift) => {
                info!("Gift {} redeemed by {}", gift.id, receiver_id);
                Ok(gift)
            }
            GiftRedemption::AlreadyRedeemed => Err(DomainError::Conflict("Gift has already been redeemed".to_string())),
            GiftRedemption::NotFound | GiftRedemption::WrongReceiver => {
                Err(DomainError::NotFound(format!("Gift with code {}", code)))
            }
        }
    }

    pub async fn list_received_gifts(&self, receiver_id: &str) -> DomainResult<Vec<Gift>> {
        require_id("receiver_id", receiver_id)?;
        Ok(self.gift_repository.list_gifts_for_receiver(receiver_id).await?)
    }

    /// Only the receiver of a gift may thank its sender
    pub async fn send_thank_you(&self, gift_id: &str, from_user: &str, message: &str) -> DomainResult<ThankYouNote> {
        let message = message.trim();
        let length = message.chars().count();
        if length == 0 || length > MAX_NOTE_LENGTH {
            return Err(DomainError::Validation(format!(
                "Message must be between 1 and {} characters",
                MAX_NOTE_LENGTH
            )));
        }

        let gift = match self.gift_repository.get_gift(gift_id).await? {
            Some(gift) if gift.receiver_id == from_user => gift,
            _ => return Err(DomainError::NotFound(format!("Gift {}", gift_id))),
        };

        let note = ThankYouNote {
            id: Uuid::new_v4().to_string(),
            gift_id: gift.id,
            sender_id: from_user.to_string(),
            receiver_id: gift.sender_id,
            message: message.to_string(),
            created_at: format_timestamp(Utc::now()),
        };
        self.gift_repository.store_note(&note).await?;

        info!("Thank-you note {} sent for gift {}", note.id, note.gift_id);
        Ok(note)
    }

    /// Notes addressed to the user, newest first
    pub async fn list_thank_you_notes(&self, user_id: &str) -> DomainResult<Vec<ThankYouNote>> {
        require_id("user_id", user_id)?;
        Ok(self.gift_repository.list_notes_for(user_id).await?)
    }
}
