use anyhow::{anyhow, Result};
use shared::{Gift, GiftItem, GiftStatus, PurchaseTransaction, ThankYouNote};
use sqlx::{sqlite::SqliteRow, Row};

use super::transaction_repository::{debit_and_record, DebitOutcome, SpendingGuard};
use crate::backend::storage::connection::DbConnection;

/// Outcome of a redemption attempt
#[derive(Debug, Clone, PartialEq)]
pub enum GiftRedemption {
    Redeemed(Gift),
    NotFound,
    AlreadyRedeemed,
    WrongReceiver,
}

/// Repository for gifts and the thank-you notes attached to them
#[derive(Clone)]
pub struct GiftRepository {
    db: DbConnection,
}

const GIFT_COLUMNS: &str = "id, sender_id, receiver_id, school_id, product_id, product_name, price, \
     redemption_code, status, created_at, redeemed_at";

fn row_to_gift(r: &SqliteRow) -> Result<Gift> {
    let status: String = r.get("status");
    Ok(Gift {
        id: r.get("id"),
        sender_id: r.get("sender_id"),
        receiver_id: r.get("receiver_id"),
        school_id: r.get("school_id"),
        item: GiftItem {
            product_id: r.get("product_id"),
            product_name: r.get("product_name"),
            price: r.get("price"),
        },
        redemption_code: r.get("redemption_code"),
        status: GiftStatus::parse(&status).ok_or_else(|| anyhow!("Unknown gift status '{}'", status))?,
        created_at: r.get("created_at"),
        redeemed_at: r.get("redeemed_at"),
    })
}

impl GiftRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Debit the sender, record the gifted item as the sender's purchase and
    /// create the gift in one database transaction. The debit is held to the
    /// same balance and spending-window checks as a direct purchase; nothing
    /// is written unless the outcome is `Debited`.
    pub async fn create_gift_with_debit(
        &self,
        gift: &Gift,
        purchase: &PurchaseTransaction,
        guard: &SpendingGuard,
    ) -> Result<DebitOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let outcome = debit_and_record(&mut *tx, purchase, guard).await?;
        if !matches!(outcome, DebitOutcome::Debited { .. }) {
            tx.rollback().await?;
            return Ok(outcome);
        }

        sqlx::query(
            r#"
            INSERT INTO gifts (id, sender_id, receiver_id, school_id, product_id, product_name, price,
                               redemption_code, status, created_at, redeemed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&gift.id)
        .bind(&gift.sender_id)
        .bind(&gift.receiver_id)
        .bind(&gift.school_id)
        .bind(&gift.item.product_id)
        .bind(&gift.item.product_name)
        .bind(gift.item.price)
        .bind(&gift.redemption_code)
        .bind(gift.status.as_str())
        .bind(&gift.created_at)
        .bind(&gift.redeemed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn get_gift(&self, id: &str) -> Result<Option<Gift>> {
        let row = sqlx::query(&format!("SELECT {} FROM gifts WHERE id = ?", GIFT_COLUMNS))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(row_to_gift).transpose()
    }

    pub async fn list_gifts_for_receiver(&self, receiver_id: &str) -> Result<Vec<Gift>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM gifts WHERE receiver_id = ? ORDER BY created_at DESC, id DESC",
            GIFT_COLUMNS
        ))
        .bind(receiver_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_gift).collect()
    }

    /// Pending -> Redeemed, only for the gift's receiver
    pub async fn redeem(&self, redemption_code: &str, receiver_id: &str, redeemed_at: &str) -> Result<GiftRedemption> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(&format!("SELECT {} FROM gifts WHERE redemption_code = ?", GIFT_COLUMNS))
            .bind(redemption_code)
            .fetch_optional(&mut *tx)
            .await?;
        let mut gift = match row {
            Some(r) => row_to_gift(&r)?,
            None => {
                tx.rollback().await?;
                return Ok(GiftRedemption::NotFound);
            }
        };

        if gift.receiver_id != receiver_id {
            tx.rollback().await?;
            return Ok(GiftRedemption::WrongReceiver);
        }
        if gift.status != GiftStatus::Pending {
            tx.rollback().await?;
            return Ok(GiftRedemption::AlreadyRedeemed);
        }

        sqlx::query("UPDATE gifts SET status = ?, redeemed_at = ? WHERE id = ? AND status = ?")
            .bind(GiftStatus::Redeemed.as_str())
            .bind(redeemed_at)
            .bind(&gift.id)
            .bind(GiftStatus::Pending.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        gift.status = GiftStatus::Redeemed;
        gift.redeemed_at = Some(redeemed_at.to_string());
        Ok(GiftRedemption::Redeemed(gift))
    }

    pub async fn store_note(&self, note: &ThankYouNote) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO thank_you_notes (id, gift_id, sender_id, receiver_id, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&note.id)
        .bind(&note.gift_id)
        .bind(&note.sender_id)
        .bind(&note.receiver_id)
        .bind(&note.message)
        .bind(&note.created_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Notes addressed to `user_id`, newest first
    pub async fn list_notes_for(&self, user_id: &str) -> Result<Vec<ThankYouNote>> {
        let rows = sqlx::query(
            r#"
            SELECT id, gift_id, sender_id, receiver_id, message, created_at
            FROM thank_you_notes
            WHERE receiver_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|r| ThankYouNote {
                id: r.get("id"),
                gift_id: r.get("gift_id"),
                sender_id: r.get("sender_id"),
                receiver_id: r.get("receiver_id"),
                message: r.get("message"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}
