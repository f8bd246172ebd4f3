use anyhow::Result;
use shared::{PaymentMethod, PaymentMethodType};
use sqlx::{sqlite::SqliteRow, Row};

use crate::backend::storage::connection::DbConnection;

/// Repository for parents' payment methods
#[derive(Clone)]
pub struct PaymentMethodRepository {
    db: DbConnection,
}

fn row_to_payment_method(r: &SqliteRow) -> PaymentMethod {
    PaymentMethod {
        id: r.get("id"),
        parent_user_id: r.get("parent_user_id"),
        label: r.get("label"),
        method_type: PaymentMethodType::parse(r.get::<&str, _>("method_type")),
        last_four: r.get("last_four"),
        is_default: r.get("is_default"),
        created_at: r.get("created_at"),
    }
}

impl PaymentMethodRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Store a new method. The parent's first method becomes the default.
    /// Returns the method as stored.
    pub async fn add_payment_method(&self, method: &PaymentMethod) -> Result<PaymentMethod> {
        let mut tx = self.db.pool().begin().await?;

        let existing: i64 = sqlx::query("SELECT COUNT(*) AS count FROM payment_methods WHERE parent_user_id = ?")
            .bind(&method.parent_user_id)
            .fetch_one(&mut *tx)
            .await?
            .get("count");

        let mut stored = method.clone();
        stored.is_default = existing == 0;

        sqlx::query(
            r#"
            INSERT INTO payment_methods (id, parent_user_id, label, method_type, last_four, is_default, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.parent_user_id)
        .bind(&stored.label)
        .bind(stored.method_type.as_str())
        .bind(&stored.last_four)
        .bind(stored.is_default)
        .bind(&stored.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    pub async fn get_payment_method(&self, id: &str) -> Result<Option<PaymentMethod>> {
        let row = sqlx::query(
            r#"
            SELECT id, parent_user_id, label, method_type, last_four, is_default, created_at
            FROM payment_methods
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(row_to_payment_method))
    }

    pub async fn list_payment_methods(&self, parent_user_id: &str) -> Result<Vec<PaymentMethod>> {
        let rows = sqlx::query(
            r#"
            SELECT id, parent_user_id, label, method_type, last_four, is_default, created_at
            FROM payment_methods
            WHERE parent_user_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(parent_user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_payment_method).collect())
    }

    /// Make `id` the parent's only default. Returns false if the parent does
    /// not own a method with that id, in which case nothing changes.
    pub async fn set_default(&self, parent_user_id: &str, id: &str) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;

        let owned = sqlx::query("SELECT id FROM payment_methods WHERE id = ? AND parent_user_id = ?")
            .bind(id)
            .bind(parent_user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owned.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE payment_methods SET is_default = (id = ?) WHERE parent_user_id = ?")
            .bind(id)
            .bind(parent_user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Returns true if the parent's method was deleted
    pub async fn delete_payment_method(&self, parent_user_id: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM payment_methods WHERE id = ? AND parent_user_id = ?")
            .bind(id)
            .bind(parent_user_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
