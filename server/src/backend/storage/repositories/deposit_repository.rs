use anyhow::{anyhow, Result};
use shared::{Deposit, DepositStatus};
use sqlx::{sqlite::SqliteRow, Row};

use crate::backend::storage::connection::DbConnection;

/// Outcome of the atomic complete-and-credit step
#[derive(Debug, Clone, PartialEq)]
pub enum DepositCompletion {
    Completed { deposit: Deposit, new_balance: f64 },
    NotFound,
    NotPending(DepositStatus),
    MissingProfile,
}

/// Repository for parent deposits
#[derive(Clone)]
pub struct DepositRepository {
    db: DbConnection,
}

const DEPOSIT_COLUMNS: &str = "id, parent_user_id, student_id, school_id, amount, payment_method_id, notes, \
     status, failure_reason, created_at, deposited_at, completed_at";

fn row_to_deposit(r: &SqliteRow) -> Result<Deposit> {
    let status: String = r.get("status");
    Ok(Deposit {
        id: r.get("id"),
        parent_user_id: r.get("parent_user_id"),
        student_id: r.get("student_id"),
        school_id: r.get("school_id"),
        amount: r.get("amount"),
        payment_method_id: r.get("payment_method_id"),
        notes: r.get("notes"),
        status: DepositStatus::parse(&status).ok_or_else(|| anyhow!("Unknown deposit status '{}'", status))?,
        failure_reason: r.get("failure_reason"),
        created_at: r.get("created_at"),
        deposited_at: r.get("deposited_at"),
        completed_at: r.get("completed_at"),
    })
}

impl DepositRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn store_deposit(&self, deposit: &Deposit) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO deposits (id, parent_user_id, student_id, school_id, amount, payment_method_id, notes,
                                  status, failure_reason, created_at, deposited_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&deposit.id)
        .bind(&deposit.parent_user_id)
        .bind(&deposit.student_id)
        .bind(&deposit.school_id)
        .bind(deposit.amount)
        .bind(&deposit.payment_method_id)
        .bind(&deposit.notes)
        .bind(deposit.status.as_str())
        .bind(&deposit.failure_reason)
        .bind(&deposit.created_at)
        .bind(&deposit.deposited_at)
        .bind(&deposit.completed_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn get_deposit(&self, id: &str) -> Result<Option<Deposit>> {
        let row = sqlx::query(&format!("SELECT {} FROM deposits WHERE id = ?", DEPOSIT_COLUMNS))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(row_to_deposit).transpose()
    }

    /// Deposits created by a parent, newest first
    pub async fn list_deposits_for_parent(&self, parent_user_id: &str) -> Result<Vec<Deposit>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM deposits WHERE parent_user_id = ? ORDER BY created_at DESC, id DESC",
            DEPOSIT_COLUMNS
        ))
        .bind(parent_user_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_deposit).collect()
    }

    /// Move a pending deposit to a terminal, non-crediting status.
    /// Returns false when the deposit is missing or no longer pending.
    pub async fn close_pending_deposit(
        &self,
        id: &str,
        status: DepositStatus,
        failure_reason: Option<&str>,
        closed_at: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE deposits SET status = ?, failure_reason = ?, completed_at = ?
            WHERE id = ? AND status = 'PENDING'
            "#,
        )
        .bind(status.as_str())
        .bind(failure_reason)
        .bind(closed_at)
        .bind(id)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a pending deposit completed and credit the student's balance in
    /// one database transaction, so the credit happens exactly once.
    pub async fn complete_and_credit(&self, id: &str, completed_at: &str) -> Result<DepositCompletion> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(&format!("SELECT {} FROM deposits WHERE id = ?", DEPOSIT_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut deposit = match row {
            Some(r) => row_to_deposit(&r)?,
            None => {
                tx.rollback().await?;
                return Ok(DepositCompletion::NotFound);
            }
        };

        if deposit.status != DepositStatus::Pending {
            tx.rollback().await?;
            return Ok(DepositCompletion::NotPending(deposit.status));
        }

        let credited = sqlx::query(
            r#"
            UPDATE profiles SET balance = ROUND(balance + ?, 2)
            WHERE student_id = ? AND school_id = ?
            "#,
        )
        .bind(deposit.amount)
        .bind(&deposit.student_id)
        .bind(&deposit.school_id)
        .execute(&mut *tx)
        .await?;
        if credited.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(DepositCompletion::MissingProfile);
        }

        sqlx::query(
            r#"
            UPDATE deposits SET status = 'COMPLETED', deposited_at = ?, completed_at = ?
            WHERE id = ? AND status = 'PENDING'
            "#,
        )
        .bind(completed_at)
        .bind(completed_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let new_balance: f64 = sqlx::query("SELECT balance FROM profiles WHERE student_id = ? AND school_id = ?")
            .bind(&deposit.student_id)
            .bind(&deposit.school_id)
            .fetch_one(&mut *tx)
            .await?
            .get("balance");

        tx.commit().await?;

        deposit.status = DepositStatus::Completed;
        deposit.deposited_at = Some(completed_at.to_string());
        deposit.completed_at = Some(completed_at.to_string());
        Ok(DepositCompletion::Completed { deposit, new_balance })
    }
}
