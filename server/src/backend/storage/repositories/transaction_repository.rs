use anyhow::Result;
use async_trait::async_trait;
use shared::PurchaseTransaction;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use crate::backend::storage::{connection::DbConnection, traits::PurchaseHistory};

/// Spending windows and caps re-checked inside the debit statement.
/// Bounds are storage-format timestamps, each window is `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpendingGuard {
    pub day_start: String,
    pub day_end: String,
    pub daily_limit: f64,
    pub month_start: String,
    pub month_end: String,
    pub monthly_limit: f64,
}

/// Outcome of a guarded debit. Nothing is written unless it is `Debited`.
#[derive(Debug, Clone, PartialEq)]
pub enum DebitOutcome {
    Debited { new_balance: f64, daily_spent: f64 },
    DailyLimitReached { spent: f64 },
    MonthlyLimitReached { spent: f64 },
    InsufficientBalance,
}

/// Repository for purchase transactions
#[derive(Clone)]
pub struct TransactionRepository {
    db: DbConnection,
}

fn row_to_purchase(r: &SqliteRow) -> PurchaseTransaction {
    PurchaseTransaction {
        id: r.get("id"),
        student_id: r.get("student_id"),
        school_id: r.get("school_id"),
        product_id: r.get("product_id"),
        product_name: r.get("product_name"),
        operating_unit: r.get("operating_unit"),
        amount: r.get("amount"),
        created_at: r.get("created_at"),
    }
}

impl TransactionRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Debit the student's profile and store the purchase in one database
    /// transaction, provided the balance covers the amount and the purchase
    /// fits both spending windows as they stand when the write happens.
    pub async fn store_purchase_with_debit(
        &self,
        purchase: &PurchaseTransaction,
        guard: &SpendingGuard,
    ) -> Result<DebitOutcome> {
        let mut tx = self.db.pool().begin().await?;
        let outcome = debit_and_record(&mut *tx, purchase, guard).await?;
        if matches!(outcome, DebitOutcome::Debited { .. }) {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        Ok(outcome)
    }

    /// Store a purchase without touching balances (imports and fixtures)
    pub async fn store_purchase(&self, purchase: &PurchaseTransaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO purchase_transactions
                (id, student_id, school_id, product_id, product_name, operating_unit, amount, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.student_id)
        .bind(&purchase.school_id)
        .bind(&purchase.product_id)
        .bind(&purchase.product_name)
        .bind(&purchase.operating_unit)
        .bind(purchase.amount)
        .bind(&purchase.created_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}

fn cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

async fn window_spent(
    conn: &mut SqliteConnection,
    student_id: &str,
    school_id: &str,
    start: &str,
    end: &str,
) -> Result<f64> {
    let spent: f64 = sqlx::query(
        r#"
        SELECT ROUND(COALESCE(SUM(amount), 0), 2) AS spent
        FROM purchase_transactions
        WHERE student_id = ? AND school_id = ? AND created_at >= ? AND created_at < ?
        "#,
    )
    .bind(student_id)
    .bind(school_id)
    .bind(start)
    .bind(end)
    .fetch_one(&mut *conn)
    .await?
    .get("spent");
    Ok(spent)
}

/// Guarded debit plus purchase row on a connection that is already inside a
/// transaction. The balance and both window sums are checked by the same
/// UPDATE that takes the write lock, so concurrent debits cannot both pass.
/// The caller commits only on `Debited`.
pub(crate) async fn debit_and_record(
    conn: &mut SqliteConnection,
    purchase: &PurchaseTransaction,
    guard: &SpendingGuard,
) -> Result<DebitOutcome> {
    let debited = sqlx::query(
        r#"
        UPDATE profiles
        SET balance = ROUND(balance - ?, 2)
        WHERE student_id = ? AND school_id = ? AND balance >= ?
          AND ROUND((SELECT COALESCE(SUM(amount), 0) FROM purchase_transactions
                     WHERE student_id = ? AND school_id = ? AND created_at >= ? AND created_at < ?) + ?, 2) <= ?
          AND ROUND((SELECT COALESCE(SUM(amount), 0) FROM purchase_transactions
                     WHERE student_id = ? AND school_id = ? AND created_at >= ? AND created_at < ?) + ?, 2) <= ?
        "#,
    )
    .bind(purchase.amount)
    .bind(&purchase.student_id)
    .bind(&purchase.school_id)
    .bind(purchase.amount)
    .bind(&purchase.student_id)
    .bind(&purchase.school_id)
    .bind(&guard.day_start)
    .bind(&guard.day_end)
    .bind(purchase.amount)
    .bind(guard.daily_limit)
    .bind(&purchase.student_id)
    .bind(&purchase.school_id)
    .bind(&guard.month_start)
    .bind(&guard.month_end)
    .bind(purchase.amount)
    .bind(guard.monthly_limit)
    .execute(&mut *conn)
    .await?;

    if debited.rows_affected() == 0 {
        // Same order as the policy: daily, then monthly, then balance
        let daily = window_spent(conn, &purchase.student_id, &purchase.school_id, &guard.day_start, &guard.day_end).await?;
        if cents(daily + purchase.amount) > guard.daily_limit {
            return Ok(DebitOutcome::DailyLimitReached { spent: daily });
        }
        let monthly =
            window_spent(conn, &purchase.student_id, &purchase.school_id, &guard.month_start, &guard.month_end).await?;
        if cents(monthly + purchase.amount) > guard.monthly_limit {
            return Ok(DebitOutcome::MonthlyLimitReached { spent: monthly });
        }
        return Ok(DebitOutcome::InsufficientBalance);
    }

    sqlx::query(
        r#"
        INSERT INTO purchase_transactions
            (id, student_id, school_id, product_id, product_name, operating_unit, amount, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&purchase.id)
    .bind(&purchase.student_id)
    .bind(&purchase.school_id)
    .bind(&purchase.product_id)
    .bind(&purchase.product_name)
    .bind(&purchase.operating_unit)
    .bind(purchase.amount)
    .bind(&purchase.created_at)
    .execute(&mut *conn)
    .await?;

    let new_balance: f64 = sqlx::query("SELECT balance FROM profiles WHERE student_id = ? AND school_id = ?")
        .bind(&purchase.student_id)
        .bind(&purchase.school_id)
        .fetch_one(&mut *conn)
        .await?
        .get("balance");
    let daily_spent = window_spent(conn, &purchase.student_id, &purchase.school_id, &guard.day_start, &guard.day_end).await?;

    Ok(DebitOutcome::Debited { new_balance, daily_spent })
}

#[async_trait]
impl PurchaseHistory for TransactionRepository {
    async fn purchases_for_student(
        &self,
        student_id: &str,
        school_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<PurchaseTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, student_id, school_id, product_id, product_name, operating_unit, amount, created_at
            FROM purchase_transactions
            WHERE student_id = ? AND school_id = ? AND created_at >= ? AND created_at < ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(student_id)
        .bind(school_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_purchase).collect())
    }

    async fn purchases_for_school(&self, school_id: &str, since: &str) -> Result<Vec<PurchaseTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, student_id, school_id, product_id, product_name, operating_unit, amount, created_at
            FROM purchase_transactions
            WHERE school_id = ? AND created_at >= ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(school_id)
        .bind(since)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_purchase).collect())
    }

    async fn student_count(&self, school_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM profiles WHERE school_id = ?")
            .bind(school_id)
            .fetch_one(self.db.pool())
            .await?
            .get("count");
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::ProfileRepository;

    fn purchase(id: &str, amount: f64, created_at: &str) -> PurchaseTransaction {
        PurchaseTransaction {
            id: id.to_string(),
            student_id: "stu-1".to_string(),
            school_id: "sch-1".to_string(),
            product_id: "prod-1".to_string(),
            product_name: "Bagel".to_string(),
            operating_unit: "Cafeteria".to_string(),
            amount,
            created_at: created_at.to_string(),
        }
    }

    fn september_first(daily_limit: f64, monthly_limit: f64) -> SpendingGuard {
        SpendingGuard {
            day_start: "2025-09-01T00:00:00.000Z".to_string(),
            day_end: "2025-09-02T00:00:00.000Z".to_string(),
            daily_limit,
            month_start: "2025-09-01T00:00:00.000Z".to_string(),
            month_end: "2025-10-01T00:00:00.000Z".to_string(),
            monthly_limit,
        }
    }

    #[tokio::test]
    async fn test_debit_and_store_is_atomic() {
        let db = DbConnection::init_test().await.unwrap();
        let repo = TransactionRepository::new(db.clone());
        let profiles = ProfileRepository::new(db);
        profiles.create_profile("stu-1", "sch-1", "Ada", 10.0).await.unwrap();

        let guard = september_first(50.0, 500.0);
        let outcome = repo
            .store_purchase_with_debit(&purchase("tx-1", 4.25, "2025-09-01T09:00:00.000Z"), &guard)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DebitOutcome::Debited {
                new_balance: 5.75,
                daily_spent: 4.25
            }
        );

        // Not enough left: nothing is written
        let rejected = repo
            .store_purchase_with_debit(&purchase("tx-2", 6.0, "2025-09-01T10:00:00.000Z"), &guard)
            .await
            .unwrap();
        assert_eq!(rejected, DebitOutcome::InsufficientBalance);

        let stored = repo
            .purchases_for_student("stu-1", "sch-1", "2025-09-01T00:00:00.000Z", "2025-09-02T00:00:00.000Z")
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, "tx-1");
        let profile = profiles.get_profile("stu-1", "sch-1").await.unwrap().unwrap();
        assert_eq!(profile.balance, 5.75);
    }

    #[tokio::test]
    async fn test_debit_rechecks_windows_against_stored_purchases() {
        let db = DbConnection::init_test().await.unwrap();
        let repo = TransactionRepository::new(db.clone());
        let profiles = ProfileRepository::new(db);
        profiles.create_profile("stu-1", "sch-1", "Ada", 100.0).await.unwrap();

        // Spend recorded after the caller read usage still counts
        repo.store_purchase(&purchase("earlier", 8.0, "2025-09-01T08:00:00.000Z")).await.unwrap();
        let daily = repo
            .store_purchase_with_debit(&purchase("tx-1", 8.0, "2025-09-01T09:00:00.000Z"), &september_first(10.0, 500.0))
            .await
            .unwrap();
        assert_eq!(daily, DebitOutcome::DailyLimitReached { spent: 8.0 });

        let monthly = repo
            .store_purchase_with_debit(&purchase("tx-2", 2.0, "2025-09-01T09:00:00.000Z"), &september_first(50.0, 9.0))
            .await
            .unwrap();
        assert_eq!(monthly, DebitOutcome::MonthlyLimitReached { spent: 8.0 });

        // Landing exactly on the cap is allowed
        let exact = repo
            .store_purchase_with_debit(&purchase("tx-3", 2.0, "2025-09-01T09:00:00.000Z"), &september_first(10.0, 10.0))
            .await
            .unwrap();
        assert_eq!(
            exact,
            DebitOutcome::Debited {
                new_balance: 98.0,
                daily_spent: 10.0
            }
        );
        assert_eq!(profiles.get_profile("stu-1", "sch-1").await.unwrap().unwrap().balance, 98.0);
    }

    #[tokio::test]
    async fn test_window_bounds_are_half_open() {
        let db = DbConnection::init_test().await.unwrap();
        let repo = TransactionRepository::new(db);
        repo.store_purchase(&purchase("a", 1.0, "2025-08-31T23:59:59.999Z")).await.unwrap();
        repo.store_purchase(&purchase("b", 2.0, "2025-09-01T00:00:00.000Z")).await.unwrap();
        repo.store_purchase(&purchase("c", 3.0, "2025-09-02T00:00:00.000Z")).await.unwrap();

        let in_window = repo
            .purchases_for_student("stu-1", "sch-1", "2025-09-01T00:00:00.000Z", "2025-09-02T00:00:00.000Z")
            .await
            .unwrap();
        let ids: Vec<_> = in_window.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);

        let school = repo.purchases_for_school("sch-1", "2025-09-01T00:00:00.000Z").await.unwrap();
        assert_eq!(school.len(), 2);
        assert_eq!(repo.student_count("sch-1").await.unwrap(), 0);
    }
}
