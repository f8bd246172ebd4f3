use anyhow::Result;
use shared::SpendingLimit;
use sqlx::{sqlite::SqliteRow, Row};

use crate::backend::storage::connection::DbConnection;

/// Repository for per-student spending limits
#[derive(Clone)]
pub struct SpendingLimitRepository {
    db: DbConnection,
}

fn row_to_limit(r: &SqliteRow) -> SpendingLimit {
    SpendingLimit {
        student_id: r.get("student_id"),
        school_id: r.get("school_id"),
        daily_limit: r.get("daily_limit"),
        monthly_limit: r.get("monthly_limit"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

impl SpendingLimitRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn get_limit(&self, student_id: &str, school_id: &str) -> Result<Option<SpendingLimit>> {
        let row = sqlx::query(
            r#"
            SELECT student_id, school_id, daily_limit, monthly_limit, created_at, updated_at
            FROM spending_limits
            WHERE student_id = ? AND school_id = ?
            "#,
        )
        .bind(student_id)
        .bind(school_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(row_to_limit))
    }

    /// Insert `limit` unless a row already exists, then return the stored row.
    /// Two concurrent first reads therefore agree on a single record.
    pub async fn get_or_insert_limit(&self, limit: &SpendingLimit) -> Result<SpendingLimit> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO spending_limits
                (student_id, school_id, daily_limit, monthly_limit, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&limit.student_id)
        .bind(&limit.school_id)
        .bind(limit.daily_limit)
        .bind(limit.monthly_limit)
        .bind(&limit.created_at)
        .bind(&limit.updated_at)
        .execute(self.db.pool())
        .await?;

        let row = sqlx::query(
            r#"
            SELECT student_id, school_id, daily_limit, monthly_limit, created_at, updated_at
            FROM spending_limits
            WHERE student_id = ? AND school_id = ?
            "#,
        )
        .bind(&limit.student_id)
        .bind(&limit.school_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(row_to_limit(&row))
    }

    pub async fn upsert_limit(&self, limit: &SpendingLimit) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO spending_limits
                (student_id, school_id, daily_limit, monthly_limit, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (student_id, school_id) DO UPDATE SET
                daily_limit = excluded.daily_limit,
                monthly_limit = excluded.monthly_limit,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&limit.student_id)
        .bind(&limit.school_id)
        .bind(limit.daily_limit)
        .bind(limit.monthly_limit)
        .bind(&limit.created_at)
        .bind(&limit.updated_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}
