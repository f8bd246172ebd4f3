use anyhow::Result;
use shared::Favorite;
use sqlx::Row;

use crate::backend::storage::connection::DbConnection;

/// Repository for students' favorite products
#[derive(Clone)]
pub struct FavoriteRepository {
    db: DbConnection,
}

impl FavoriteRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Idempotent: an existing favorite keeps its original timestamp
    pub async fn add_favorite(&self, favorite: &Favorite) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO favorites (student_id, school_id, product_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&favorite.student_id)
        .bind(&favorite.school_id)
        .bind(&favorite.product_id)
        .bind(&favorite.created_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Returns true if a favorite was removed
    pub async fn remove_favorite(&self, student_id: &str, product_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM favorites WHERE student_id = ? AND product_id = ?")
            .bind(student_id)
            .bind(product_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_favorites(&self, student_id: &str) -> Result<Vec<Favorite>> {
        let rows = sqlx::query(
            r#"
            SELECT student_id, school_id, product_id, created_at
            FROM favorites
            WHERE student_id = ?
            ORDER BY created_at ASC, product_id ASC
            "#,
        )
        .bind(student_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|r| Favorite {
                student_id: r.get("student_id"),
                school_id: r.get("school_id"),
                product_id: r.get("product_id"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}
