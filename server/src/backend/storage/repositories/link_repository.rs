use anyhow::Result;
use shared::ParentStudentLink;
use sqlx::{sqlite::SqliteRow, Row};

use crate::backend::storage::connection::DbConnection;

/// Repository for parent-student relationships
#[derive(Clone)]
pub struct LinkRepository {
    db: DbConnection,
}

fn row_to_link(r: &SqliteRow) -> ParentStudentLink {
    ParentStudentLink {
        parent_user_id: r.get("parent_user_id"),
        student_id: r.get("student_id"),
        school_id: r.get("school_id"),
        is_active: r.get("is_active"),
        created_at: r.get("created_at"),
    }
}

impl LinkRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Create the link, or reactivate it if it was deactivated
    pub async fn upsert_link(&self, link: &ParentStudentLink) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO parent_student_links (parent_user_id, student_id, school_id, is_active, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (parent_user_id, student_id, school_id)
            DO UPDATE SET is_active = excluded.is_active
            "#,
        )
        .bind(&link.parent_user_id)
        .bind(&link.student_id)
        .bind(&link.school_id)
        .bind(link.is_active)
        .bind(&link.created_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Returns true if an active link was deactivated
    pub async fn deactivate_link(&self, parent_user_id: &str, student_id: &str, school_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE parent_student_links SET is_active = FALSE
            WHERE parent_user_id = ? AND student_id = ? AND school_id = ? AND is_active = TRUE
            "#,
        )
        .bind(parent_user_id)
        .bind(student_id)
        .bind(school_id)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn has_active_link(&self, parent_user_id: &str, student_id: &str, school_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS count FROM parent_student_links
            WHERE parent_user_id = ? AND student_id = ? AND school_id = ? AND is_active = TRUE
            "#,
        )
        .bind(parent_user_id)
        .bind(student_id)
        .bind(school_id)
        .fetch_one(self.db.pool())
        .await?
        .get("count");
        Ok(count > 0)
    }

    pub async fn list_links_for_parent(&self, parent_user_id: &str) -> Result<Vec<ParentStudentLink>> {
        let rows = sqlx::query(
            r#"
            SELECT parent_user_id, student_id, school_id, is_active, created_at
            FROM parent_student_links
            WHERE parent_user_id = ? AND is_active = TRUE
            ORDER BY created_at ASC, student_id ASC
            "#,
        )
        .bind(parent_user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_link).collect())
    }

    /// Active parents of a student, used as alert recipients
    pub async fn list_parents_for_student(&self, student_id: &str, school_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT parent_user_id FROM parent_student_links
            WHERE student_id = ? AND school_id = ? AND is_active = TRUE
            ORDER BY parent_user_id ASC
            "#,
        )
        .bind(student_id)
        .bind(school_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(|r| r.get("parent_user_id")).collect())
    }
}
