use anyhow::Result;
use chrono::Utc;
use shared::Profile;
use sqlx::Row;

use crate::backend::storage::{connection::DbConnection, format_timestamp};

/// Repository for student wallet profiles
#[derive(Clone)]
pub struct ProfileRepository {
    db: DbConnection,
}

impl ProfileRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn create_profile(
        &self,
        student_id: &str,
        school_id: &str,
        display_name: &str,
        opening_balance: f64,
    ) -> Result<Profile> {
        sqlx::query(
            r#"
            INSERT INTO profiles (student_id, school_id, display_name, balance, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(student_id)
        .bind(school_id)
        .bind(display_name)
        .bind(opening_balance)
        .bind(format_timestamp(Utc::now()))
        .execute(self.db.pool())
        .await?;

        Ok(Profile {
            student_id: student_id.to_string(),
            school_id: school_id.to_string(),
            display_name: display_name.to_string(),
            balance: opening_balance,
        })
    }

    pub async fn get_profile(&self, student_id: &str, school_id: &str) -> Result<Option<Profile>> {
        let row = sqlx::query(
            r#"
            SELECT student_id, school_id, display_name, balance
            FROM profiles
            WHERE student_id = ? AND school_id = ?
            "#,
        )
        .bind(student_id)
        .bind(school_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|r| Profile {
            student_id: r.get("student_id"),
            school_id: r.get("school_id"),
            display_name: r.get("display_name"),
            balance: r.get("balance"),
        }))
    }
}
