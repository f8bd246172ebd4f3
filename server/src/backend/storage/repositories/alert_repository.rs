use anyhow::{anyhow, Result};
use shared::{Alert, AlertSeverity, AlertType};
use sqlx::{sqlite::SqliteRow, Row};

use crate::backend::storage::connection::DbConnection;

/// Repository for parent alerts. Rows are never deleted; the only update is
/// the one-way unread -> read transition.
#[derive(Clone)]
pub struct AlertRepository {
    db: DbConnection,
}

fn row_to_alert(r: &SqliteRow) -> Result<Alert> {
    let alert_type: String = r.get("alert_type");
    let severity: String = r.get("severity");
    Ok(Alert {
        id: r.get("id"),
        student_id: r.get("student_id"),
        school_id: r.get("school_id"),
        parent_user_id: r.get("parent_user_id"),
        alert_type: AlertType::parse(&alert_type).ok_or_else(|| anyhow!("Unknown alert type '{}'", alert_type))?,
        severity: AlertSeverity::parse(&severity).ok_or_else(|| anyhow!("Unknown alert severity '{}'", severity))?,
        message: r.get("message"),
        is_read: r.get("is_read"),
        created_at: r.get("created_at"),
        read_at: r.get("read_at"),
    })
}

impl AlertRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn store_alert(&self, alert: &Alert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, student_id, school_id, parent_user_id, alert_type, severity, message,
                                is_read, created_at, read_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.student_id)
        .bind(&alert.school_id)
        .bind(&alert.parent_user_id)
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(alert.is_read)
        .bind(&alert.created_at)
        .bind(&alert.read_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        let row = sqlx::query(
            r#"
            SELECT id, student_id, school_id, parent_user_id, alert_type, severity, message,
                   is_read, created_at, read_at
            FROM alerts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(row_to_alert).transpose()
    }

    /// Unread alerts for a parent at a school, oldest first
    pub async fn list_unread(&self, parent_user_id: &str, school_id: &str) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, student_id, school_id, parent_user_id, alert_type, severity, message,
                   is_read, created_at, read_at
            FROM alerts
            WHERE parent_user_id = ? AND school_id = ? AND is_read = FALSE
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(parent_user_id)
        .bind(school_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_alert).collect()
    }

    /// Returns true if the alert was unread and is now read
    pub async fn mark_read(&self, id: &str, read_at: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE alerts SET is_read = TRUE, read_at = ? WHERE id = ? AND is_read = FALSE")
            .bind(read_at)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
