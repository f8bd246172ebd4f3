//! Parent alerts.
//!
//! Alerts are append-only. The single permitted update is unread -> read,
//! which is never reversed.

use chrono::{DateTime, Utc};
use shared::{Alert, AlertSeverity, AlertType, CreateAlertRequest};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::errors::{require_id, DomainError, DomainResult};
use crate::backend::storage::{format_timestamp, AlertRepository, DbConnection, LinkRepository};

#[derive(Clone)]
pub struct AlertService {
    alert_repository: AlertRepository,
    link_repository: LinkRepository,
}

impl AlertService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            alert_repository: AlertRepository::new((*db).clone()),
            link_repository: LinkRepository::new((*db).clone()),
        }
    }

    /// Store a new unread alert and return its id
    pub async fn create_alert(&self, request: CreateAlertRequest) -> DomainResult<String> {
        self.create_alert_at(request, Utc::now()).await
    }

    pub async fn create_alert_at(&self, request: CreateAlertRequest, now: DateTime<Utc>) -> DomainResult<String> {
        require_id("student_id", &request.student_id)?;
        require_id("school_id", &request.school_id)?;
        require_id("parent_user_id", &request.parent_user_id)?;
        if request.message.trim().is_empty() {
            return Err(DomainError::Validation("Alert message must not be empty".to_string()));
        }

        let alert = Alert {
            id: Uuid::new_v4().to_string(),
            student_id: request.student_id,
            school_id: request.school_id,
            parent_user_id: request.parent_user_id,
            alert_type: request.alert_type,
            severity: request.severity,
            message: request.message.trim().to_string(),
            is_read: false,
            created_at: format_timestamp(now),
            read_at: None,
        };
        self.alert_repository.store_alert(&alert).await?;

        info!(
            "Created {} alert {} for parent {} (student {})",
            alert.alert_type.as_str(),
            alert.id,
            alert.parent_user_id,
            alert.student_id
        );
        Ok(alert.id)
    }

    /// Unread alerts, oldest first with id as tie-break
    pub async fn get_unread_alerts(&self, parent_user_id: &str, school_id: &str) -> DomainResult<Vec<Alert>> {
        require_id("parent_user_id", parent_user_id)?;
        require_id("school_id", school_id)?;
        Ok(self.alert_repository.list_unread(parent_user_id, school_id).await?)
    }

    /// Mark one of the parent's alerts read. Marking an already-read alert
    /// returns it unchanged.
    pub async fn mark_alert_read(&self, parent_user_id: &str, alert_id: &str) -> DomainResult<Alert> {
        let alert = match self.alert_repository.get_alert(alert_id).await? {
            Some(alert) if alert.parent_user_id == parent_user_id => alert,
            _ => return Err(DomainError::NotFound(format!("Alert {}", alert_id))),
        };
        if alert.is_read {
            return Ok(alert);
        }

        self.alert_repository
            .mark_read(alert_id, &format_timestamp(Utc::now()))
            .await?;
        match self.alert_repository.get_alert(alert_id).await? {
            Some(updated) => Ok(updated),
            None => Err(DomainError::NotFound(format!("Alert {}", alert_id))),
        }
    }

    /// Raise the same alert, stamped `now`, for every parent actively linked
    /// to the student. Delivery is best effort: failures are logged and
    /// skipped. Returns the number of alerts stored.
    pub async fn notify_parents(
        &self,
        student_id: &str,
        school_id: &str,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: &str,
        now: DateTime<Utc>,
    ) -> usize {
        let parents = match self.link_repository.list_parents_for_student(student_id, school_id).await {
            Ok(parents) => parents,
            Err(e) => {
                error!("Failed to load parents for student {}: {}", student_id, e);
                return 0;
            }
        };

        let mut delivered = 0;
        for parent_user_id in parents {
            let request = CreateAlertRequest {
                student_id: student_id.to_string(),
                school_id: school_id.to_string(),
                parent_user_id,
                alert_type,
                severity,
                message: message.to_string(),
            };
            match self.create_alert_at(request, now).await {
                Ok(_) => delivered += 1,
                Err(e) => warn!("Failed to deliver {} alert: {}", alert_type.as_str(), e),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use shared::ParentStudentLink;

    async fn setup_test() -> (AlertService, Arc<DbConnection>) {
        let db = Arc::new(DbConnection::init_test().await.expect("Failed to create test database"));
        (AlertService::new(db.clone()), db)
    }

    fn request(parent: &str, message: &str) -> CreateAlertRequest {
        CreateAlertRequest {
            student_id: "stu-1".to_string(),
            school_id: "sch-1".to_string(),
            parent_user_id: parent.to_string(),
            alert_type: AlertType::LimitWarning,
            severity: AlertSeverity::Warning,
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_unread_alerts_are_returned_oldest_first() {
        let (service, _) = setup_test().await;
        let start = Utc.with_ymd_and_hms(2025, 9, 17, 8, 0, 0).unwrap();

        let second = service
            .create_alert_at(request("parent-1", "second"), start + Duration::minutes(5))
            .await
            .unwrap();
        let first = service.create_alert_at(request("parent-1", "first"), start).await.unwrap();
        service.create_alert_at(request("parent-2", "other"), start).await.unwrap();

        let unread = service.get_unread_alerts("parent-1", "sch-1").await.unwrap();
        let ids: Vec<_> = unread.iter().map(|a| a.id.clone()).collect();
        assert_eq!(ids, vec![first, second]);
        assert!(unread.iter().all(|a| !a.is_read));
    }

    #[tokio::test]
    async fn test_mark_read_is_one_way_and_idempotent() {
        let (service, _) = setup_test().await;
        let id = service.create_alert(request("parent-1", "Daily limit almost reached")).await.unwrap();

        let read = service.mark_alert_read("parent-1", &id).await.unwrap();
        assert!(read.is_read);
        let read_at = read.read_at.clone();
        assert!(read_at.is_some());

        // Second call is a no-op
        let again = service.mark_alert_read("parent-1", &id).await.unwrap();
        assert!(again.is_read);
        assert_eq!(again.read_at, read_at);

        assert!(service.get_unread_alerts("parent-1", "sch-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_parents_cannot_mark_alert() {
        let (service, _) = setup_test().await;
        let id = service.create_alert(request("parent-1", "hello")).await.unwrap();

        assert!(matches!(
            service.mark_alert_read("parent-2", &id).await,
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            service.mark_alert_read("parent-1", "missing").await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let (service, _) = setup_test().await;
        assert!(matches!(
            service.create_alert(request("parent-1", "   ")).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_notify_parents_reaches_every_active_link() {
        let (service, db) = setup_test().await;
        let links = LinkRepository::new((*db).clone());
        for parent in ["parent-1", "parent-2"] {
            links
                .upsert_link(&ParentStudentLink {
                    parent_user_id: parent.to_string(),
                    student_id: "stu-1".to_string(),
                    school_id: "sch-1".to_string(),
                    is_active: true,
                    created_at: "2025-09-01T00:00:00.000Z".to_string(),
                })
                .await
                .unwrap();
        }
        links.deactivate_link("parent-2", "stu-1", "sch-1").await.unwrap();

        let now = Utc.with_ymd_and_hms(2025, 9, 17, 12, 30, 0).unwrap();
        let delivered = service
            .notify_parents(
                "stu-1",
                "sch-1",
                AlertType::LowBalance,
                AlertSeverity::Warning,
                "Balance is low",
                now,
            )
            .await;
        assert_eq!(delivered, 1);
        let unread = service.get_unread_alerts("parent-1", "sch-1").await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].created_at, "2025-09-17T12:30:00.000Z");
        assert!(service.get_unread_alerts("parent-2", "sch-1").await.unwrap().is_empty());
    }
}
