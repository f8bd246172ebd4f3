use chrono::Utc;
use shared::ParentStudentLink;
use std::sync::Arc;
use tracing::info;

use super::errors::{require_id, DomainError, DomainResult};
use crate::backend::storage::{format_timestamp, DbConnection, LinkRepository};

/// Service for the parent-student relationships that authorize deposits
/// and route alerts
#[derive(Clone)]
pub struct LinkService {
    link_repository: LinkRepository,
}

impl LinkService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            link_repository: LinkRepository::new((*db).clone()),
        }
    }

    /// Create or reactivate a link
    pub async fn link_parent_student(
        &self,
        parent_user_id: &str,
        student_id: &str,
        school_id: &str,
    ) -> DomainResult<ParentStudentLink> {
        require_id("parent_user_id", parent_user_id)?;
        require_id("student_id", student_id)?;
        require_id("school_id", school_id)?;

        let link = ParentStudentLink {
            parent_user_id: parent_user_id.to_string(),
            student_id: student_id.to_string(),
            school_id: school_id.to_string(),
            is_active: true,
            created_at: format_timestamp(Utc::now()),
        };
        self.link_repository.upsert_link(&link).await?;

        info!("Linked parent {} to student {} at school {}", parent_user_id, student_id, school_id);
        Ok(link)
    }

    pub async fn unlink_parent_student(&self, parent_user_id: &str, student_id: &str, school_id: &str) -> DomainResult<()> {
        if !self
            .link_repository
            .deactivate_link(parent_user_id, student_id, school_id)
            .await?
        {
            return Err(DomainError::NotFound(format!("Link to student {}", student_id)));
        }
        info!("Unlinked parent {} from student {} at school {}", parent_user_id, student_id, school_id);
        Ok(())
    }

    pub async fn list_students_for_parent(&self, parent_user_id: &str) -> DomainResult<Vec<ParentStudentLink>> {
        require_id("parent_user_id", parent_user_id)?;
        Ok(self.link_repository.list_links_for_parent(parent_user_id).await?)
    }

    pub async fn is_linked(&self, parent_user_id: &str, student_id: &str, school_id: &str) -> DomainResult<bool> {
        Ok(self
            .link_repository
            .has_active_link(parent_user_id, student_id, school_id)
            .await?)
    }
}
