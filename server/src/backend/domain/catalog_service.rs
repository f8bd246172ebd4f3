//! Student profiles, the per-school product catalog and favorites.

use chrono::Utc;
use shared::{Favorite, Product, Profile};
use std::sync::Arc;
use tracing::info;

use super::errors::{require_id, DomainError, DomainResult};
use super::money::{format_amount, has_cent_precision};
use crate::backend::storage::{format_timestamp, DbConnection, FavoriteRepository, ProductRepository, ProfileRepository};

#[derive(Clone)]
pub struct CatalogService {
    profile_repository: ProfileRepository,
    product_repository: ProductRepository,
    favorite_repository: FavoriteRepository,
}

impl CatalogService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            profile_repository: ProfileRepository::new((*db).clone()),
            product_repository: ProductRepository::new((*db).clone()),
            favorite_repository: FavoriteRepository::new((*db).clone()),
        }
    }

    pub async fn create_profile(
        &self,
        student_id: &str,
        school_id: &str,
        display_name: &str,
        opening_balance: f64,
    ) -> DomainResult<Profile> {
        require_id("student_id", student_id)?;
        require_id("school_id", school_id)?;
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(DomainError::Validation("Display name must not be empty".to_string()));
        }
        if !(opening_balance.is_finite() && opening_balance >= 0.0 && has_cent_precision(opening_balance)) {
            return Err(DomainError::Validation(
                "Opening balance must be zero or a positive amount with at most 2 decimal places".to_string(),
            ));
        }
        if self.profile_repository.get_profile(student_id, school_id).await?.is_some() {
            return Err(DomainError::Conflict(format!(
                "Student {} already has a profile at school {}",
                student_id, school_id
            )));
        }

        let profile = self
            .profile_repository
            .create_profile(student_id, school_id, display_name, opening_balance)
            .await?;
        info!(
            "Created profile for student {} at school {} with balance {}",
            student_id,
            school_id,
            format_amount(opening_balance)
        );
        Ok(profile)
    }

    pub async fn get_profile(&self, student_id: &str, school_id: &str) -> DomainResult<Profile> {
        self.profile_repository
            .get_profile(student_id, school_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Profile for student {}", student_id)))
    }

    /// Insert or replace a catalog entry
    pub async fn add_product(&self, product: Product) -> DomainResult<Product> {
        require_id("id", &product.id)?;
        require_id("school_id", &product.school_id)?;
        if product.name.trim().is_empty() {
            return Err(DomainError::Validation("Product name must not be empty".to_string()));
        }
        if product.operating_unit.trim().is_empty() {
            return Err(DomainError::Validation("Operating unit must not be empty".to_string()));
        }
        if !(product.price.is_finite() && product.price > 0.0 && has_cent_precision(product.price)) {
            return Err(DomainError::Validation(
                "Price must be a positive amount with at most 2 decimal places".to_string(),
            ));
        }

        self.product_repository.store_product(&product).await?;
        info!("Stored product {} ({}) for school {}", product.id, product.name, product.school_id);
        Ok(product)
    }

    /// Active products of a school; inactive ones stay hidden
    pub async fn list_products(&self, school_id: &str) -> DomainResult<Vec<Product>> {
        require_id("school_id", school_id)?;
        Ok(self.product_repository.list_active_products(school_id).await?)
    }

    /// Active product sold at the given school
    pub async fn get_active_product(&self, school_id: &str, product_id: &str) -> DomainResult<Product> {
        match self.product_repository.get_product(product_id).await? {
            Some(product) if product.school_id == school_id && product.is_active => Ok(product),
            _ => Err(DomainError::NotFound(format!("Product {}", product_id))),
        }
    }

    /// Idempotent
    pub async fn add_favorite(&self, student_id: &str, school_id: &str, product_id: &str) -> DomainResult<Favorite> {
        require_id("student_id", student_id)?;
        self.get_active_product(school_id, product_id).await?;

        let favorite = Favorite {
            student_id: student_id.to_string(),
            school_id: school_id.to_string(),
            product_id: product_id.to_string(),
            created_at: format_timestamp(Utc::now()),
        };
        self.favorite_repository.add_favorite(&favorite).await?;
        Ok(favorite)
    }

    pub async fn remove_favorite(&self, student_id: &str, product_id: &str) -> DomainResult<()> {
        if !self.favorite_repository.remove_favorite(student_id, product_id).await? {
            return Err(DomainError::NotFound(format!("Favorite {}", product_id)));
        }
        Ok(())
    }

    pub async fn list_favorites(&self, student_id: &str) -> DomainResult<Vec<Favorite>> {
        require_id("student_id", student_id)?;
        Ok(self.favorite_repository.list_favorites(student_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test() -> CatalogService {
        let db = Arc::new(DbConnection::init_test().await.expect("Failed to create test database"));
        CatalogService::new(db)
    }

    fn product(id: &str, name: &str, price: f64, is_active: bool) -> Product {
        Product {
            id: id.to_string(),
            school_id: "sch-1".to_string(),
            name: name.to_string(),
            price,
            operating_unit: "Cafeteria".to_string(),
            is_active,
        }
    }

    #[tokio::test]
    async fn test_profile_lifecycle() {
        let service = setup_test().await;

        assert!(matches!(
            service.get_profile("stu-1", "sch-1").await,
            Err(DomainError::NotFound(_))
        ));

        let created = service.create_profile("stu-1", "sch-1", " Sam ", 12.5).await.unwrap();
        assert_eq!(created.display_name, "Sam");
        assert_eq!(service.get_profile("stu-1", "sch-1").await.unwrap(), created);

        assert!(matches!(
            service.create_profile("stu-1", "sch-1", "Sam", 0.0).await,
            Err(DomainError::Conflict(_))
        ));
        assert!(matches!(
            service.create_profile("stu-2", "sch-1", "Alex", -1.0).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_catalog_hides_inactive_products() {
        let service = setup_test().await;
        service.add_product(product("p-2", "Pizza", 4.5, true)).await.unwrap();
        service.add_product(product("p-1", "Apple", 1.0, true)).await.unwrap();
        service.add_product(product("p-3", "Retired Soda", 2.0, false)).await.unwrap();

        let names: Vec<_> = service
            .list_products("sch-1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Apple", "Pizza"]);

        assert!(matches!(
            service.add_product(product("p-4", "Free", 0.0, true)).await,
            Err(DomainError::Validation(_))
        ));
        assert!(service.list_products("sch-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_favorites_are_idempotent() {
        let service = setup_test().await;
        service.add_product(product("p-1", "Apple", 1.0, true)).await.unwrap();

        service.add_favorite("stu-1", "sch-1", "p-1").await.unwrap();
        service.add_favorite("stu-1", "sch-1", "p-1").await.unwrap();
        assert_eq!(service.list_favorites("stu-1").await.unwrap().len(), 1);

        assert!(matches!(
            service.add_favorite("stu-1", "sch-1", "missing").await,
            Err(DomainError::NotFound(_))
        ));

        service.remove_favorite("stu-1", "p-1").await.unwrap();
        assert!(service.list_favorites("stu-1").await.unwrap().is_empty());
        assert!(matches!(
            service.remove_favorite("stu-1", "p-1").await,
            Err(DomainError::NotFound(_))
        ));
    }
}
