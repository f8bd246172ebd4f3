use anyhow::Result;
use shared::Product;
use sqlx::{sqlite::SqliteRow, Row};

use crate::backend::storage::connection::DbConnection;

/// Repository for the per-school product catalog
#[derive(Clone)]
pub struct ProductRepository {
    db: DbConnection,
}

fn row_to_product(r: &SqliteRow) -> Product {
    Product {
        id: r.get("id"),
        school_id: r.get("school_id"),
        name: r.get("name"),
        price: r.get("price"),
        operating_unit: r.get("operating_unit"),
        is_active: r.get("is_active"),
    }
}

impl ProductRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn store_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO products (id, school_id, name, price, operating_unit, is_active)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.school_id)
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.operating_unit)
        .bind(product.is_active)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, school_id, name, price, operating_unit, is_active
            FROM products
            WHERE id = ?
            "#,
        )
        .bind(product_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(row_to_product))
    }

    /// Active products for a school ordered by name
    pub async fn list_active_products(&self, school_id: &str) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, school_id, name, price, operating_unit, is_active
            FROM products
            WHERE school_id = ? AND is_active = TRUE
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(school_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_product).collect())
    }
}
