//! Product repository for database operations.

use sqlx::PgPool;

use freshbites_core::{ProductId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::product::{NewProduct, Product};

const PRODUCT_COLUMNS: &str =
    "id, sku, title, description, price, image, is_premium, created_by, created_at, updated_at";

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List one menu, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, premium: bool) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_premium = $1 ORDER BY created_at, id"
        ))
        .bind(premium)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Get several products by ID. Missing IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<uuid::Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let products = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        product: &NewProduct,
        premium: bool,
        created_by: UserId,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as(&format!(
            r"
            INSERT INTO products (sku, title, description, price, image, is_premium, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.sku)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.image.as_deref())
        .bind(premium)
        .bind(created_by)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("sku already exists"))
    }

    /// Replace a product's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the new SKU is taken.
    pub async fn update(
        &self,
        id: ProductId,
        product: &NewProduct,
        premium: bool,
    ) -> Result<Product, RepositoryError> {
        let updated: Option<Product> = sqlx::query_as(&format!(
            r"
            UPDATE products SET
                sku = $2, title = $3, description = $4, price = $5, image = $6,
                is_premium = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&product.sku)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.image.as_deref())
        .bind(premium)
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("sku already exists"))?;

        updated.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product, returning the removed row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let deleted = sqlx::query_as(&format!(
            "DELETE FROM products WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(deleted)
    }

    /// Insert or overwrite products by ID in one transaction.
    ///
    /// `created_by` is cleared when the referenced user does not exist here.
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if two products share a SKU.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn upsert_many(&self, products: &[Product]) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for p in products {
            let result = sqlx::query(
                r"
                INSERT INTO products
                    (id, sku, title, description, price, image, is_premium, created_by, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, (SELECT id FROM users WHERE id = $8), $9, $10)
                ON CONFLICT (id) DO UPDATE SET
                    sku = EXCLUDED.sku,
                    title = EXCLUDED.title,
                    description = EXCLUDED.description,
                    price = EXCLUDED.price,
                    image = EXCLUDED.image,
                    is_premium = EXCLUDED.is_premium,
                    updated_at = NOW()
                ",
            )
            .bind(p.id)
            .bind(&p.sku)
            .bind(&p.title)
            .bind(&p.description)
            .bind(p.price)
            .bind(p.image.as_deref())
            .bind(p.is_premium)
            .bind(p.created_by)
            .bind(p.created_at)
            .bind(p.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(conflict_on_unique("duplicate sku in import"))?;

            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }
}
