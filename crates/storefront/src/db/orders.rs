//! Order repository for database operations.

use rust_decimal::Decimal;
use sqlx::PgPool;

use freshbites_core::{CheckoutId, Price, ProductId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::order::Order;

const ORDER_COLUMNS: &str = "id, checkout_id, product_id, product_title, product_price, \
                             customer_id, customer_name, quantity, total_amount, status, created_at";

/// One line to be written as an order row.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_title: String,
    pub product_price: Price,
    pub quantity: u32,
}

impl OrderLine {
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.product_price.amount() * Decimal::from(self.quantity)
    }
}

/// Outcome of claiming a checkout id before charging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutClaim {
    /// This call inserted the claim and may charge.
    Claimed,
    /// The same customer claimed this id earlier.
    AlreadyClaimed,
    /// Another customer owns this id.
    Taken,
}

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Orders already written for a checkout submission.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_checkout(
        &self,
        customer_id: UserId,
        checkout_id: CheckoutId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE customer_id = $1 AND checkout_id = $2
            ORDER BY created_at, id
            "
        ))
        .bind(customer_id)
        .bind(checkout_id)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// Reserve `checkout_id` for `customer_id`.
    ///
    /// Exactly one concurrent caller gets `CheckoutClaim::Claimed`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn claim_checkout(
        &self,
        customer_id: UserId,
        checkout_id: CheckoutId,
    ) -> Result<CheckoutClaim, RepositoryError> {
        let inserted: Option<(CheckoutId,)> = sqlx::query_as(
            r"
            INSERT INTO checkouts (id, customer_id)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            RETURNING id
            ",
        )
        .bind(checkout_id)
        .bind(customer_id)
        .fetch_optional(self.pool)
        .await?;

        if inserted.is_some() {
            return Ok(CheckoutClaim::Claimed);
        }

        let owner: Option<(UserId,)> =
            sqlx::query_as("SELECT customer_id FROM checkouts WHERE id = $1")
                .bind(checkout_id)
                .fetch_optional(self.pool)
                .await?;

        // A vanished row was released by a failed attempt; report it as ours
        // so the caller answers "in progress" and the client retries.
        Ok(match owner {
            Some((owner,)) if owner != customer_id => CheckoutClaim::Taken,
            _ => CheckoutClaim::AlreadyClaimed,
        })
    }

    /// Drop a claim that never produced orders, so the id can be retried.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn release_checkout(
        &self,
        customer_id: UserId,
        checkout_id: CheckoutId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            DELETE FROM checkouts c
            WHERE c.id = $1 AND c.customer_id = $2
              AND NOT EXISTS (
                  SELECT 1 FROM orders o
                  WHERE o.customer_id = c.customer_id AND o.checkout_id = c.id
              )
            ",
        )
        .bind(checkout_id)
        .bind(customer_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Write one `pending` order per line in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if this checkout was already written.
    /// Returns `RepositoryError::DataCorruption` if a quantity does not fit the column.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_for_checkout(
        &self,
        checkout_id: CheckoutId,
        customer_id: UserId,
        customer_name: &str,
        lines: &[OrderLine],
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut orders = Vec::with_capacity(lines.len());

        for line in lines {
            let quantity = i32::try_from(line.quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!("quantity out of range: {}", line.quantity))
            })?;

            let order: Order = sqlx::query_as(&format!(
                r"
                INSERT INTO orders
                    (checkout_id, product_id, product_title, product_price,
                     customer_id, customer_name, quantity, total_amount)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING {ORDER_COLUMNS}
                "
            ))
            .bind(checkout_id)
            .bind(line.product_id)
            .bind(&line.product_title)
            .bind(line.product_price)
            .bind(customer_id)
            .bind(customer_name)
            .bind(quantity)
            .bind(line.total())
            .fetch_one(&mut *tx)
            .await
            .map_err(conflict_on_unique("checkout already submitted"))?;

            orders.push(order);
        }

        tx.commit().await?;
        Ok(orders)
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// Orders for products created by `manager_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_manager(&self, manager_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as(
            r"
            SELECT o.id, o.checkout_id, o.product_id, o.product_title, o.product_price,
                   o.customer_id, o.customer_name, o.quantity, o.total_amount, o.status, o.created_at
            FROM orders o
            JOIN products p ON p.id = o.product_id
            WHERE p.created_by = $1
            ORDER BY o.created_at DESC, o.id
            ",
        )
        .bind(manager_id)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }
}
