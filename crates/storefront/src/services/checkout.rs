//! Checkout: turn a session cart into orders.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use freshbites_core::{Cart, CartTotals, CheckoutId, MAX_LINE_QUANTITY, OrderId, ProductId};

use crate::db::orders::{CheckoutClaim, OrderLine};
use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::models::notification::NotificationEvent;
use crate::models::order::Order;
use crate::models::product::Product;
use crate::models::session::CurrentUser;
use crate::services::notifications::NotificationService;
use crate::services::payment::{
    ChargeRequest, PaymentDetails, PaymentError, PaymentMethod, PaymentReceipt, Payments,
    sku_for_total,
};

/// A successful charge and the rows it pays for.
struct Charged {
    products: HashMap<ProductId, Product>,
    lines: Vec<OrderLine>,
    totals: CartTotals,
    receipt: PaymentReceipt,
}

/// Shown to the customer once an order is placed.
pub const ESTIMATED_DELIVERY: &str = "30-45 minutes";

/// Errors that can occur at checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("Empty Cart")]
    EmptyCart,

    /// A product in the cart has been removed from the catalog.
    #[error("{0} is no longer available")]
    ProductUnavailable(String),

    /// A premium product in the cart for a customer without premium access.
    #[error("{0} requires premium access")]
    PremiumRequired(String),

    /// A line holds more than a single order row may.
    #[error("Too many of {0} in one order")]
    QuantityTooLarge(String),

    /// The same checkout id is being charged by another request.
    #[error("Checkout is already being processed")]
    InProgress,

    /// The checkout id belongs to another customer.
    #[error("Checkout id already used")]
    CheckoutIdTaken,

    /// Payment failed or details are invalid.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What the customer gets back after checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub checkout_id: CheckoutId,
    pub order_ids: Vec<OrderId>,
    pub totals: CartTotals,
    /// Absent when an earlier submission of the same checkout is replayed.
    pub payment: Option<PaymentReceipt>,
    pub sandbox: bool,
    pub estimated_delivery: &'static str,
    /// True when these orders were created by an earlier submission.
    pub replayed: bool,
    pub placed_at: DateTime<Utc>,
}

/// Places orders for one customer.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    payments: &'a Payments,
    notifications: &'a NotificationService,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        payments: &'a Payments,
        notifications: &'a NotificationService,
    ) -> Self {
        Self {
            pool,
            payments,
            notifications,
        }
    }

    /// Charge for `cart` and write one order per line.
    ///
    /// The checkout id is claimed before anything is charged, so concurrent
    /// submissions of one id pay once. If orders for `checkout_id` already
    /// exist they are returned without a second charge. The caller clears the
    /// cart on success.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` for an empty cart,
    /// `CheckoutError::Payment` for invalid details or a failed charge,
    /// `CheckoutError::ProductUnavailable` if a product was deleted,
    /// `CheckoutError::PremiumRequired` for premium products without access,
    /// `CheckoutError::QuantityTooLarge` for an oversized line,
    /// `CheckoutError::InProgress` while another request holds the id,
    /// `CheckoutError::CheckoutIdTaken` if another customer owns the id, or
    /// `CheckoutError::Repository` if the orders cannot be written.
    #[instrument(skip(self, cart, payment), fields(user_id = %customer.id, checkout_id = %checkout_id, method = ?payment.method))]
    pub async fn place_order(
        &self,
        customer: &CurrentUser,
        cart: &Cart,
        payment: &PaymentDetails,
        checkout_id: CheckoutId,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let orders = OrderRepository::new(self.pool);

        match orders.claim_checkout(customer.id, checkout_id).await? {
            CheckoutClaim::Claimed => {}
            CheckoutClaim::AlreadyClaimed => {
                let existing = orders.find_by_checkout(customer.id, checkout_id).await?;
                if existing.is_empty() {
                    return Err(CheckoutError::InProgress);
                }
                tracing::info!("Replaying earlier checkout");
                return Ok(self.replay(checkout_id, customer, &existing));
            }
            CheckoutClaim::Taken => return Err(CheckoutError::CheckoutIdTaken),
        }

        let charged = match self.charge(customer, cart, payment, checkout_id).await {
            Ok(charged) => charged,
            Err(e) => {
                if let Err(release) = orders.release_checkout(customer.id, checkout_id).await {
                    tracing::error!(error = %release, "Failed to release checkout claim");
                }
                return Err(e);
            }
        };
        let Charged {
            products,
            lines,
            totals,
            receipt,
        } = charged;

        let placed = orders
            .create_for_checkout(checkout_id, customer.id, &customer.name, &lines)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    transaction_id = %receipt.transaction_id,
                    "Charged checkout could not be written"
                );
            })?;

        for order in &placed {
            let product = products.get(&order.product_id);
            let event = NotificationEvent::OrderPlaced {
                order: order.clone(),
                product_image: product.and_then(|p| p.image.clone()),
                product_owner: product.and_then(|p| p.created_by),
            };
            if let Err(e) = self.notifications.publish(event).await {
                tracing::warn!(error = %e, order_id = %order.id, "Failed to publish order notification");
            }
        }

        tracing::info!(
            orders = placed.len(),
            total = %totals.total,
            transaction_id = %receipt.transaction_id,
            "Checkout complete"
        );

        Ok(CheckoutReceipt {
            checkout_id,
            order_ids: placed.iter().map(|o| o.id).collect(),
            totals,
            sandbox: receipt.sandbox,
            payment: Some(receipt),
            estimated_delivery: ESTIMATED_DELIVERY,
            replayed: false,
            placed_at: Utc::now(),
        })
    }

    /// Validate the cart against the catalog, then charge for it.
    async fn charge(
        &self,
        customer: &CurrentUser,
        cart: &Cart,
        payment: &PaymentDetails,
        checkout_id: CheckoutId,
    ) -> Result<Charged, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        payment.validate()?;

        let products = self.current_products(cart).await?;
        let lines = order_lines(cart, &products, customer.is_premium)?;
        let subtotal: Decimal = lines.iter().map(OrderLine::total).sum();
        let item_count = lines.iter().fold(0u32, |acc, l| acc.saturating_add(l.quantity));
        let totals = CartTotals::compute(item_count, subtotal, customer.is_premium);

        let sku = match payment.method {
            PaymentMethod::Iap => sku_for_total(totals.total).to_owned(),
            _ => format!("checkout_{checkout_id}"),
        };
        let receipt = self
            .payments
            .charge(&ChargeRequest {
                user_id: customer.id,
                method: payment.method,
                amount: totals.total,
                sku,
            })
            .await?;

        Ok(Charged {
            products,
            lines,
            totals,
            receipt,
        })
    }

    /// Current catalog rows for every product in the cart.
    async fn current_products(
        &self,
        cart: &Cart,
    ) -> Result<HashMap<ProductId, Product>, CheckoutError> {
        let ids: Vec<ProductId> = cart.lines().iter().map(|l| l.product_id).collect();
        let products = ProductRepository::new(self.pool).get_many(&ids).await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }

    fn replay(
        &self,
        checkout_id: CheckoutId,
        customer: &CurrentUser,
        orders: &[Order],
    ) -> CheckoutReceipt {
        CheckoutReceipt {
            checkout_id,
            order_ids: orders.iter().map(|o| o.id).collect(),
            totals: totals_for_orders(orders, customer.is_premium),
            payment: None,
            sandbox: self.payments.is_sandbox(),
            estimated_delivery: ESTIMATED_DELIVERY,
            replayed: true,
            placed_at: orders.first().map_or_else(Utc::now, |o| o.created_at),
        }
    }
}

/// Order lines priced from the catalog. Titles in the cart snapshot are kept
/// only for the error message.
fn order_lines(
    cart: &Cart,
    products: &HashMap<ProductId, Product>,
    is_premium: bool,
) -> Result<Vec<OrderLine>, CheckoutError> {
    cart.lines()
        .iter()
        .map(|line| {
            let product = products
                .get(&line.product_id)
                .ok_or_else(|| CheckoutError::ProductUnavailable(line.title.clone()))?;
            if product.is_premium && !is_premium {
                return Err(CheckoutError::PremiumRequired(product.title.clone()));
            }
            if line.quantity > MAX_LINE_QUANTITY {
                return Err(CheckoutError::QuantityTooLarge(product.title.clone()));
            }
            Ok(OrderLine {
                product_id: product.id,
                product_title: product.title.clone(),
                product_price: product.price,
                quantity: line.quantity,
            })
        })
        .collect()
}

fn totals_for_orders(orders: &[Order], is_premium: bool) -> CartTotals {
    let subtotal: Decimal = orders.iter().map(|o| o.total_amount).sum();
    let item_count = orders.iter().fold(0u32, |acc, o| {
        acc.saturating_add(u32::try_from(o.quantity).unwrap_or(0))
    });
    CartTotals::compute(item_count, subtotal, is_premium)
}
