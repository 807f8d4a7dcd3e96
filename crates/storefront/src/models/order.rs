//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use freshbites_core::{CheckoutId, OrderId, OrderStatus, ProductId, UserId};

/// One ordered product line. A checkout creates one order per cart line.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub checkout_id: CheckoutId,
    pub product_id: ProductId,
    pub product_title: String,
    pub product_price: Decimal,
    pub customer_id: UserId,
    pub customer_name: String,
    pub quantity: i32,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}
