//! Shopping cart model and checkout totals.
//!
//! The cart lives in the customer's session as plain serializable data. All
//! money math is done in [`Decimal`] and rounded to two places.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId};

/// Flat delivery fee charged on every non-empty order, in taka.
pub const DELIVERY_FEE: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Share of the subtotal taken off for premium customers (10%).
pub const PREMIUM_DISCOUNT_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Largest quantity a single cart line can hold.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// A product snapshot plus the quantity in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub sku: String,
    pub title: String,
    pub image: Option<String>,
    pub price: Price,
    pub is_premium: bool,
    pub quantity: u32,
}

impl CartLine {
    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.amount() * Decimal::from(self.quantity)
    }
}

/// Computed totals for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub item_count: u32,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// The customer's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Current lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add a product. If it is already in the cart the quantities are merged
    /// and the snapshot (title, price, image) is refreshed.
    ///
    /// A line with quantity 0 is ignored. The merged quantity is capped at
    /// [`MAX_LINE_QUANTITY`].
    pub fn add(&mut self, line: CartLine) {
        if line.quantity == 0 {
            return;
        }
        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            let quantity = existing
                .quantity
                .saturating_add(line.quantity)
                .min(MAX_LINE_QUANTITY);
            *existing = CartLine { quantity, ..line };
        } else {
            let quantity = line.quantity.min(MAX_LINE_QUANTITY);
            self.lines.push(CartLine { quantity, ..line });
        }
    }

    /// Set the quantity of a line. Zero or negative removes it; anything above
    /// [`MAX_LINE_QUANTITY`] is capped.
    ///
    /// Returns `false` if the product was not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i64) -> bool {
        let Some(index) = self.lines.iter().position(|l| l.product_id == product_id) else {
            return false;
        };
        if quantity <= 0 {
            self.lines.remove(index);
        } else if let Some(line) = self.lines.get_mut(index) {
            line.quantity = u32::try_from(quantity)
                .unwrap_or(MAX_LINE_QUANTITY)
                .min(MAX_LINE_QUANTITY);
        }
        true
    }

    /// Remove a line. Returns `false` if it was not present.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.quantity))
    }

    /// Sum of `price × quantity`, rounded to two places.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines
            .iter()
            .map(CartLine::line_total)
            .sum::<Decimal>()
            .round_dp(2)
    }

    /// Checkout totals.
    ///
    /// `total = subtotal + delivery_fee - discount`, where the delivery fee is
    /// charged only when the cart has items and the discount applies only to
    /// premium customers.
    #[must_use]
    pub fn totals(&self, is_premium: bool) -> CartTotals {
        CartTotals::compute(self.total_items(), self.subtotal(), is_premium)
    }
}

impl CartTotals {
    /// Totals for `item_count` items worth `subtotal`.
    #[must_use]
    pub fn compute(item_count: u32, subtotal: Decimal, is_premium: bool) -> Self {
        let subtotal = subtotal.round_dp(2);
        let delivery_fee = if item_count == 0 {
            Decimal::ZERO
        } else {
            DELIVERY_FEE
        };
        let discount = if is_premium {
            (subtotal * PREMIUM_DISCOUNT_RATE).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Self {
            item_count,
            subtotal,
            delivery_fee,
            discount,
            total: (subtotal + delivery_fee - discount).round_dp(2),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::random(),
            sku: format!("sku-{price}"),
            title: "Chicken Tikka".to_owned(),
            image: None,
            price: Price::new(Decimal::from(price)).unwrap(),
            is_premium: false,
            quantity,
        }
    }

    #[test]
    fn test_constants() {
        assert_eq!(DELIVERY_FEE, Decimal::from(50));
        assert_eq!(PREMIUM_DISCOUNT_RATE, Decimal::new(1, 1));
    }

    #[test]
    fn test_single_item_premium_totals() {
        let mut cart = Cart::new();
        cart.add(line(150, 2));

        let totals = cart.totals(true);
        assert_eq!(totals.subtotal, Decimal::from(300));
        assert_eq!(totals.discount, Decimal::from(30));
        assert_eq!(totals.delivery_fee, Decimal::from(50));
        assert_eq!(totals.total, Decimal::from(320));
        assert_eq!(totals.item_count, 2);

        let regular = cart.totals(false);
        assert_eq!(regular.discount, Decimal::ZERO);
        assert_eq!(regular.total, Decimal::from(350));
    }

    #[test]
    fn test_empty_cart_has_no_delivery_fee() {
        let totals = Cart::new().totals(true);
        assert_eq!(totals.total, Decimal::ZERO);
        assert_eq!(totals.delivery_fee, Decimal::ZERO);
    }

    #[test]
    fn test_add_merges_same_product() {
        let mut cart = Cart::new();
        let first = line(120, 1);
        let id = first.product_id;
        cart.add(first.clone());
        cart.add(CartLine {
            quantity: 3,
            ..first
        });

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.total_items(), 4);
        assert!(cart.set_quantity(id, 2));
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn test_non_positive_quantity_removes_line() {
        let mut cart = Cart::new();
        let l = line(80, 2);
        let id = l.product_id;
        cart.add(l);

        assert!(cart.set_quantity(id, -3));
        assert!(cart.is_empty());
        assert!(!cart.set_quantity(id, 1));
    }

    #[test]
    fn test_quantity_is_capped() {
        let mut cart = Cart::new();
        let first = line(120, u32::MAX);
        let id = first.product_id;
        cart.add(first.clone());
        assert_eq!(cart.lines().first().unwrap().quantity, MAX_LINE_QUANTITY);

        cart.add(CartLine { quantity: 5, ..first });
        assert_eq!(cart.total_items(), MAX_LINE_QUANTITY);

        assert!(cart.set_quantity(id, i64::MAX));
        assert_eq!(cart.total_items(), MAX_LINE_QUANTITY);

        assert!(cart.set_quantity(id, 3));
        assert_eq!(cart.total_items(), 3);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        let a = line(100, 1);
        let a_id = a.product_id;
        cart.add(a);
        cart.add(line(200, 1));

        assert!(cart.remove(a_id));
        assert!(!cart.remove(a_id));
        assert_eq!(cart.subtotal(), Decimal::from(200));

        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_fractional_prices_round_to_two_places() {
        let mut cart = Cart::new();
        cart.add(CartLine {
            price: Price::new(Decimal::new(3333, 2)).unwrap(),
            ..line(1, 3)
        });
        let totals = cart.totals(true);
        assert_eq!(totals.subtotal, Decimal::new(9999, 2));
        assert_eq!(totals.discount, Decimal::new(1000, 2));
        assert_eq!(totals.total, Decimal::new(13999, 2));
    }
}
