//! Payment providers.
//!
//! Checkout and the premium unlock charge through a [`PaymentProvider`].
//! Cash orders go to [`OfflineProvider`] and are settled on delivery. All
//! other methods go to the configured provider, which is the
//! [`SandboxProvider`] unless sandbox mode is switched off, in which case
//! [`UnavailableProvider`] rejects the charge.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use freshbites_core::UserId;

use crate::config::PaymentConfig;

/// Product ID of the premium unlock purchase.
pub const PREMIUM_SKU: &str = "premium_unlock";

/// Price of the premium unlock, in taka.
pub const PREMIUM_PRICE: Decimal = Decimal::from_parts(499, 0, 0, false, 0);

/// Minimum digits in a mobile-wallet phone number.
const MIN_PHONE_DIGITS: usize = 11;

/// Minimum digits in a card number.
const MIN_CARD_DIGITS: usize = 16;

/// Errors that can occur while charging.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Payment details are missing or malformed.
    #[error("{0}")]
    InvalidDetails(String),

    /// The provider declined the charge.
    #[error("payment declined: {0}")]
    Declined(String),

    /// No provider can take this payment method right now.
    #[error("payment provider unavailable")]
    Unavailable,
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Bkash,
    Nagad,
    Card,
    /// In-app purchase.
    Iap,
}

impl PaymentMethod {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cash => "Cash on Delivery",
            Self::Bkash => "bKash",
            Self::Nagad => "Nagad",
            Self::Card => "Card",
            Self::Iap => "In-App Purchase",
        }
    }
}

/// Method plus whatever details it needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub card_number: Option<String>,
}

impl PaymentDetails {
    /// Check that the details required by the method are present.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidDetails` describing what is missing.
    pub fn validate(&self) -> Result<(), PaymentError> {
        match self.method {
            PaymentMethod::Bkash | PaymentMethod::Nagad => {
                if digit_count(self.phone.as_deref()) < MIN_PHONE_DIGITS {
                    return Err(PaymentError::InvalidDetails(format!(
                        "Please enter a valid {} number",
                        self.method.label()
                    )));
                }
            }
            PaymentMethod::Card => {
                if digit_count(self.card_number.as_deref()) < MIN_CARD_DIGITS {
                    return Err(PaymentError::InvalidDetails(
                        "Please enter a valid card number".to_owned(),
                    ));
                }
            }
            PaymentMethod::Cash | PaymentMethod::Iap => {}
        }
        Ok(())
    }

    /// Last four digits of the card, if any.
    #[must_use]
    pub fn card_last4(&self) -> Option<String> {
        let digits: Vec<char> = self
            .card_number
            .as_deref()?
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        let start = digits.len().checked_sub(4)?;
        digits.get(start..).map(|d| d.iter().collect())
    }
}

fn digit_count(s: Option<&str>) -> usize {
    s.map_or(0, |s| s.chars().filter(char::is_ascii_digit).count())
}

/// In-app purchase product for a cart total.
#[must_use]
pub fn sku_for_total(total: Decimal) -> &'static str {
    if total <= Decimal::from(200) {
        "cart_food_small"
    } else if total <= Decimal::from(500) {
        "cart_food_medium"
    } else if total <= Decimal::from(1000) {
        "cart_food_large"
    } else {
        "cart_food_xlarge"
    }
}

/// A charge to be made.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub user_id: UserId,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub sku: String,
}

/// Settlement state of a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    DueOnDelivery,
}

/// Result of a successful charge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub provider: &'static str,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub sku: String,
    pub status: PaymentStatus,
    pub sandbox: bool,
    pub processed_at: DateTime<Utc>,
}

/// Something that can take money.
#[async_trait]
pub trait PaymentProvider: Send + Sync + 'static {
    /// Provider name recorded on receipts.
    fn name(&self) -> &'static str;

    /// Whether charges are simulated.
    fn is_sandbox(&self) -> bool;

    /// Charge the customer.
    async fn charge(&self, request: &ChargeRequest) -> Result<PaymentReceipt, PaymentError>;
}

/// Simulated provider: waits a random delay in the configured range, then succeeds.
#[derive(Debug, Clone)]
pub struct SandboxProvider {
    min_delay: Duration,
    max_delay: Duration,
}

impl SandboxProvider {
    #[must_use]
    pub const fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
        }
    }

    fn pick_delay(&self) -> Duration {
        let min = u64::try_from(self.min_delay.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        if min >= max {
            return self.min_delay;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

#[async_trait]
impl PaymentProvider for SandboxProvider {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    fn is_sandbox(&self) -> bool {
        true
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id, sku = %request.sku))]
    async fn charge(&self, request: &ChargeRequest) -> Result<PaymentReceipt, PaymentError> {
        let delay = self.pick_delay();
        tokio::time::sleep(delay).await;

        tracing::info!(amount = %request.amount, ?delay, "Sandbox charge approved");

        Ok(PaymentReceipt {
            transaction_id: format!("sandbox_{}", uuid::Uuid::new_v4().simple()),
            provider: self.name(),
            method: request.method,
            amount: request.amount,
            sku: request.sku.clone(),
            status: PaymentStatus::Paid,
            sandbox: true,
            processed_at: Utc::now(),
        })
    }
}

/// Cash on delivery: nothing is charged now.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineProvider;

#[async_trait]
impl PaymentProvider for OfflineProvider {
    fn name(&self) -> &'static str {
        "cash"
    }

    fn is_sandbox(&self) -> bool {
        false
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<PaymentReceipt, PaymentError> {
        if request.method != PaymentMethod::Cash {
            return Err(PaymentError::Unavailable);
        }

        Ok(PaymentReceipt {
            transaction_id: format!("cod_{}", uuid::Uuid::new_v4().simple()),
            provider: self.name(),
            method: request.method,
            amount: request.amount,
            sku: request.sku.clone(),
            status: PaymentStatus::DueOnDelivery,
            sandbox: false,
            processed_at: Utc::now(),
        })
    }
}

/// Used when sandbox mode is off and no real gateway is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProvider;

#[async_trait]
impl PaymentProvider for UnavailableProvider {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_sandbox(&self) -> bool {
        false
    }

    async fn charge(&self, _request: &ChargeRequest) -> Result<PaymentReceipt, PaymentError> {
        Err(PaymentError::Unavailable)
    }
}

/// Routes charges to the offline or online provider by method.
#[derive(Clone)]
pub struct Payments {
    online: Arc<dyn PaymentProvider>,
    offline: Arc<dyn PaymentProvider>,
}

impl std::fmt::Debug for Payments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payments")
            .field("online", &self.online.name())
            .field("offline", &self.offline.name())
            .finish()
    }
}

impl Payments {
    #[must_use]
    pub fn new(online: Arc<dyn PaymentProvider>, offline: Arc<dyn PaymentProvider>) -> Self {
        Self { online, offline }
    }

    /// Providers selected by configuration.
    #[must_use]
    pub fn from_config(config: &PaymentConfig) -> Self {
        let online: Arc<dyn PaymentProvider> = if config.sandbox {
            Arc::new(SandboxProvider::new(config.min_delay, config.max_delay))
        } else {
            Arc::new(UnavailableProvider)
        };
        Self::new(online, Arc::new(OfflineProvider))
    }

    /// Whether online charges are simulated.
    #[must_use]
    pub fn is_sandbox(&self) -> bool {
        self.online.is_sandbox()
    }

    /// Charge through the provider for `request.method`.
    ///
    /// # Errors
    ///
    /// Returns whatever the selected provider returns.
    pub async fn charge(&self, request: &ChargeRequest) -> Result<PaymentReceipt, PaymentError> {
        match request.method {
            PaymentMethod::Cash => self.offline.charge(request).await,
            _ => self.online.charge(request).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn details(method: PaymentMethod, phone: Option<&str>, card: Option<&str>) -> PaymentDetails {
        PaymentDetails {
            method,
            phone: phone.map(str::to_owned),
            card_number: card.map(str::to_owned),
        }
    }

    fn request(method: PaymentMethod) -> ChargeRequest {
        ChargeRequest {
            user_id: UserId::random(),
            method,
            amount: Decimal::from(320),
            sku: sku_for_total(Decimal::from(320)).to_owned(),
        }
    }

    #[test]
    fn test_sku_tiers() {
        assert_eq!(sku_for_total(Decimal::from(200)), "cart_food_small");
        assert_eq!(sku_for_total(Decimal::new(20001, 2)), "cart_food_medium");
        assert_eq!(sku_for_total(Decimal::from(500)), "cart_food_medium");
        assert_eq!(sku_for_total(Decimal::from(1000)), "cart_food_large");
        assert_eq!(sku_for_total(Decimal::from(1001)), "cart_food_xlarge");
    }

    #[test]
    fn test_wallets_need_phone() {
        assert!(details(PaymentMethod::Bkash, None, None).validate().is_err());
        assert!(
            details(PaymentMethod::Nagad, Some("0171-234"), None)
                .validate()
                .is_err()
        );
        assert!(
            details(PaymentMethod::Bkash, Some("01712-345678"), None)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_card_needs_sixteen_digits() {
        assert!(
            details(PaymentMethod::Card, None, Some("4242 4242 4242"))
                .validate()
                .is_err()
        );
        let card = details(PaymentMethod::Card, None, Some("4242 4242 4242 4242"));
        assert!(card.validate().is_ok());
        assert_eq!(card.card_last4().as_deref(), Some("4242"));
    }

    #[test]
    fn test_cash_and_iap_need_nothing() {
        assert!(details(PaymentMethod::Cash, None, None).validate().is_ok());
        assert!(details(PaymentMethod::Iap, None, None).validate().is_ok());
    }

    #[test]
    fn test_sandbox_delay_stays_in_range() {
        let provider = SandboxProvider::new(Duration::from_millis(600), Duration::from_millis(2000));
        for _ in 0..100 {
            let delay = provider.pick_delay();
            assert!(delay >= Duration::from_millis(600));
            assert!(delay <= Duration::from_millis(2000));
        }
    }

    #[tokio::test]
    async fn test_sandbox_waits_then_succeeds() {
        let provider = SandboxProvider::new(Duration::from_millis(5), Duration::from_millis(20));
        let started = std::time::Instant::now();

        let receipt = provider.charge(&request(PaymentMethod::Card)).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(5));
        assert!(receipt.sandbox);
        assert_eq!(receipt.status, PaymentStatus::Paid);
        assert!(receipt.transaction_id.starts_with("sandbox_"));
    }

    #[tokio::test]
    async fn test_cash_routes_to_offline_provider() {
        let payments = Payments::from_config(&PaymentConfig {
            sandbox: false,
            ..PaymentConfig::default()
        });

        let receipt = payments.charge(&request(PaymentMethod::Cash)).await.unwrap();
        assert_eq!(receipt.status, PaymentStatus::DueOnDelivery);
        assert_eq!(receipt.provider, "cash");

        assert!(matches!(
            payments.charge(&request(PaymentMethod::Bkash)).await,
            Err(PaymentError::Unavailable)
        ));
        assert!(!payments.is_sandbox());
    }
}
