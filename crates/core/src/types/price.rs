//! Taka prices using decimal arithmetic.
//!
//! Products are priced in whole or fractional taka. The API carries both the
//! numeric value and a display string such as `৳ 150`.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currency symbol prefixed to displayed prices.
pub const CURRENCY_SYMBOL: &str = "৳";

/// Errors that can occur when building a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is zero or negative.
    #[error("price must be greater than zero")]
    NotPositive,
    /// The input could not be read as a number.
    #[error("invalid price: {0}")]
    Invalid(String),
}

/// A positive amount in taka.
///
/// ```
/// use freshbites_core::Price;
/// use rust_decimal::Decimal;
///
/// let price = Price::new(Decimal::from(150)).unwrap();
/// assert_eq!(price.display(), "৳ 150");
/// assert!(Price::new(Decimal::ZERO).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Create a price, rejecting zero and negative amounts.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::NotPositive`] if `amount <= 0`.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount <= Decimal::ZERO {
            return Err(PriceError::NotPositive);
        }
        Ok(Self(amount.normalize()))
    }

    /// Parse a price from user input.
    ///
    /// Accepts plain numbers (`"150"`, `"99.50"`) and the display form
    /// (`"৳ 150"`).
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Invalid`] if the text is not a number, or
    /// [`PriceError::NotPositive`] if it is not above zero.
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let digits = s.trim().trim_start_matches(CURRENCY_SYMBOL).trim();
        let amount: Decimal = digits
            .parse()
            .map_err(|_| PriceError::Invalid(s.to_owned()))?;
        Self::new(amount)
    }

    /// The numeric amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Format for display, e.g. `৳ 150` or `৳ 99.5`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{CURRENCY_SYMBOL} {}", self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CURRENCY_SYMBOL} {}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_drops_trailing_zeros() {
        let price = Price::new(Decimal::new(15000, 2)).unwrap();
        assert_eq!(price.display(), "৳ 150");
        assert_eq!(price.to_string(), "৳ 150");

        let price = Price::new(Decimal::new(9950, 2)).unwrap();
        assert_eq!(price.display(), "৳ 99.5");
    }

    #[test]
    fn test_rejects_non_positive() {
        assert_eq!(Price::new(Decimal::ZERO), Err(PriceError::NotPositive));
        assert_eq!(Price::new(Decimal::from(-5)), Err(PriceError::NotPositive));
    }

    #[test]
    fn test_parse_accepts_display_form() {
        assert_eq!(Price::parse("৳ 250").unwrap().amount(), Decimal::from(250));
        assert_eq!(Price::parse(" 120.75 ").unwrap().amount(), Decimal::new(12075, 2));
        assert!(matches!(Price::parse("free"), Err(PriceError::Invalid(_))));
    }

    #[test]
    fn test_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Price>("\"0\"").is_err());
        assert_eq!(
            serde_json::from_str::<Price>("\"180\"").unwrap().amount(),
            Decimal::from(180)
        );
    }
}
