//! Catalog product types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use freshbites_core::{Price, PriceError, ProductId, UserId};

/// Title used when a submitted title is blank after sanitizing.
pub const UNTITLED: &str = "Untitled";

/// A catalog product as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub title: String,
    pub description: String,
    pub price: Price,
    pub image: Option<String>,
    pub is_premium: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn category(&self) -> ProductCategory {
        ProductCategory::from_premium(self.is_premium)
    }
}

/// Which list a product belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductCategory {
    /// The regular menu.
    Products,
    /// The premium-only menu.
    PremiumItems,
}

impl ProductCategory {
    #[must_use]
    pub const fn from_premium(is_premium: bool) -> Self {
        if is_premium {
            Self::PremiumItems
        } else {
            Self::Products
        }
    }

    #[must_use]
    pub const fn is_premium(self) -> bool {
        matches!(self, Self::PremiumItems)
    }
}

/// Product as shown to the client: numeric price plus a display string.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: ProductId,
    pub sku: String,
    pub title: String,
    pub description: String,
    /// Display price, e.g. `৳ 150`.
    pub price: String,
    pub price_value: Decimal,
    pub image: Option<String>,
    pub is_premium: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl From<&Product> for ProductView {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            sku: p.sku.clone(),
            title: p.title.clone(),
            description: p.description.clone(),
            price: p.price.display(),
            price_value: p.price.amount(),
            image: p.image.clone(),
            is_premium: p.is_premium,
            created_by: p.created_by,
            created_at: p.created_at,
        }
    }
}

/// Manager-submitted product fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
}

/// Sanitized product fields ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub sku: String,
    pub title: String,
    pub description: String,
    pub price: Price,
    pub image: Option<String>,
}

impl ProductInput {
    /// Strip NUL bytes and surrounding whitespace, default a blank title to
    /// `Untitled`, and check the price.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::NotPositive` if the price is zero or negative.
    pub fn sanitize(self) -> Result<NewProduct, PriceError> {
        let price = Price::new(self.price)?;

        let title = sanitize_text(&self.title);
        let title = if title.is_empty() {
            UNTITLED.to_owned()
        } else {
            title
        };

        let sku = self
            .sku
            .map(|s| sanitize_text(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(generate_sku);

        let image = self
            .image
            .map(|s| sanitize_text(&s))
            .filter(|s| !s.is_empty());

        Ok(NewProduct {
            sku,
            title,
            description: sanitize_text(&self.description),
            price,
            image,
        })
    }
}

fn sanitize_text(s: &str) -> String {
    s.replace('\0', "").trim().to_owned()
}

fn generate_sku() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("fb-{}", id.get(..12).unwrap_or(&id))
}
