//! Seed the catalog from a JSON file.
//!
//! Accepts either the body of `GET /api/products/export` or a plain array of
//! products. Rows are upserted by id, so re-running a seed is harmless.

use std::path::Path;

use serde::Deserialize;

use freshbites_storefront::db::{ProductRepository, RepositoryError};
use freshbites_storefront::models::product::Product;
use freshbites_storefront::services::catalog::CatalogExport;

use super::{CommandError, connect};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid product file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedFile {
    Export(CatalogExport),
    Items(Vec<Product>),
}

fn parse_products(content: &str) -> Result<Vec<Product>, serde_json::Error> {
    Ok(match serde_json::from_str(content)? {
        SeedFile::Export(export) => export.into_items(),
        SeedFile::Items(items) => items,
    })
}

/// Upsert every product in `file_path`.
pub async fn products(file_path: &str) -> Result<u64, SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let products = parse_products(&content)?;
    tracing::info!(path = %file_path, count = products.len(), "Parsed products");

    let pool = connect().await?;
    let written = ProductRepository::new(&pool).upsert_many(&products).await?;

    tracing::info!(written, "Catalog seeded");
    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ITEM: &str = r#"{
        "id": "6b0c7f0e-8f57-4a57-9d1c-0c2b8f0b2a11",
        "sku": "kacchi-biryani",
        "title": "Kacchi Biryani",
        "description": "Mutton, aromatic rice",
        "price": "350.00",
        "image": null,
        "isPremium": false,
        "createdBy": null,
        "createdAt": "2026-01-01T00:00:00Z",
        "updatedAt": "2026-01-01T00:00:00Z"
    }"#;

    #[test]
    fn test_parse_plain_array() {
        let products = parse_products(&format!("[{ITEM}]")).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products.first().unwrap().sku, "kacchi-biryani");
    }

    #[test]
    fn test_parse_export() {
        let json = format!(
            r#"{{"products":[{ITEM}],"premiumItems":[],"exportedAt":"2026-01-02T00:00:00Z"}}"#
        );
        assert_eq!(parse_products(&json).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(parse_products(r#"{"items": []}"#).is_err());
    }
}
