//! Product catalog with a local mirror.
//!
//! Reads go to the database and refresh the mirror; when the database is
//! unreachable the last mirrored list is served instead. Writes go straight
//! to the database, refresh both menus and emit a [`DataAction`] to every
//! subscriber.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::instrument;

use freshbites_core::{PriceError, ProductId, UserId};

use crate::db::{ProductRepository, RepositoryError};
use crate::models::notification::NotificationEvent;
use crate::models::product::{Product, ProductCategory, ProductInput, ProductView};
use crate::services::notifications::NotificationService;
use crate::services::realtime::{ChangeFilter, Delivery, RealtimeHub, Table};

/// Buffered actions per subscriber.
const ACTION_CHANNEL_CAPACITY: usize = 64;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Submitted product is invalid.
    #[error("invalid product: {0}")]
    InvalidProduct(#[from] PriceError),

    /// Product does not exist.
    #[error("product not found")]
    NotFound,
}

/// What changed in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataActionKind {
    Add,
    Update,
    Delete,
}

/// A catalog change announced to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAction {
    #[serde(rename = "type")]
    pub kind: DataActionKind,
    pub category: Option<ProductCategory>,
    pub item: Option<ProductView>,
    pub item_id: Option<ProductId>,
    pub timestamp: DateTime<Utc>,
}

impl DataAction {
    fn new(kind: DataActionKind, category: Option<ProductCategory>) -> Self {
        Self {
            kind,
            category,
            item: None,
            item_id: None,
            timestamp: Utc::now(),
        }
    }

    fn with_item(mut self, product: &Product) -> Self {
        self.item = Some(ProductView::from(product));
        self.item_id = Some(product.id);
        self
    }
}

/// Both menus, in the shape `fb-cli seed products` reads back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogExport {
    pub products: Vec<Product>,
    pub premium_items: Vec<Product>,
    pub exported_at: DateTime<Utc>,
}

impl CatalogExport {
    /// Every product in the export.
    #[must_use]
    pub fn into_items(self) -> Vec<Product> {
        let mut items = self.products;
        items.extend(self.premium_items);
        items
    }
}

/// The catalog service.
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    pool: PgPool,
    mirror: Cache<ProductCategory, Arc<Vec<Product>>>,
    actions: broadcast::Sender<DataAction>,
    hub: RealtimeHub,
    notifications: NotificationService,
}

impl Catalog {
    /// Create a catalog. `mirror_capacity` bounds the number of mirrored lists.
    #[must_use]
    pub fn new(
        pool: PgPool,
        hub: RealtimeHub,
        notifications: NotificationService,
        mirror_capacity: u64,
    ) -> Self {
        let mirror = Cache::builder().max_capacity(mirror_capacity).build();
        let (actions, _) = broadcast::channel(ACTION_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(CatalogInner {
                pool,
                mirror,
                actions,
                hub,
                notifications,
            }),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The regular menu.
    pub async fn get_products(&self) -> Arc<Vec<Product>> {
        self.load(ProductCategory::Products).await.0
    }

    /// The premium menu.
    pub async fn get_premium_items(&self) -> Arc<Vec<Product>> {
        self.load(ProductCategory::PremiumItems).await.0
    }

    /// One product by ID.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn get_item(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        Ok(ProductRepository::new(&self.inner.pool).get(id).await?)
    }

    /// Fetch a menu and mirror it. Falls back to the mirror (or an empty
    /// list) when the fetch fails. The flag reports whether the mirrored
    /// list changed.
    async fn load(&self, category: ProductCategory) -> (Arc<Vec<Product>>, bool) {
        match ProductRepository::new(&self.inner.pool)
            .list(category.is_premium())
            .await
        {
            Ok(products) => {
                let previous = self.inner.mirror.get(&category).await;
                let changed = previous.as_deref() != Some(&products);
                let products = Arc::new(products);
                self.inner
                    .mirror
                    .insert(category, Arc::clone(&products))
                    .await;
                (products, changed)
            }
            Err(e) => {
                tracing::warn!(error = %e, ?category, "Catalog fetch failed, serving mirror");
                (
                    self.inner.mirror.get(&category).await.unwrap_or_default(),
                    false,
                )
            }
        }
    }

    /// Re-fetch both menus. Returns whether either changed.
    pub async fn refresh(&self) -> bool {
        let (_, products_changed) = self.load(ProductCategory::Products).await;
        let (_, premium_changed) = self.load(ProductCategory::PremiumItems).await;
        products_changed || premium_changed
    }

    /// Drop the mirror, then refresh.
    pub async fn clear_local(&self) {
        self.inner.mirror.invalidate_all();
        self.refresh().await;
    }

    /// Both menus as currently stored.
    pub async fn export(&self) -> CatalogExport {
        CatalogExport {
            products: self.get_products().await.as_ref().clone(),
            premium_items: self.get_premium_items().await.as_ref().clone(),
            exported_at: Utc::now(),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Add a product and tell everyone but `actor`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidProduct` for a non-positive price, or
    /// `CatalogError::Repository` if the insert fails.
    #[instrument(skip(self, input), fields(actor = %actor, premium))]
    pub async fn add_item(
        &self,
        input: ProductInput,
        premium: bool,
        actor: UserId,
    ) -> Result<Product, CatalogError> {
        let new_product = input.sanitize()?;
        let product = ProductRepository::new(&self.inner.pool)
            .create(&new_product, premium, actor)
            .await?;

        self.refresh().await;
        self.emit(
            DataAction::new(DataActionKind::Add, Some(product.category())).with_item(&product),
        );
        self.notify(NotificationEvent::ProductAdded {
            product: product.clone(),
            actor,
        })
        .await;

        tracing::info!(product_id = %product.id, "Product added");
        Ok(product)
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist,
    /// `CatalogError::InvalidProduct` for a non-positive price, or
    /// `CatalogError::Repository` if the update fails.
    #[instrument(skip(self, input), fields(product_id = %id, premium))]
    pub async fn update_item(
        &self,
        id: ProductId,
        input: ProductInput,
        premium: bool,
    ) -> Result<Product, CatalogError> {
        let new_product = input.sanitize()?;
        let product = ProductRepository::new(&self.inner.pool)
            .update(id, &new_product, premium)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CatalogError::NotFound,
                other => CatalogError::Repository(other),
            })?;

        self.refresh().await;
        self.emit(
            DataAction::new(DataActionKind::Update, Some(product.category())).with_item(&product),
        );

        Ok(product)
    }

    /// Delete a product and tell everyone but `actor`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist, or
    /// `CatalogError::Repository` if the delete fails.
    #[instrument(skip(self), fields(product_id = %id, actor = %actor))]
    pub async fn delete_item(&self, id: ProductId, actor: UserId) -> Result<Product, CatalogError> {
        let product = ProductRepository::new(&self.inner.pool)
            .delete(id)
            .await?
            .ok_or(CatalogError::NotFound)?;

        self.refresh().await;
        self.emit(
            DataAction::new(DataActionKind::Delete, Some(product.category())).with_item(&product),
        );
        self.notify(NotificationEvent::ProductRemoved {
            product: product.clone(),
            actor,
        })
        .await;

        tracing::info!("Product deleted");
        Ok(product)
    }

    /// Bulk upsert by ID, then refresh. Returns rows written.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the upsert fails.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn import(&self, items: &[Product]) -> Result<u64, CatalogError> {
        let written = ProductRepository::new(&self.inner.pool)
            .upsert_many(items)
            .await?;

        self.refresh().await;
        self.emit(DataAction::new(DataActionKind::Update, None));

        Ok(written)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Receive every future catalog action.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DataAction> {
        self.inner.actions.subscribe()
    }

    fn emit(&self, action: DataAction) {
        // Err only means nobody is subscribed
        let _ = self.inner.actions.send(action);
    }

    async fn notify(&self, event: NotificationEvent) {
        if let Err(e) = self.inner.notifications.publish(event).await {
            tracing::warn!(error = %e, "Failed to publish catalog notification");
        }
    }

    /// Keep the mirror in sync with product changes from any writer.
    ///
    /// When a change arrives (or the listener lagged), both menus are
    /// re-fetched and an `update` action is emitted if the mirror changed.
    pub fn spawn_realtime_listener(&self) -> JoinHandle<()> {
        let catalog = self.clone();
        let mut changes = Box::pin(
            self.inner
                .hub
                .subscribe(ChangeFilter::table(Table::Products)),
        );

        tokio::spawn(async move {
            while let Some(delivery) = changes.next().await {
                if let Delivery::Change(change) = &delivery {
                    tracing::debug!(kind = ?change.kind, "Product change received");
                }
                if catalog.refresh().await {
                    catalog.emit(DataAction::new(DataActionKind::Update, None));
                }
            }
            tracing::debug!("Catalog realtime listener stopped");
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use freshbites_core::Price;

    use super::*;

    fn product(premium: bool) -> Product {
        Product {
            id: ProductId::random(),
            sku: "fb-shorshe-ilish".to_owned(),
            title: "Shorshe Ilish".to_owned(),
            description: String::new(),
            price: Price::new(Decimal::from(480)).unwrap(),
            image: None,
            is_premium: premium,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_action_wire_shape() {
        let p = product(true);
        let action = DataAction::new(DataActionKind::Delete, Some(p.category())).with_item(&p);
        let json = serde_json::to_value(&action).unwrap();

        assert_eq!(json["type"], "delete");
        assert_eq!(json["category"], "premiumItems");
        assert_eq!(json["itemId"], p.id.to_string());
        assert_eq!(json["item"]["price"], "৳ 480");
    }

    #[test]
    fn test_export_round_trips_into_items() {
        let export = CatalogExport {
            products: vec![product(false)],
            premium_items: vec![product(true), product(true)],
            exported_at: Utc::now(),
        };
        let json = serde_json::to_string(&export).unwrap();
        let parsed: CatalogExport = serde_json::from_str(&json).unwrap();

        let items = parsed.into_items();
        assert_eq!(items.len(), 3);
        assert_eq!(items.iter().filter(|p| p.is_premium).count(), 2);
    }
}
