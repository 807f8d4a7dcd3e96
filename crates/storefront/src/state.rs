//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::catalog::Catalog;
use crate::services::notifications::NotificationService;
use crate::services::payment::Payments;
use crate::services::push::{PushClient, PushError};
use crate::services::realtime::RealtimeHub;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    hub: RealtimeHub,
    catalog: Catalog,
    notifications: NotificationService,
    payments: Payments,
}

impl AppState {
    /// Create a new application state with the payment providers chosen by
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the push client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, PushError> {
        let payments = Payments::from_config(&config.payment);
        Self::with_payments(config, pool, payments)
    }

    /// Create a new application state with explicit payment providers.
    ///
    /// # Errors
    ///
    /// Returns an error if the push client cannot be built.
    pub fn with_payments(
        config: StorefrontConfig,
        pool: PgPool,
        payments: Payments,
    ) -> Result<Self, PushError> {
        let hub = RealtimeHub::default();
        let push = PushClient::new(&config.push)?;
        let notifications = NotificationService::new(pool.clone(), hub.clone(), push);
        let catalog = Catalog::new(
            pool.clone(),
            hub.clone(),
            notifications.clone(),
            config.catalog_cache_capacity,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                hub,
                catalog,
                notifications,
                payments,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The in-process change feed.
    #[must_use]
    pub fn hub(&self) -> &RealtimeHub {
        &self.inner.hub
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationService {
        &self.inner.notifications
    }

    #[must_use]
    pub fn payments(&self) -> &Payments {
        &self.inner.payments
    }
}
