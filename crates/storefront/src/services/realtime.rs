//! In-process change feed.
//!
//! Services call [`RealtimeHub::publish`] or [`RealtimeHub::publish_rows`]
//! after a successful write. Product rows changed by any writer (including
//! `fb-cli seed`) also arrive through [`spawn_pg_bridge`], which relays the
//! `products_changed` Postgres channel.
//!
//! The channel carries one [`ChangeBatch`] per write, however many rows it
//! touched, so a fan-out to thousands of recipients uses one slot. Subscribers
//! get a filtered stream of single row changes. A subscriber that falls more
//! than the channel capacity behind receives [`Delivery::Lagged`] and should
//! re-fetch.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use freshbites_core::UserId;

/// Default number of buffered writes per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Table a change happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Products,
    Notifications,
}

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// Owner of the row, for per-user filtering.
    pub user_id: Option<UserId>,
    pub record: serde_json::Value,
}

/// One row of a [`ChangeBatch`].
#[derive(Debug, Clone)]
pub struct ChangeRow {
    pub user_id: Option<UserId>,
    pub record: serde_json::Value,
}

/// Every row changed by one write. This is what travels on the channel.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    pub table: Table,
    pub kind: ChangeKind,
    pub rows: Arc<[ChangeRow]>,
}

impl From<ChangeEvent> for ChangeBatch {
    fn from(event: ChangeEvent) -> Self {
        Self {
            table: event.table,
            kind: event.kind,
            rows: Arc::from([ChangeRow {
                user_id: event.user_id,
                record: event.record,
            }]),
        }
    }
}

/// Which changes a subscriber wants.
#[derive(Debug, Clone, Copy)]
pub struct ChangeFilter {
    pub table: Table,
    pub kind: Option<ChangeKind>,
    pub user_id: Option<UserId>,
}

impl ChangeFilter {
    /// Every change to `table`.
    #[must_use]
    pub const fn table(table: Table) -> Self {
        Self {
            table,
            kind: None,
            user_id: None,
        }
    }

    /// Only changes of `kind`.
    #[must_use]
    pub const fn kind(mut self, kind: ChangeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Only rows owned by `user_id`.
    #[must_use]
    pub const fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.accepts(event.table, event.kind) && self.accepts_owner(event.user_id)
    }

    fn accepts(&self, table: Table, kind: ChangeKind) -> bool {
        table == self.table && self.kind.is_none_or(|k| k == kind)
    }

    fn accepts_owner(&self, user_id: Option<UserId>) -> bool {
        self.user_id.is_none_or(|u| user_id == Some(u))
    }

    /// The rows of `batch` this subscriber should see, as single changes.
    fn select(&self, batch: &ChangeBatch) -> Vec<ChangeEvent> {
        if !self.accepts(batch.table, batch.kind) {
            return Vec::new();
        }
        batch
            .rows
            .iter()
            .filter(|row| self.accepts_owner(row.user_id))
            .map(|row| ChangeEvent {
                table: batch.table,
                kind: batch.kind,
                user_id: row.user_id,
                record: row.record.clone(),
            })
            .collect()
    }
}

/// What a filtered subscription yields.
#[derive(Debug, Clone)]
pub enum Delivery {
    Change(ChangeEvent),
    /// The subscriber missed this many events.
    Lagged(u64),
}

/// Broadcast hub for row changes.
#[derive(Debug, Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<ChangeBatch>,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RealtimeHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a single row change. Returns how many subscribers received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.send(ChangeBatch::from(event))
    }

    /// Publish every row written by one operation as a single channel entry.
    pub fn publish_rows(&self, table: Table, kind: ChangeKind, rows: Vec<ChangeRow>) -> usize {
        if rows.is_empty() {
            return 0;
        }
        self.send(ChangeBatch {
            table,
            kind,
            rows: Arc::from(rows),
        })
    }

    fn send(&self, batch: ChangeBatch) -> usize {
        // Err only means nobody is listening
        self.tx.send(batch).unwrap_or(0)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Stream of changes matching `filter`. Ends when the hub is dropped.
    pub fn subscribe(&self, filter: ChangeFilter) -> impl Stream<Item = Delivery> + Send + use<> {
        let mut rx = self.tx.subscribe();

        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(batch) => {
                        for event in filter.select(&batch) {
                            yield Delivery::Change(event);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Realtime subscriber lagged");
                        yield Delivery::Lagged(missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Postgres channel the products trigger notifies on.
pub const PRODUCTS_CHANNEL: &str = "products_changed";

/// Pause before listening again after the listener fails.
const BRIDGE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Payload sent by the products trigger.
#[derive(Debug, Deserialize)]
struct ProductNotification {
    op: ChangeKind,
    #[serde(flatten)]
    record: serde_json::Value,
}

fn parse_product_notification(payload: &str) -> Option<ChangeEvent> {
    match serde_json::from_str::<ProductNotification>(payload) {
        Ok(n) => Some(ChangeEvent {
            table: Table::Products,
            kind: n.op,
            user_id: None,
            record: n.record,
        }),
        Err(e) => {
            tracing::warn!(error = %e, payload, "Ignoring malformed product notification");
            None
        }
    }
}

/// Relay `products_changed` notifications from Postgres into `hub`.
///
/// Runs until the task is aborted. Listener failures are logged and the
/// connection is re-established after a short pause.
pub fn spawn_pg_bridge(pool: PgPool, hub: RealtimeHub) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = relay_products(&pool, &hub).await {
                tracing::error!(error = %e, "Product change listener failed");
            }
            tokio::time::sleep(BRIDGE_RETRY_DELAY).await;
        }
    })
}

async fn relay_products(pool: &PgPool, hub: &RealtimeHub) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(PRODUCTS_CHANNEL).await?;
    tracing::info!(channel = PRODUCTS_CHANNEL, "Listening for product changes");

    loop {
        let notification = listener.recv().await?;
        if let Some(event) = parse_product_notification(notification.payload()) {
            hub.publish(event);
        }
    }
}
