//! Subscription handle shared by every change stream implementation.

use crate::{StreamItem, StreamResult};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

/// Capacity of the per-subscription item channel.
pub(crate) const DEFAULT_ITEM_CHANNEL_CAPACITY: usize = 256;

/// Source of row-level changes for named tables.
#[async_trait]
pub trait ChangeStream: Send + Sync {
    /// Start receiving every change committed to `table` by any client.
    ///
    /// The returned subscription owns the underlying connection; dropping
    /// it or calling [`Subscription::unsubscribe`] releases it.
    async fn subscribe(&self, table: &str) -> StreamResult<Subscription>;
}

/// An open subscription to one table.
///
/// Items are produced by a background task and buffered in a bounded
/// channel. After [`Subscription::unsubscribe`] returns, nothing more is
/// delivered.
pub struct Subscription {
    table: String,
    items: mpsc::Receiver<StreamItem>,
    /// Signals the background task to leave the channel. `None` once used.
    close_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Build a subscription around a running producer task.
    pub(crate) fn new(
        table: impl Into<String>,
        items: mpsc::Receiver<StreamItem>,
        close_tx: oneshot::Sender<()>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            table: table.into(),
            items,
            close_tx: Some(close_tx),
            task: Some(task),
        }
    }

    /// Create the channel pair a producer task writes into.
    pub(crate) fn channel() -> (mpsc::Sender<StreamItem>, mpsc::Receiver<StreamItem>) {
        mpsc::channel(DEFAULT_ITEM_CHANNEL_CAPACITY)
    }

    /// Table this subscription watches.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Wait for the next item. Returns `None` once the producer has ended.
    pub async fn next(&mut self) -> Option<StreamItem> {
        self.items.recv().await
    }

    /// Stop delivery and wait for the producer to release its connection.
    pub async fn unsubscribe(mut self) {
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
        }
        self.items.close();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        debug!(table = %self.table, "unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}
