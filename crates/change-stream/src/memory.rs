//! In-process change hub.
//!
//! Mirrors the realtime server for an in-memory table store: whatever the
//! store publishes is fanned out to every subscription on that table.

use crate::subscription::Subscription;
use crate::{ChangeStream, RealtimeStatus, RowChange, StreamItem, StreamResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Broadcast buffer per table.
const DEFAULT_TABLE_CAPACITY: usize = 1024;

/// Broadcast hub keyed by table name.
#[derive(Clone, Default)]
pub struct MemoryChangeHub {
    tables: Arc<Mutex<HashMap<String, broadcast::Sender<StreamItem>>>>,
}

impl MemoryChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, table: &str) -> broadcast::Sender<StreamItem> {
        self.tables
            .lock()
            .entry(table.to_string())
            .or_insert_with(|| broadcast::channel(DEFAULT_TABLE_CAPACITY).0)
            .clone()
    }

    /// Publish a committed change to every subscriber of its table.
    pub fn publish(&self, change: RowChange) {
        let table = change.table.clone();
        let receivers = self
            .sender(&table)
            .send(StreamItem::Change(change))
            .unwrap_or(0);
        debug!(table = %table, receivers, "change published");
    }

    /// Push a connection status to every subscriber of `table`.
    pub fn publish_status(&self, table: &str, status: RealtimeStatus) {
        let _ = self.sender(table).send(StreamItem::Status(status));
    }

    /// Number of live subscribers on `table`.
    pub fn subscriber_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .get(table)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChangeStream for MemoryChangeHub {
    async fn subscribe(&self, table: &str) -> StreamResult<Subscription> {
        let mut receiver = self.sender(table).subscribe();
        let (item_tx, item_rx) = Subscription::channel();
        let (close_tx, mut close_rx) = oneshot::channel::<()>();
        let table_name = table.to_string();

        let task = tokio::spawn(async move {
            if item_tx
                .send(StreamItem::Status(RealtimeStatus::Subscribed))
                .await
                .is_err()
            {
                return;
            }

            loop {
                tokio::select! {
                    _ = &mut close_rx => break,
                    received = receiver.recv() => match received {
                        Ok(item) => {
                            if item_tx.send(item).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                table = %table_name,
                                skipped,
                                "subscriber lagged, changes dropped"
                            );
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }

            let _ = item_tx.try_send(StreamItem::Status(RealtimeStatus::Closed));
        });

        Ok(Subscription::new(table, item_rx, close_tx, task))
    }
}

impl std::fmt::Debug for MemoryChangeHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChangeHub").finish_non_exhaustive()
    }
}
