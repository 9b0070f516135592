//! Command implementations.

use crate::backend::Backend;
use campus_records::{Course, Faculty, Resource, ResourceKind, Room, Student};
use resource_sync_store::{
    ChannelNotifier, LoadStatus, MutationStatus, Notification, Notifier, RealtimeStatus,
    ResourceStore, TracingNotifier,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// How long a mutation waits for its change event.
const RECONCILE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a generic command for the record type behind a [`ResourceKind`].
macro_rules! dispatch {
    ($kind:expr, $func:ident ( $($arg:expr),* )) => {
        match $kind {
            ResourceKind::Course => $func::<Course>($($arg),*).await,
            ResourceKind::Faculty => $func::<Faculty>($($arg),*).await,
            ResourceKind::Student => $func::<Student>($($arg),*).await,
            ResourceKind::Room => $func::<Room>($($arg),*).await,
        }
    };
}

pub async fn list(backend: &Backend, kind: ResourceKind) -> AppResult<()> {
    dispatch!(kind, list_records(backend))
}

pub async fn watch(backend: &Backend, kind: ResourceKind) -> AppResult<()> {
    dispatch!(kind, watch_records(backend))
}

pub async fn add(backend: &Backend, kind: ResourceKind, json: &str) -> AppResult<()> {
    dispatch!(kind, add_record(backend, json))
}

pub async fn update(backend: &Backend, kind: ResourceKind, id: &str, json: &str) -> AppResult<()> {
    dispatch!(kind, update_record(backend, id, json))
}

pub async fn remove(backend: &Backend, kind: ResourceKind, id: &str) -> AppResult<()> {
    dispatch!(kind, remove_record(backend, id))
}

async fn open<R: Resource>(backend: &Backend, notifier: Arc<dyn Notifier>) -> ResourceStore<R> {
    ResourceStore::open(backend.gateway.clone(), backend.stream.as_ref(), notifier).await
}

/// Open a store whose notifications are both logged and handed back.
async fn open_observed<R: Resource>(
    backend: &Backend,
) -> (ResourceStore<R>, UnboundedReceiver<Notification>) {
    let (channel, notifications) = ChannelNotifier::new();
    let notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(TracingNotifier), Arc::new(channel)];
    let store = open::<R>(backend, Arc::new(notifiers)).await;
    store.ready().await;
    (store, notifications)
}

async fn list_records<R: Resource>(backend: &Backend) -> AppResult<()> {
    let store = open::<R>(backend, Arc::new(TracingNotifier)).await;
    store.ready().await;
    let snapshot = store.snapshot();
    store.close().await;

    if let LoadStatus::Failed(category) = snapshot.load_status {
        return Err(format!("failed to load {} ({})", R::TABLE, category).into());
    }
    for record in &snapshot.records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

async fn watch_records<R: Resource>(backend: &Backend) -> AppResult<()> {
    let (store, mut notifications) = open_observed::<R>(backend).await;
    let mut revision = store.watch();
    let mut realtime = store.realtime_status();
    let mut printed_len = None;
    let mut missed_changes = false;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(table = R::TABLE, "Watching, Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Some(notification) = notifications.recv() => {
                println!("{}", notification);
            }
            changed = revision.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = store.snapshot();

                if snapshot.realtime != realtime {
                    realtime = snapshot.realtime;
                    println!("realtime: {:?}", realtime);
                    match realtime {
                        RealtimeStatus::Disconnected => missed_changes = true,
                        // Changes committed during the outage were never delivered.
                        RealtimeStatus::Subscribed if missed_changes => {
                            missed_changes = false;
                            store.refetch().await;
                        }
                        RealtimeStatus::Closed => {
                            warn!(
                                table = R::TABLE,
                                "Change stream closed, showing last known rows"
                            );
                        }
                        _ => {}
                    }
                }

                if !snapshot.loading && printed_len != Some(snapshot.records.len()) {
                    printed_len = Some(snapshot.records.len());
                    println!("{} {}", snapshot.records.len(), R::COLLECTION_LABEL);
                }
            }
        }
    }

    store.close().await;
    Ok(())
}

async fn add_record<R: Resource>(backend: &Backend, json: &str) -> AppResult<()>
where
    R::Draft: DeserializeOwned,
{
    let draft: R::Draft = serde_json::from_str(json)?;
    let (store, mut notifications) = open_observed::<R>(backend).await;
    let status = store.add(draft).await;
    confirm(store, status, &mut notifications).await
}

async fn update_record<R: Resource>(backend: &Backend, id: &str, json: &str) -> AppResult<()>
where
    R::Patch: DeserializeOwned,
{
    let patch: R::Patch = serde_json::from_str(json)?;
    let (store, mut notifications) = open_observed::<R>(backend).await;
    let status = store.update(id, patch).await;
    confirm(store, status, &mut notifications).await
}

async fn remove_record<R: Resource>(backend: &Backend, id: &str) -> AppResult<()> {
    let (store, mut notifications) = open_observed::<R>(backend).await;
    let status = store.remove(id).await;
    confirm(store, status, &mut notifications).await
}

/// Report a mutation outcome, waiting a bounded time for the change event.
async fn confirm<R: Resource>(
    store: ResourceStore<R>,
    status: MutationStatus,
    notifications: &mut UnboundedReceiver<Notification>,
) -> AppResult<()> {
    let result = match status {
        MutationStatus::Rejected(category) => {
            while let Ok(notification) = notifications.try_recv() {
                println!("{}", notification);
            }
            Err(format!("{} write rejected ({})", R::TABLE, category).into())
        }
        MutationStatus::Acknowledged => {
            let reconciled = tokio::time::timeout(RECONCILE_TIMEOUT, async {
                while let Some(notification) = notifications.recv().await {
                    if !notification.is_error() {
                        return Some(notification);
                    }
                }
                None
            })
            .await;

            match reconciled {
                Ok(Some(notification)) => println!("{}", notification),
                _ => println!(
                    "Write acknowledged; no change event within {}s",
                    RECONCILE_TIMEOUT.as_secs()
                ),
            }
            Ok(())
        }
    };

    store.close().await;
    result
}
