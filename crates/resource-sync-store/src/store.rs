//! The per-resource store.
//!
//! Lifecycle: `open` subscribes to the table's change stream and starts
//! the bulk load. Events that arrive while a load is in flight are held
//! back and replayed over the loaded rows, so a change committed between
//! the subscription and the snapshot is not lost.
//!
//! State sits behind a `parking_lot::Mutex` that is never held across an
//! `.await`; each event is applied start to finish under one lock.

use crate::collection::{Applied, ChangeEvent, LocalCollection};
use crate::notification::{Notification, Notifier, Operation};
use campus_records::{Draft, Resource};
use change_stream::{ChangeStream, RealtimeStatus, StreamItem, Subscription};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use table_gateway::{ErrorCategory, GatewayError, GatewayResult, TableGateway};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of the most recent bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Loaded,
    Failed(ErrorCategory),
}

/// Result of a mutation request. Acknowledged means the remote accepted
/// the write, not that the local collection has changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Acknowledged,
    Rejected(ErrorCategory),
}

impl MutationStatus {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, MutationStatus::Acknowledged)
    }
}

/// Point-in-time copy of a store's observable state.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot<R> {
    pub records: Vec<R>,
    pub loading: bool,
    pub load_status: LoadStatus,
    pub realtime: RealtimeStatus,
}

struct StoreState<R> {
    collection: LocalCollection<R>,
    loading: bool,
    load_status: LoadStatus,
    realtime: RealtimeStatus,
    /// Events received while a load was in flight, in arrival order.
    held_back: Vec<ChangeEvent<R>>,
    /// Id of the newest load; older loads are stale.
    generation: u64,
    closed: bool,
}

struct Shared<R> {
    gateway: Arc<dyn TableGateway>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<StoreState<R>>,
    revision: watch::Sender<u64>,
}

impl<R: Resource> Shared<R> {
    fn bump(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    fn notify_all(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            self.notifier.notify(notification);
        }
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Reconcile one event and pick its notification.
    ///
    /// Every delivered event notifies, including redeliveries that leave
    /// the collection unchanged.
    fn reconcile(state: &mut StoreState<R>, event: ChangeEvent<R>) -> Notification {
        let notification = match &event {
            ChangeEvent::Inserted(record) => Notification::added(record),
            ChangeEvent::Updated(record) => Notification::updated(record),
            ChangeEvent::Deleted { .. } => Notification::deleted::<R>(),
        };
        let applied = state.collection.apply(event);
        if applied == Applied::Unchanged {
            debug!(table = R::TABLE, "Event left the collection unchanged");
        }
        notification
    }

    fn apply_event(&self, event: ChangeEvent<R>) {
        let notification = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            if state.loading {
                debug!(
                    table = R::TABLE,
                    id = %event.id(),
                    "Holding back event until load completes"
                );
                state.held_back.push(event);
                return;
            }
            Self::reconcile(&mut state, event)
        };

        self.bump();
        self.notifier.notify(notification);
    }

    fn set_realtime(&self, status: RealtimeStatus) {
        {
            let mut state = self.state.lock();
            if state.closed || state.realtime == status {
                return;
            }
            state.realtime = status;
        }
        info!(table = R::TABLE, status = ?status, "Realtime status changed");
        self.bump();
    }

    /// Start a new load generation. `None` once closed.
    fn begin_load(&self) -> Option<u64> {
        let generation = {
            let mut state = self.state.lock();
            if state.closed {
                return None;
            }
            state.generation += 1;
            state.loading = true;
            state.generation
        };
        self.bump();
        Some(generation)
    }

    async fn run_load(&self, generation: u64) {
        let result = self.gateway.list(R::TABLE).await;

        let notifications = {
            let mut state = self.state.lock();
            if state.closed || state.generation != generation {
                debug!(table = R::TABLE, generation, "Discarding stale load result");
                return;
            }

            let mut notifications = Vec::new();
            match result {
                Ok(rows) => {
                    let records = decode_rows::<R>(rows);
                    info!(table = R::TABLE, count = records.len(), "Loaded rows");
                    state.collection.replace_all(records);
                    state.load_status = LoadStatus::Loaded;
                }
                Err(e) => {
                    warn!(table = R::TABLE, error = %e, "Failed to load rows");
                    state.load_status = LoadStatus::Failed(e.category());
                    notifications.push(Notification::load_failed::<R>());
                }
            }
            state.loading = false;

            let held_back = std::mem::take(&mut state.held_back);
            for event in held_back {
                notifications.push(Self::reconcile(&mut state, event));
            }
            notifications
        };

        self.bump();
        self.notify_all(notifications);
    }

    fn finish_mutation(&self, operation: Operation, result: GatewayResult<()>) -> MutationStatus {
        match result {
            Ok(()) => {
                debug!(table = R::TABLE, operation = %operation, "Mutation acknowledged");
                MutationStatus::Acknowledged
            }
            Err(e) => {
                let category = e.category();
                warn!(table = R::TABLE, operation = %operation, error = %e, "Mutation rejected");
                if !self.is_closed() {
                    self.notifier
                        .notify(Notification::mutation_failed::<R>(operation));
                }
                MutationStatus::Rejected(category)
            }
        }
    }
}

/// Decode bulk-loaded rows, skipping any that don't fit `R`.
fn decode_rows<R: Resource>(rows: Vec<Value>) -> Vec<R> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<R>(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(table = R::TABLE, error = %e, "Skipping row that does not decode");
                None
            }
        })
        .collect()
}

/// Drain a subscription into the store until closed.
async fn pump_events<R: Resource>(
    shared: Arc<Shared<R>>,
    mut subscription: Subscription,
    mut close_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut close_rx => break,
            item = subscription.next() => match item {
                Some(StreamItem::Change(change)) => {
                    match ChangeEvent::<R>::from_row_change(&change) {
                        Ok(event) => shared.apply_event(event),
                        Err(e) => warn!(table = R::TABLE, error = %e, "Ignoring change event"),
                    }
                }
                Some(StreamItem::Status(status)) => shared.set_realtime(status),
                None => {
                    shared.set_realtime(RealtimeStatus::Closed);
                    break;
                }
            }
        }
    }
    subscription.unsubscribe().await;
}

/// A live local copy of one remote table.
///
/// Mutations (`add`, `update`, `remove`) only talk to the gateway; the
/// collection follows once the change event for the write arrives.
pub struct ResourceStore<R: Resource> {
    shared: Arc<Shared<R>>,
    close_tx: Mutex<Option<oneshot::Sender<()>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<R: Resource> ResourceStore<R> {
    /// Subscribe to `R::TABLE` on `stream` and start the initial load.
    ///
    /// Returns as soon as the subscription is open; the load finishes in
    /// the background (see [`ResourceStore::ready`]). A failed subscribe
    /// leaves the store usable with its realtime status `Closed`.
    pub async fn open(
        gateway: Arc<dyn TableGateway>,
        stream: &dyn ChangeStream,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            gateway,
            notifier,
            state: Mutex::new(StoreState {
                collection: LocalCollection::new(),
                loading: true,
                load_status: LoadStatus::Pending,
                realtime: RealtimeStatus::Connecting,
                held_back: Vec::new(),
                generation: 0,
                closed: false,
            }),
            revision,
        });

        let (close_tx, close_rx) = oneshot::channel();
        let pump = match stream.subscribe(R::TABLE).await {
            Ok(subscription) => Some(tokio::spawn(pump_events(
                shared.clone(),
                subscription,
                close_rx,
            ))),
            Err(e) => {
                warn!(table = R::TABLE, error = %e, "Failed to subscribe to changes");
                shared.set_realtime(RealtimeStatus::Closed);
                None
            }
        };

        if let Some(generation) = shared.begin_load() {
            let loader = shared.clone();
            tokio::spawn(async move { loader.run_load(generation).await });
        }
        info!(table = R::TABLE, "Store opened");

        Self {
            shared,
            close_tx: Mutex::new(Some(close_tx)),
            pump: Mutex::new(pump),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot<R> {
        let state = self.shared.state.lock();
        StoreSnapshot {
            records: state.collection.records().to_vec(),
            loading: state.loading,
            load_status: state.load_status,
            realtime: state.realtime,
        }
    }

    pub fn records(&self) -> Vec<R> {
        self.shared.state.lock().collection.records().to_vec()
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.shared.state.lock().collection.get(id).cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.lock().loading
    }

    pub fn load_status(&self) -> LoadStatus {
        self.shared.state.lock().load_status
    }

    pub fn realtime_status(&self) -> RealtimeStatus {
        self.shared.state.lock().realtime
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Revision counter, bumped on every collection or status change.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    /// Wait until no load is in flight.
    pub async fn ready(&self) {
        let mut revision = self.shared.revision.subscribe();
        loop {
            let settled = {
                let state = self.shared.state.lock();
                !state.loading || state.closed
            };
            if settled || revision.changed().await.is_err() {
                return;
            }
        }
    }

    /// Reconcile one change event. This is the only path that alters the
    /// collection outside a bulk load.
    pub fn apply_event(&self, event: ChangeEvent<R>) {
        self.shared.apply_event(event);
    }

    /// Reload every row without touching the subscription.
    ///
    /// Only the newest load lands; a result that finishes after a later
    /// refetch started, or after close, is dropped.
    pub async fn refetch(&self) {
        if let Some(generation) = self.shared.begin_load() {
            self.shared.run_load(generation).await;
        }
    }

    /// Request an insert. Drafts with blank required fields are rejected
    /// without a round trip.
    pub async fn add(&self, draft: R::Draft) -> MutationStatus {
        if self.is_closed() {
            return MutationStatus::Rejected(ErrorCategory::Other);
        }

        let missing = draft.missing_fields();
        if !missing.is_empty() {
            let err = GatewayError::Constraint(format!(
                "missing required fields: {}",
                missing.join(", ")
            ));
            return self.shared.finish_mutation(Operation::Add, Err(err));
        }

        let result = match serde_json::to_value(&draft) {
            Ok(fields) => self.shared.gateway.insert(R::TABLE, fields).await,
            Err(e) => Err(e.into()),
        };
        self.shared.finish_mutation(Operation::Add, result)
    }

    /// Request a partial update of the row with `id`.
    pub async fn update(&self, id: &str, patch: R::Patch) -> MutationStatus {
        if self.is_closed() {
            return MutationStatus::Rejected(ErrorCategory::Other);
        }

        let result = match serde_json::to_value(&patch) {
            Ok(patch) => self.shared.gateway.update(R::TABLE, id, patch).await,
            Err(e) => Err(e.into()),
        };
        self.shared.finish_mutation(Operation::Update, result)
    }

    /// Request deletion of the row with `id`.
    pub async fn remove(&self, id: &str) -> MutationStatus {
        if self.is_closed() {
            return MutationStatus::Rejected(ErrorCategory::Other);
        }

        let result = self.shared.gateway.delete(R::TABLE, id).await;
        self.shared.finish_mutation(Operation::Delete, result)
    }

    /// Release the subscription and stop reacting to anything.
    pub async fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.held_back.clear();
            state.realtime = RealtimeStatus::Closed;
        }
        self.shared.bump();

        if let Some(close_tx) = self.close_tx.lock().take() {
            let _ = close_tx.send(());
        }
        let pump = self.pump.lock().take();
        if let Some(pump) = pump {
            let _ = pump.await;
        }
        info!(table = R::TABLE, "Store closed");
    }
}

impl<R: Resource> Drop for ResourceStore<R> {
    fn drop(&mut self) {
        self.shared.state.lock().closed = true;
        if let Some(close_tx) = self.close_tx.get_mut().take() {
            let _ = close_tx.send(());
        }
    }
}

impl<R: Resource> std::fmt::Debug for ResourceStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore")
            .field("table", &R::TABLE)
            .finish_non_exhaustive()
    }
}
