use async_trait::async_trait;
use campus_records::{Course, CourseDraft, CoursePatch, Resource, Room, RoomDraft};
use change_stream::{MemoryChangeHub, RealtimeStatus, RowChange};
use resource_sync_store::{
    ChangeEvent, ErrorCategory, LoadStatus, MutationStatus, Notification, NotificationKind,
    Notifier, ResourceStore, StoreSnapshot,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use table_gateway::{GatewayError, GatewayResult, MemoryGateway, TableGateway, TableSchema};

// =========================================================================
// Test doubles
// =========================================================================

#[derive(Default)]
struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.all().into_iter().filter(|n| n.kind == kind).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

/// One scripted `list` response.
struct ListReply {
    delay: Duration,
    rows: Option<Vec<Value>>,
}

/// Gateway whose `list` answers come from a script and whose mutations
/// are counted but never committed.
struct ScriptedGateway {
    replies: Mutex<VecDeque<ListReply>>,
    mutation_error: Mutex<Option<ErrorCategory>>,
    list_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
}

impl ScriptedGateway {
    fn new(replies: Vec<ListReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            mutation_error: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            mutation_calls: AtomicUsize::new(0),
        })
    }

    fn fail_mutations_with(&self, category: ErrorCategory) {
        *self.mutation_error.lock().unwrap() = Some(category);
    }

    fn mutation_count(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    fn mutation_result(&self) -> GatewayResult<()> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        match *self.mutation_error.lock().unwrap() {
            None => Ok(()),
            Some(ErrorCategory::Transport) => Err(GatewayError::Transport("reset".into())),
            Some(ErrorCategory::Constraint) => Err(GatewayError::Constraint("dup".into())),
            Some(ErrorCategory::NotFound) => Err(GatewayError::NotFound {
                table: "courses".into(),
                id: "?".into(),
            }),
            Some(ErrorCategory::Other) => Err(GatewayError::Remote {
                status: 500,
                message: "boom".into(),
            }),
        }
    }
}

#[async_trait]
impl TableGateway for ScriptedGateway {
    async fn list(&self, _table: &str) -> GatewayResult<Vec<Value>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        let Some(reply) = reply else {
            return Ok(Vec::new());
        };
        tokio::time::sleep(reply.delay).await;
        reply
            .rows
            .ok_or_else(|| GatewayError::Transport("connection refused".into()))
    }

    async fn insert(&self, _table: &str, _fields: Value) -> GatewayResult<()> {
        self.mutation_result()
    }

    async fn update(&self, _table: &str, _id: &str, _patch: Value) -> GatewayResult<()> {
        self.mutation_result()
    }

    async fn delete(&self, _table: &str, _id: &str) -> GatewayResult<()> {
        self.mutation_result()
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn course_row(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "program": "BSc CS",
        "semester": 3,
        "credits": 4,
        "type": "Core",
        "faculty": "Dr. Rao",
        "theory_hours": 3,
        "practical_hours": 2
    })
}

fn course(id: &str, name: &str) -> Course {
    serde_json::from_value(course_row(id, name)).unwrap()
}

fn course_draft(id: &str, name: &str) -> CourseDraft {
    serde_json::from_value(course_row(id, name)).unwrap()
}

fn ids<R: Resource>(records: &[R]) -> Vec<String> {
    records.iter().map(|r| r.id().to_string()).collect()
}

fn course_gateway(hub: &MemoryChangeHub) -> Arc<MemoryGateway> {
    let gateway = MemoryGateway::with_hub(hub.clone());
    gateway.define_table(
        "courses",
        TableSchema::new().required(&["name", "program", "type", "faculty"]),
    );
    Arc::new(gateway)
}

async fn wait_for<R: Resource>(
    store: &ResourceStore<R>,
    check: impl Fn(&StoreSnapshot<R>) -> bool,
) {
    let mut revision = store.watch();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if check(&store.snapshot()) {
                return;
            }
            revision.changed().await.expect("store dropped");
        }
    })
    .await
    .expect("condition not reached");
}

/// Give spawned tasks a chance to run.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// =========================================================================
// Load
// =========================================================================

#[tokio::test]
async fn test_initial_load_keeps_newest_first_order() {
    let hub = MemoryChangeHub::new();
    let gateway = course_gateway(&hub);
    gateway.seed("courses", vec![course_row("C1", "Old"), course_row("C2", "New")]);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway, &hub, notifier.clone()).await;
    assert!(store.is_loading());
    store.ready().await;

    let snapshot = store.snapshot();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.load_status, LoadStatus::Loaded);
    assert_eq!(ids(&snapshot.records), vec!["C2", "C1"]);
    assert!(notifier.all().is_empty());
}

#[tokio::test]
async fn test_load_failure_is_isolated() {
    let hub = MemoryChangeHub::new();
    let gateway = course_gateway(&hub);
    gateway.seed("courses", vec![course_row("C1", "Foo")]);
    gateway.set_unavailable(true);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway, &hub, notifier.clone()).await;
    store.ready().await;

    let snapshot = store.snapshot();
    assert!(!snapshot.loading);
    assert!(snapshot.records.is_empty());
    assert_eq!(snapshot.load_status, LoadStatus::Failed(ErrorCategory::Transport));

    let errors = notifier.of_kind(NotificationKind::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].title, "Error");
    assert_eq!(errors[0].description, "Failed to load courses. Please try again.");
}

#[tokio::test]
async fn test_refetch_after_failed_load_recovers() {
    let hub = MemoryChangeHub::new();
    let gateway = course_gateway(&hub);
    gateway.seed("courses", vec![course_row("C1", "Foo")]);
    gateway.set_unavailable(true);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway.clone(), &hub, notifier.clone()).await;
    store.ready().await;
    assert!(store.records().is_empty());

    gateway.set_unavailable(false);
    store.refetch().await;

    assert_eq!(store.load_status(), LoadStatus::Loaded);
    assert_eq!(ids(&store.records()), vec!["C1"]);
}

#[tokio::test]
async fn test_undecodable_rows_are_skipped() {
    let hub = MemoryChangeHub::new();
    let gateway = course_gateway(&hub);
    gateway.seed(
        "courses",
        vec![course_row("C1", "Foo"), json!({ "id": "C2", "name": 42 })],
    );

    let store = ResourceStore::<Course>::open(gateway, &hub, RecordingNotifier::new()).await;
    store.ready().await;

    assert_eq!(ids(&store.records()), vec!["C1"]);
    assert_eq!(store.load_status(), LoadStatus::Loaded);
}

#[tokio::test(start_paused = true)]
async fn test_events_during_load_are_not_lost() {
    let hub = MemoryChangeHub::new();
    let gateway = ScriptedGateway::new(vec![ListReply {
        delay: Duration::from_millis(50),
        rows: Some(vec![course_row("C1", "Foo")]),
    }]);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway, &hub, notifier.clone()).await;
    settle().await;

    // Committed after the snapshot was taken, delivered before it returns.
    hub.publish(RowChange::inserted("courses", course_row("C2", "Bar")));
    hub.publish(RowChange::updated(
        "courses",
        course_row("C1", "Foo v2"),
        json!({ "id": "C1" }),
    ));
    settle().await;
    assert!(store.is_loading());
    assert!(store.records().is_empty());

    store.ready().await;

    let records = store.records();
    assert_eq!(ids(&records), vec!["C1", "C2"]);
    assert_eq!(records[0].name, "Foo v2");
    assert_eq!(notifier.of_kind(NotificationKind::Added).len(), 1);
    assert_eq!(notifier.of_kind(NotificationKind::Updated).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_refetch_result_is_discarded() {
    let hub = MemoryChangeHub::new();
    let gateway = ScriptedGateway::new(vec![
        ListReply {
            delay: Duration::ZERO,
            rows: Some(vec![]),
        },
        ListReply {
            delay: Duration::from_millis(100),
            rows: Some(vec![course_row("OLD", "Slow")]),
        },
        ListReply {
            delay: Duration::from_millis(10),
            rows: Some(vec![course_row("NEW", "Fast")]),
        },
    ]);

    let store = ResourceStore::<Course>::open(gateway, &hub, RecordingNotifier::new()).await;
    store.ready().await;

    tokio::join!(store.refetch(), store.refetch());

    assert_eq!(ids(&store.records()), vec!["NEW"]);
    assert!(!store.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_load_finishing_after_close_is_discarded() {
    let hub = MemoryChangeHub::new();
    let gateway = ScriptedGateway::new(vec![ListReply {
        delay: Duration::from_millis(100),
        rows: Some(vec![course_row("C1", "Foo")]),
    }]);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway, &hub, notifier.clone()).await;
    store.close().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(store.is_closed());
    assert!(store.records().is_empty());
    assert!(notifier.all().is_empty());
    assert_eq!(hub.subscriber_count("courses"), 0);
}

// =========================================================================
// Reconciliation
// =========================================================================

#[tokio::test]
async fn test_update_event_produces_one_updated_notification() {
    let hub = MemoryChangeHub::new();
    let gateway = course_gateway(&hub);
    gateway.seed("courses", vec![course_row("C1", "Foo")]);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway, &hub, notifier.clone()).await;
    store.ready().await;

    let patch = CoursePatch {
        name: Some("Bar".into()),
        ..Default::default()
    };
    assert_eq!(store.update("C1", patch).await, MutationStatus::Acknowledged);
    wait_for(&store, |s| s.records.first().map(|c| c.name.as_str()) == Some("Bar")).await;

    let records = store.records();
    assert_eq!(ids(&records), vec!["C1"]);
    assert_eq!(records[0].name, "Bar");
    assert_eq!(records[0].credits, 4);

    let all = notifier.all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].kind, NotificationKind::Updated);
    assert_eq!(all[0].title, "Course Updated");
    assert_eq!(all[0].description, "Bar has been updated.");
}

#[tokio::test]
async fn test_remove_missing_row_reports_one_error_and_changes_nothing() {
    let hub = MemoryChangeHub::new();
    let gateway = course_gateway(&hub);
    gateway.seed("courses", vec![course_row("C1", "Foo")]);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway, &hub, notifier.clone()).await;
    store.ready().await;
    let before = store.records();

    let status = store.remove("C2").await;
    assert_eq!(status, MutationStatus::Rejected(ErrorCategory::NotFound));
    settle().await;

    assert_eq!(store.records(), before);
    let all = notifier.all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Error");
    assert_eq!(all[0].description, "Failed to delete course. Please try again.");
}

#[tokio::test]
async fn test_duplicate_insert_keeps_one_record() {
    let hub = MemoryChangeHub::new();
    let gateway = course_gateway(&hub);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway, &hub, notifier.clone()).await;
    store.ready().await;

    assert_eq!(store.add(course_draft("C3", "Foo")).await, MutationStatus::Acknowledged);
    wait_for(&store, |s| s.records.len() == 1).await;

    assert_eq!(
        store.add(course_draft("C3", "Foo")).await,
        MutationStatus::Rejected(ErrorCategory::Constraint)
    );
    // Redelivery of the original event.
    store.apply_event(ChangeEvent::Inserted(course("C3", "Foo")));
    settle().await;

    assert_eq!(ids(&store.records()), vec!["C3"]);
    let added = notifier.of_kind(NotificationKind::Added);
    assert_eq!(added.len(), 2);
    assert!(added
        .iter()
        .all(|n| n.description == "Foo has been added successfully."));
    assert_eq!(notifier.of_kind(NotificationKind::Error).len(), 1);
}

#[tokio::test]
async fn test_redelivered_events_notify_every_time() {
    let hub = MemoryChangeHub::new();
    let notifier = RecordingNotifier::new();
    let store = ResourceStore::<Course>::open(
        Arc::new(MemoryGateway::new()),
        &hub,
        notifier.clone(),
    )
    .await;
    store.ready().await;

    store.apply_event(ChangeEvent::Inserted(course("C3", "Foo")));
    store.apply_event(ChangeEvent::Inserted(course("C3", "Foo")));
    store.apply_event(ChangeEvent::Deleted { id: "NOPE".to_string() });
    store.apply_event(ChangeEvent::Deleted { id: "NOPE".to_string() });

    assert_eq!(ids(&store.records()), vec!["C3"]);
    let titles: Vec<_> = notifier.all().into_iter().map(|n| n.title).collect();
    assert_eq!(
        titles,
        vec!["Course Added", "Course Added", "Course Deleted", "Course Deleted"]
    );
}

#[tokio::test]
async fn test_add_does_not_touch_collection_optimistically() {
    let hub = MemoryChangeHub::new();
    // Writes land in a table nobody publishes from.
    let gateway = Arc::new(MemoryGateway::new());
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway.clone(), &hub, notifier.clone()).await;
    store.ready().await;

    assert_eq!(store.add(course_draft("C9", "Quiet")).await, MutationStatus::Acknowledged);
    settle().await;

    assert_eq!(gateway.rows("courses").len(), 1);
    assert!(store.records().is_empty());
    assert!(notifier.all().is_empty());
}

#[tokio::test]
async fn test_delete_and_update_of_absent_rows_still_notify() {
    let hub = MemoryChangeHub::new();
    let gateway = course_gateway(&hub);
    gateway.seed("courses", vec![course_row("C1", "Foo")]);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway, &hub, notifier.clone()).await;
    store.ready().await;

    store.apply_event(ChangeEvent::Deleted { id: "ZZ".into() });
    store.apply_event(ChangeEvent::Updated(course("C8", "Ghost")));

    assert_eq!(ids(&store.records()), vec!["C1"]);
    let kinds: Vec<_> = notifier.all().into_iter().map(|n| n.kind).collect();
    assert_eq!(kinds, vec![NotificationKind::Deleted, NotificationKind::Updated]);
    assert_eq!(notifier.all()[0].description, "Course has been removed.");
}

#[tokio::test]
async fn test_remote_delete_removes_row() {
    let hub = MemoryChangeHub::new();
    let gateway = course_gateway(&hub);
    gateway.seed("courses", vec![course_row("C1", "Foo"), course_row("C2", "Bar")]);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway.clone(), &hub, notifier.clone()).await;
    store.ready().await;

    // Another client deletes the row.
    gateway.delete("courses", "C1").await.unwrap();
    wait_for(&store, |s| s.records.len() == 1).await;

    assert_eq!(ids(&store.records()), vec!["C2"]);
    assert_eq!(notifier.of_kind(NotificationKind::Deleted).len(), 1);
}

// =========================================================================
// Mutations
// =========================================================================

#[tokio::test]
async fn test_add_with_blank_required_fields_skips_gateway() {
    let hub = MemoryChangeHub::new();
    let gateway = ScriptedGateway::new(vec![]);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway.clone(), &hub, notifier.clone()).await;
    store.ready().await;

    let mut draft = course_draft("C1", "Foo");
    draft.name = "  ".into();
    assert_eq!(
        store.add(draft).await,
        MutationStatus::Rejected(ErrorCategory::Constraint)
    );
    assert_eq!(gateway.mutation_count(), 0);
    assert_eq!(
        notifier.all()[0].description,
        "Failed to add course. Please try again."
    );
}

#[tokio::test]
async fn test_transport_failure_on_update_is_neutral() {
    let hub = MemoryChangeHub::new();
    let gateway = ScriptedGateway::new(vec![ListReply {
        delay: Duration::ZERO,
        rows: Some(vec![course_row("C1", "Foo")]),
    }]);
    gateway.fail_mutations_with(ErrorCategory::Transport);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway.clone(), &hub, notifier.clone()).await;
    store.ready().await;

    let status = store.update("C1", CoursePatch::default()).await;
    assert_eq!(status, MutationStatus::Rejected(ErrorCategory::Transport));
    assert!(!status.is_acknowledged());
    assert_eq!(gateway.mutation_count(), 1);
    assert_eq!(store.records()[0].name, "Foo");
    assert_eq!(
        notifier.all()[0].description,
        "Failed to update course. Please try again."
    );
}

#[tokio::test]
async fn test_auto_keyed_add_round_trip() {
    let hub = MemoryChangeHub::new();
    let gateway = MemoryGateway::with_hub(hub.clone());
    gateway.define_table(
        "rooms",
        TableSchema::new()
            .auto_keyed()
            .required(&["room_number", "name", "type"])
            .unique(&["room_number"]),
    );
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Room>::open(Arc::new(gateway), &hub, notifier.clone()).await;
    store.ready().await;

    let draft: RoomDraft = serde_json::from_value(json!({
        "room_number": "L-204",
        "name": "Smart Lab",
        "type": "Laboratory",
        "capacity": 30,
        "facilities": ["Projector"]
    }))
    .unwrap();
    assert_eq!(store.add(draft).await, MutationStatus::Acknowledged);
    wait_for(&store, |s| s.records.len() == 1).await;

    let records = store.records();
    let room = &records[0];
    assert!(!room.id.is_empty());
    assert_eq!(room.status, "Available");
    assert!(room.created_at.is_some());

    let added = notifier.of_kind(NotificationKind::Added);
    assert_eq!(added[0].title, "Room Added");
    assert_eq!(added[0].description, "Smart Lab has been added successfully.");
}

// =========================================================================
// Realtime status and lifecycle
// =========================================================================

#[tokio::test]
async fn test_realtime_status_is_surfaced() {
    let hub = MemoryChangeHub::new();
    let gateway = course_gateway(&hub);

    let store = ResourceStore::<Course>::open(gateway, &hub, RecordingNotifier::new()).await;
    wait_for(&store, |s| s.realtime == RealtimeStatus::Subscribed).await;

    hub.publish_status("courses", RealtimeStatus::Disconnected);
    wait_for(&store, |s| s.realtime == RealtimeStatus::Disconnected).await;

    hub.publish_status("courses", RealtimeStatus::Subscribed);
    wait_for(&store, |s| s.realtime == RealtimeStatus::Subscribed).await;
}

#[tokio::test]
async fn test_close_releases_subscription() {
    let hub = MemoryChangeHub::new();
    let gateway = course_gateway(&hub);
    let notifier = RecordingNotifier::new();

    let store = ResourceStore::<Course>::open(gateway.clone(), &hub, notifier.clone()).await;
    store.ready().await;
    assert_eq!(hub.subscriber_count("courses"), 1);

    store.close().await;
    assert_eq!(hub.subscriber_count("courses"), 0);
    assert_eq!(store.realtime_status(), RealtimeStatus::Closed);

    gateway
        .insert("courses", course_row("C1", "After close"))
        .await
        .unwrap();
    settle().await;
    assert!(store.records().is_empty());
    assert!(notifier.all().is_empty());
}

#[tokio::test]
async fn test_drop_releases_subscription() {
    let hub = MemoryChangeHub::new();
    let gateway = course_gateway(&hub);

    let store = ResourceStore::<Course>::open(gateway, &hub, RecordingNotifier::new()).await;
    store.ready().await;
    drop(store);

    tokio::time::timeout(Duration::from_secs(5), async {
        while hub.subscriber_count("courses") > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("subscription not released");
}
