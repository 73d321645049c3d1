//! End-to-end reminder flows: store -> evaluation -> dispatch, through both
//! the foreground scheduler and the background bridge.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use fw_core::background::{BackgroundHost, PERIODIC_TAG, SYNC_TAG};
use fw_core::clock::ManualClock;
use fw_core::host::{NotificationSurface, Unsupported};
use fw_core::{
    ActiveBaby, Alert, BabyId, BabyProfile, BackgroundBridge, Capability, ChannelOutcome,
    ConfigurationId, ConfigurationUpdate, Dispatcher, Evaluator, FeedingEvent, Host, HostError,
    MemoryStore, PushPayload, ReminderConfiguration, ReminderStore, Scheduler, Scope, StoreError,
    TickError, TriggerMemory, ensure_defaults,
};

#[derive(Default)]
struct RecordingSurface {
    shown: Mutex<Vec<Alert>>,
}

impl RecordingSurface {
    fn shown(&self) -> Vec<Alert> {
        self.shown.lock().unwrap().clone()
    }

    fn count(&self) -> usize {
        self.shown.lock().unwrap().len()
    }
}

impl NotificationSurface for RecordingSurface {
    fn request_permission(&self) -> Capability {
        Capability::Available
    }

    fn present(&self, alert: &Alert) -> Result<(), HostError> {
        self.shown.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn baby(is_twins: bool) -> BabyProfile {
    BabyProfile {
        id: BabyId::new("baby-1").unwrap(),
        name: "Mia".to_string(),
        is_twins,
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    surface: Arc<RecordingSurface>,
    evaluator: Arc<Evaluator>,
}

impl Harness {
    fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    fn with_store(store: Arc<MemoryStore>) -> Self {
        let surface = Arc::new(RecordingSurface::default());
        let evaluator = Arc::new(Evaluator::new(store.clone(), dispatcher(&surface)));
        Self {
            store,
            surface,
            evaluator,
        }
    }

    fn feed(&self, at: DateTime<Utc>, twin: Option<Scope>) {
        self.store.record_feeding(FeedingEvent {
            baby_id: baby(false).id,
            occurred_at: at,
            twin,
        });
    }
}

/// Polls `condition` until it holds, failing after a generous deadline.
async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn dispatcher(surface: &Arc<RecordingSurface>) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(Host {
        notifications: surface.clone(),
        ..Host::unsupported()
    }))
}

#[tokio::test]
async fn single_baby_with_no_feedings_is_reminded_once() {
    let h = Harness::new();
    ensure_defaults(h.store.as_ref(), &baby(false).id, false).unwrap();
    let memory = Mutex::new(TriggerMemory::new());

    let dispatched = h
        .evaluator
        .evaluate_and_dispatch(&baby(false), &memory, ts("2025-03-01T12:00:00Z"))
        .await
        .unwrap();

    assert_eq!(dispatched.len(), 1);
    let shown = h.surface.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].body, "Time to feed Mia!");
    assert_eq!(shown[0].target.as_ref().map(|t| t.scope), Some(Scope::Unified));
}

#[tokio::test]
async fn twins_only_the_overdue_twin_is_reminded() {
    let h = Harness::new();
    let now = ts("2025-03-01T12:00:00Z");
    ensure_defaults(h.store.as_ref(), &baby(true).id, true).unwrap();
    h.feed(now - chrono::Duration::hours(2), Some(Scope::TwinA));
    h.feed(now - chrono::Duration::hours(4), Some(Scope::TwinB));
    let memory = Mutex::new(TriggerMemory::new());

    h.evaluator
        .evaluate_and_dispatch(&baby(true), &memory, now)
        .await
        .unwrap();

    let shown = h.surface.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].target.as_ref().map(|t| t.scope), Some(Scope::TwinB));
    assert_eq!(shown[0].body, "Time to feed Mia (twin B)!");
}

#[tokio::test]
async fn dispatched_reminder_is_suppressed_on_the_next_tick() {
    let h = Harness::new();
    ensure_defaults(h.store.as_ref(), &baby(false).id, false).unwrap();
    let memory = Mutex::new(TriggerMemory::new());
    let t = ts("2025-03-01T12:00:00Z");

    h.evaluator
        .evaluate_and_dispatch(&baby(false), &memory, t)
        .await
        .unwrap();
    let second = h
        .evaluator
        .evaluate_and_dispatch(&baby(false), &memory, t + chrono::Duration::minutes(1))
        .await
        .unwrap();

    assert!(second.is_empty());
    assert_eq!(h.surface.count(), 1);

    // Still unfed a full interval later: fires again.
    let third = h
        .evaluator
        .evaluate_and_dispatch(&baby(false), &memory, t + chrono::Duration::minutes(180))
        .await
        .unwrap();
    assert_eq!(third.len(), 1);
}

#[tokio::test]
async fn disabled_configurations_are_never_dispatched() {
    let h = Harness::new();
    let configs = ensure_defaults(h.store.as_ref(), &baby(true).id, true).unwrap();
    let disable = ConfigurationUpdate {
        enabled: Some(false),
        ..ConfigurationUpdate::default()
    };
    for cfg in &configs {
        h.store.update_configuration(&cfg.id, &disable).unwrap();
    }
    let memory = Mutex::new(TriggerMemory::new());

    let dispatched = h
        .evaluator
        .evaluate_and_dispatch(&baby(true), &memory, ts("2030-01-01T00:00:00Z"))
        .await
        .unwrap();

    assert!(dispatched.is_empty());
    assert_eq!(h.surface.count(), 0);
}

struct FailingStore {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ReminderStore for FailingStore {
    fn configurations(&self, _baby_id: &BabyId) -> Result<Vec<ReminderConfiguration>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
            return Ok(Vec::new());
        }
        Err(StoreError::Backend("connection reset".into()))
    }

    fn most_recent_feeding(
        &self,
        _baby_id: &BabyId,
        _scope: Scope,
    ) -> Result<Option<FeedingEvent>, StoreError> {
        Ok(None)
    }

    fn save_configurations(&self, _batch: &[ReminderConfiguration]) -> Result<(), StoreError> {
        Ok(())
    }

    fn update_configuration(
        &self,
        id: &ConfigurationId,
        _update: &ConfigurationUpdate,
    ) -> Result<ReminderConfiguration, StoreError> {
        Err(StoreError::NotFound(id.clone()))
    }
}

#[tokio::test]
async fn failed_fetch_is_reported_and_memory_untouched() {
    let surface = Arc::new(RecordingSurface::default());
    let store = Arc::new(FailingStore {
        calls: AtomicUsize::new(0),
        delay: None,
    });
    let evaluator = Evaluator::new(store, dispatcher(&surface));
    let memory = Mutex::new(TriggerMemory::new());

    let err = evaluator
        .evaluate_and_dispatch(&baby(false), &memory, Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, TickError::Store(StoreError::Backend(_))));
    assert!(memory.lock().unwrap().is_empty());
}

#[tokio::test]
async fn slow_reads_abandon_the_tick() {
    let surface = Arc::new(RecordingSurface::default());
    let store = Arc::new(FailingStore {
        calls: AtomicUsize::new(0),
        delay: Some(Duration::from_millis(300)),
    });
    let evaluator = Evaluator::new(store, dispatcher(&surface))
        .with_read_timeout(Duration::from_millis(20));
    let memory = Mutex::new(TriggerMemory::new());

    let err = evaluator
        .evaluate_and_dispatch(&baby(false), &memory, Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, TickError::Timeout(_)));
}

#[tokio::test]
async fn scheduler_keeps_ticking_after_failed_reads() {
    let surface = Arc::new(RecordingSurface::default());
    let store = Arc::new(FailingStore {
        calls: AtomicUsize::new(0),
        delay: None,
    });
    let evaluator = Arc::new(Evaluator::new(store.clone(), dispatcher(&surface)));
    let scheduler = Scheduler::new(evaluator, ActiveBaby::new(Some(baby(false))));

    scheduler.start(Duration::from_millis(10)).await;
    wait_until("repeated reads", || store.calls.load(Ordering::SeqCst) >= 2).await;

    assert!(scheduler.is_running());
    scheduler.stop().await;
}

fn scheduled_harness(start: DateTime<Utc>) -> (Harness, Arc<ManualClock>, Scheduler) {
    let h = Harness::new();
    ensure_defaults(h.store.as_ref(), &baby(false).id, false).unwrap();
    h.feed(start, None);
    let clock = Arc::new(ManualClock::new(start));
    let scheduler = Scheduler::new(h.evaluator.clone(), ActiveBaby::new(Some(baby(false))))
        .with_clock(clock.clone());
    (h, clock, scheduler)
}

#[tokio::test]
async fn running_scheduler_fires_once_the_interval_passes() {
    let start = ts("2025-03-01T09:00:00Z");
    let (h, clock, scheduler) = scheduled_harness(start);

    scheduler.start(Duration::from_millis(10)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.surface.count(), 0);

    clock.advance(chrono::Duration::hours(4));
    wait_until("the first reminder", || h.surface.count() >= 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.stop().await;

    // Later ticks at the same instant are suppressed.
    assert_eq!(h.surface.count(), 1);
}

#[tokio::test]
async fn stopped_scheduler_never_fires_again() {
    let start = ts("2025-03-01T09:00:00Z");
    let (h, clock, scheduler) = scheduled_harness(start);

    scheduler.start(Duration::from_millis(10)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.stop().await;
    assert!(!scheduler.is_running());

    clock.advance(chrono::Duration::hours(4));
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(h.surface.count(), 0);
    // Stopping twice is harmless.
    scheduler.stop().await;
}

fn always_due_harness() -> Harness {
    let h = Harness::new();
    let configs = ensure_defaults(h.store.as_ref(), &baby(false).id, false).unwrap();
    let immediate = ConfigurationUpdate {
        interval_hours: Some(0),
        interval_minutes: Some(0),
        ..ConfigurationUpdate::default()
    };
    h.store
        .update_configuration(&configs[0].id, &immediate)
        .unwrap();
    h
}

#[tokio::test]
async fn restart_replaces_the_running_timer() {
    let h = always_due_harness();
    let scheduler = Scheduler::new(h.evaluator.clone(), ActiveBaby::new(Some(baby(false))));

    scheduler.start(Duration::from_secs(3600)).await;
    wait_until("the first start's tick", || h.surface.count() == 1).await;
    scheduler.start(Duration::from_secs(3600)).await;
    wait_until("the second start's tick", || h.surface.count() == 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.stop().await;

    // One immediate tick per start, and no overlapping timers afterwards.
    assert_eq!(h.surface.count(), 2);
}

#[tokio::test]
async fn concurrent_starts_leave_one_timer() {
    let h = always_due_harness();
    let scheduler = Scheduler::new(h.evaluator.clone(), ActiveBaby::new(Some(baby(false))));

    tokio::join!(
        scheduler.start(Duration::from_millis(10)),
        scheduler.start(Duration::from_millis(10)),
    );
    wait_until("a tick", || h.surface.count() >= 1).await;
    scheduler.stop().await;
    let fired = h.surface.count();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!scheduler.is_running());
    assert_eq!(h.surface.count(), fired);
}

#[tokio::test]
async fn dropping_the_scheduler_cancels_its_timer() {
    let h = always_due_harness();
    let scheduler = Scheduler::new(h.evaluator.clone(), ActiveBaby::new(Some(baby(false))));

    scheduler.start(Duration::from_millis(10)).await;
    wait_until("a tick", || h.surface.count() >= 1).await;
    drop(scheduler);
    let fired = h.surface.count();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(h.surface.count(), fired);
}

#[tokio::test]
async fn switching_baby_keeps_other_babys_trigger_memory() {
    let h = Harness::new();
    let first = baby(false);
    let second = BabyProfile {
        id: BabyId::new("baby-2").unwrap(),
        name: "Leo".to_string(),
        is_twins: false,
    };
    let first_cfg = ensure_defaults(h.store.as_ref(), &first.id, false).unwrap();
    ensure_defaults(h.store.as_ref(), &second.id, false).unwrap();
    let active = ActiveBaby::new(Some(first.clone()));
    let scheduler = Scheduler::new(h.evaluator.clone(), active.clone());

    scheduler.tick().await;
    active.set(Some(second));
    scheduler.tick().await;
    active.set(Some(first));
    scheduler.tick().await;

    let names: Vec<String> = h.surface.shown().into_iter().map(|a| a.title).collect();
    assert_eq!(names, vec!["Mia - Feeding reminder", "Leo - Feeding reminder"]);
    assert!(scheduler.last_triggered(&first_cfg[0].id).is_some());
}

#[tokio::test]
async fn background_wake_uses_its_own_trigger_memory() {
    let h = Harness::new();
    ensure_defaults(h.store.as_ref(), &baby(false).id, false).unwrap();
    let active = ActiveBaby::new(Some(baby(false)));
    let scheduler = Scheduler::new(h.evaluator.clone(), active.clone());
    let bridge = BackgroundBridge::new(h.evaluator.clone(), active);

    assert_eq!(scheduler.tick().await.len(), 1);
    assert_eq!(bridge.on_wake(SYNC_TAG).await.len(), 1);
    assert!(bridge.on_wake(PERIODIC_TAG).await.is_empty());
    assert!(bridge.on_wake("something-else").await.is_empty());

    // One dispatch per context is the accepted duplicate.
    assert_eq!(h.surface.count(), 2);
}

#[tokio::test]
async fn push_is_relayed_without_due_evaluation() {
    let h = Harness::new();
    let bridge = BackgroundBridge::new(h.evaluator.clone(), ActiveBaby::default());

    let report = bridge.on_push(&PushPayload {
        title: Some("Server".to_string()),
        body: Some("Feed twin B".to_string()),
        ..PushPayload::default()
    });

    assert_eq!(report.visual, ChannelOutcome::Delivered);
    assert_eq!(h.surface.shown()[0].body, "Feed twin B");
}

#[derive(Default)]
struct PartialHost {
    registered: Mutex<Vec<String>>,
}

impl BackgroundHost for PartialHost {
    fn register_sync(&self, tag: &str, _bridge: Arc<BackgroundBridge>) -> Result<(), HostError> {
        self.registered.lock().unwrap().push(tag.to_string());
        Ok(())
    }

    fn register_periodic(
        &self,
        _tag: &str,
        _period: Duration,
        _bridge: Arc<BackgroundBridge>,
    ) -> Result<(), HostError> {
        Err(HostError::Denied("periodic background sync"))
    }

    fn register_push(&self, _bridge: Arc<BackgroundBridge>) -> Result<(), HostError> {
        self.registered.lock().unwrap().push("push".to_string());
        Ok(())
    }
}

#[test]
fn registration_failures_are_not_fatal() {
    let h = Harness::new();
    let bridge = Arc::new(BackgroundBridge::new(h.evaluator, ActiveBaby::default()));

    let host = PartialHost::default();
    let registrations = bridge.enable(&host);
    assert!(registrations.sync);
    assert!(!registrations.periodic);
    assert!(registrations.push);
    assert_eq!(*host.registered.lock().unwrap(), vec![SYNC_TAG, "push"]);

    assert!(!bridge.enable(&Unsupported).any());
}
