use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gather_lifecycle::{
    CheckInManager, EventRegistry, EventScheduler, LifecycleError, ManualClock,
};
use gather_storage::{
    Backend, ConfirmOutcome, ExchangeOutcome, GrantOutcome, IssueOutcome, MemoryBackend,
    Result as StoreResult, StoreError, StoreStats,
};
use gather_types::{
    Address, Badge, Event, EventDraft, EventEntry, EventId, EventKind, EventStatus, Points, QrCode,
    Wallet,
};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 10, 9, 0, 0).unwrap()
}

fn draft(capacity: u32) -> EventDraft {
    let base = base_time();
    EventDraft {
        title: "Community build day".into(),
        content: "Pair up and ship something".into(),
        location: "The loft".into(),
        capacity,
        kind: EventKind::Fcfs,
        recruit_start_at: base + chrono::Duration::hours(1),
        recruit_end_at: base + chrono::Duration::days(2),
        event_start_at: base + chrono::Duration::days(3),
        event_end_at: base + chrono::Duration::days(3) + chrono::Duration::hours(4),
    }
}

fn user(n: u8) -> Address {
    Address::from_bytes([n; 20])
}

/// Delegating backend that fails status writes for designated events,
/// standing in for a store that briefly refuses a subset of rows.
struct FaultyBackend {
    inner: MemoryBackend,
    poisoned: Mutex<HashSet<EventId>>,
}

impl FaultyBackend {
    fn new() -> Self {
        Self {
            inner: MemoryBackend::new(),
            poisoned: Mutex::new(HashSet::new()),
        }
    }

    fn poison(&self, id: EventId) {
        self.poisoned.lock().unwrap().insert(id);
    }

    fn heal(&self, id: EventId) {
        self.poisoned.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl Backend for FaultyBackend {
    async fn put_event(&self, event: &Event) -> StoreResult<()> {
        self.inner.put_event(event).await
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>> {
        self.inner.get_event(id).await
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        self.inner.list_events().await
    }

    async fn active_events(&self) -> StoreResult<Vec<Event>> {
        self.inner.active_events().await
    }

    async fn update_event_status(
        &self,
        id: EventId,
        expected: EventStatus,
        next: EventStatus,
    ) -> StoreResult<bool> {
        if self.poisoned.lock().unwrap().contains(&id) {
            return Err(StoreError::Backend("injected write fault".into()));
        }
        self.inner.update_event_status(id, expected, next).await
    }

    async fn delete_event(&self, id: EventId) -> StoreResult<()> {
        self.inner.delete_event(id).await
    }

    async fn insert_entry(&self, entry: &EventEntry) -> StoreResult<()> {
        self.inner.insert_entry(entry).await
    }

    async fn put_entry(&self, entry: &EventEntry) -> StoreResult<()> {
        self.inner.put_entry(entry).await
    }

    async fn get_entry(&self, event_id: EventId, user: Address) -> StoreResult<Option<EventEntry>> {
        self.inner.get_entry(event_id, user).await
    }

    async fn list_entries(&self, event_id: EventId) -> StoreResult<Vec<EventEntry>> {
        self.inner.list_entries(event_id).await
    }

    async fn confirm_entry(
        &self,
        event_id: EventId,
        user: Address,
        at: DateTime<Utc>,
    ) -> StoreResult<ConfirmOutcome> {
        self.inner.confirm_entry(event_id, user, at).await
    }

    async fn insert_badge(&self, badge: &Badge) -> StoreResult<()> {
        self.inner.insert_badge(badge).await
    }

    async fn get_badge(&self, event_id: EventId) -> StoreResult<Option<Badge>> {
        self.inner.get_badge(event_id).await
    }

    async fn apply_badge_issue(
        &self,
        event_id: EventId,
        user: Address,
        score: u64,
    ) -> StoreResult<IssueOutcome> {
        self.inner.apply_badge_issue(event_id, user, score).await
    }

    async fn put_qr(&self, qr: &QrCode) -> StoreResult<()> {
        self.inner.put_qr(qr).await
    }

    async fn get_qr(&self, event_id: EventId) -> StoreResult<Option<QrCode>> {
        self.inner.get_qr(event_id).await
    }

    async fn set_qr_active(&self, event_id: EventId, active: bool) -> StoreResult<bool> {
        self.inner.set_qr_active(event_id, active).await
    }

    async fn mark_qr_scanned(&self, event_id: EventId, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.mark_qr_scanned(event_id, at).await
    }

    async fn get_wallet(&self, address: Address) -> StoreResult<Wallet> {
        self.inner.get_wallet(address).await
    }

    async fn apply_review_grant(
        &self,
        event_id: EventId,
        user: Address,
        amount: Points,
    ) -> StoreResult<GrantOutcome> {
        self.inner.apply_review_grant(event_id, user, amount).await
    }

    async fn apply_exchange(
        &self,
        address: Address,
        amount: Points,
    ) -> StoreResult<ExchangeOutcome> {
        self.inner.apply_exchange(address, amount).await
    }

    async fn flush(&self) -> StoreResult<()> {
        self.inner.flush().await
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        self.inner.stats().await
    }
}

#[tokio::test]
async fn test_full_event_lifecycle_with_check_in() {
    let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let clock = Arc::new(ManualClock::new(base_time()));
    let registry = EventRegistry::new(store.clone(), clock.clone())
        .await
        .unwrap();
    let scheduler = EventScheduler::new(store.clone(), clock.clone(), Duration::from_secs(60));
    let check_in = CheckInManager::new(store.clone(), clock.clone());

    println!("=== Creating event ===");
    let event = registry.create_event(draft(2)).await.unwrap();
    assert_eq!(event.status, EventStatus::Created);

    // Before the recruitment window opens, a tick changes nothing.
    let summary = scheduler.tick().await.unwrap();
    assert_eq!(summary.transitions, 0);

    println!("=== Recruitment opens ===");
    clock.set(event.recruit_start_at);
    scheduler.tick().await.unwrap();
    let current = registry.get_event(event.id).await.unwrap();
    assert_eq!(current.status, EventStatus::Recruiting);

    registry.register(event.id, user(1)).await.unwrap();
    registry.register(event.id, user(2)).await.unwrap();

    // Check-in cannot start while recruiting.
    assert!(matches!(
        check_in.activate(event.id).await,
        Err(LifecycleError::EventNotInProgress { .. })
    ));

    println!("=== Event starts ===");
    clock.set(event.event_start_at);
    scheduler.tick().await.unwrap();
    let current = registry.get_event(event.id).await.unwrap();
    assert_eq!(current.status, EventStatus::Progressing);

    let qr = check_in.activate(event.id).await.unwrap();
    check_in.scan(event.id, &qr.token, user(1)).await.unwrap();

    let current = registry.get_event(event.id).await.unwrap();
    assert_eq!(current.remaining, 1);

    println!("=== Event ends ===");
    clock.set(event.event_end_at);
    scheduler.tick().await.unwrap();
    let current = registry.get_event(event.id).await.unwrap();
    assert_eq!(current.status, EventStatus::Finished);

    let stored_qr = store.get_qr(event.id).await.unwrap().unwrap();
    assert!(!stored_qr.active);

    // The second registrant missed the window entirely.
    assert!(matches!(
        check_in.scan(event.id, &qr.token, user(2)).await,
        Err(LifecycleError::EventNotInProgress { .. })
    ));
    let entries = registry.list_entries(event.id).await.unwrap();
    assert!(entries[0].is_confirmed);
    assert!(!entries[1].is_confirmed);
}

#[tokio::test]
async fn test_fault_on_one_event_does_not_stall_others() {
    let faulty = Arc::new(FaultyBackend::new());
    let store: Arc<dyn Backend> = faulty.clone();
    let clock = Arc::new(ManualClock::new(base_time()));
    let registry = EventRegistry::new(store.clone(), clock.clone())
        .await
        .unwrap();
    let scheduler = EventScheduler::new(store.clone(), clock.clone(), Duration::from_secs(60));

    let stuck = registry.create_event(draft(5)).await.unwrap();
    let healthy = registry.create_event(draft(5)).await.unwrap();
    faulty.poison(stuck.id);

    clock.set(base_time() + chrono::Duration::hours(2));
    let summary = scheduler.tick().await.unwrap();
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.advanced, 1);

    assert_eq!(
        registry.get_event(stuck.id).await.unwrap().status,
        EventStatus::Created
    );
    assert_eq!(
        registry.get_event(healthy.id).await.unwrap().status,
        EventStatus::Recruiting
    );

    // Once the store recovers, the next pass catches the event up.
    faulty.heal(stuck.id);
    let summary = scheduler.tick().await.unwrap();
    assert_eq!(summary.failures, 0);
    assert_eq!(
        registry.get_event(stuck.id).await.unwrap().status,
        EventStatus::Recruiting
    );
}

#[tokio::test]
async fn test_repeated_ticks_change_nothing_new() {
    let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let clock = Arc::new(ManualClock::new(base_time()));
    let registry = EventRegistry::new(store.clone(), clock.clone())
        .await
        .unwrap();
    let scheduler = EventScheduler::new(store.clone(), clock.clone(), Duration::from_secs(60));

    for _ in 0..3 {
        registry.create_event(draft(5)).await.unwrap();
    }

    clock.set(base_time() + chrono::Duration::days(3));
    let first = scheduler.tick().await.unwrap();
    assert_eq!(first.advanced, 3);
    assert_eq!(first.transitions, 6);

    let second = scheduler.tick().await.unwrap();
    assert_eq!(second.advanced, 0);
    assert_eq!(second.transitions, 0);

    for event in registry.list_events().await.unwrap() {
        assert_eq!(event.status, EventStatus::Progressing);
    }
}

#[tokio::test]
async fn test_canceled_event_is_never_advanced() {
    let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let clock = Arc::new(ManualClock::new(base_time()));
    let registry = EventRegistry::new(store.clone(), clock.clone())
        .await
        .unwrap();
    let scheduler = EventScheduler::new(store.clone(), clock.clone(), Duration::from_secs(60));

    let event = registry.create_event(draft(5)).await.unwrap();
    registry.cancel(event.id).await.unwrap();

    clock.set(base_time() + chrono::Duration::days(10));
    let summary = scheduler.tick().await.unwrap();
    assert_eq!(summary.scanned, 0);
    assert_eq!(
        registry.get_event(event.id).await.unwrap().status,
        EventStatus::Canceled
    );
}
