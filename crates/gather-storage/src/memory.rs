use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::{
    Backend, ConfirmOutcome, ExchangeOutcome, GrantOutcome, IssueOutcome, StoreStats,
};
use crate::error::{Result, StoreError};
use gather_types::{Address, Badge, Event, EventEntry, EventId, EventStatus, Points, QrCode, Wallet};

/// In-memory backend used for tests and single-node development.
///
/// Multi-record commits take all the write locks they need before
/// mutating, always in declaration order (events, active, entries,
/// badges, qr_codes, wallets), so commits are atomic and lock-ordering
/// is deadlock-free.
pub struct MemoryBackend {
    events: Arc<RwLock<HashMap<EventId, Event>>>,
    /// Index of non-terminal event ids for the scheduler scan.
    active: Arc<RwLock<HashSet<EventId>>>,
    entries: Arc<RwLock<HashMap<(EventId, Address), EventEntry>>>,
    badges: Arc<RwLock<HashMap<EventId, Badge>>>,
    qr_codes: Arc<RwLock<HashMap<EventId, QrCode>>>,
    wallets: Arc<RwLock<HashMap<Address, Wallet>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(HashMap::new())),
            active: Arc::new(RwLock::new(HashSet::new())),
            entries: Arc::new(RwLock::new(HashMap::new())),
            badges: Arc::new(RwLock::new(HashMap::new())),
            qr_codes: Arc::new(RwLock::new(HashMap::new())),
            wallets: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn put_event(&self, event: &Event) -> Result<()> {
        let mut events = self.events.write().await;
        let mut active = self.active.write().await;
        if event.is_terminal() {
            active.remove(&event.id);
        } else {
            active.insert(event.id);
        }
        events.insert(event.id, event.clone());
        Ok(())
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
        Ok(self.events.read().await.get(&id).cloned())
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        let events = self.events.read().await;
        let mut all: Vec<Event> = events.values().cloned().collect();
        all.sort_by_key(|e| e.id);
        Ok(all)
    }

    async fn active_events(&self) -> Result<Vec<Event>> {
        let events = self.events.read().await;
        let active = self.active.read().await;
        let mut out: Vec<Event> = active
            .iter()
            .filter_map(|id| events.get(id).cloned())
            .collect();
        out.sort_by_key(|e| e.id);
        Ok(out)
    }

    async fn update_event_status(
        &self,
        id: EventId,
        expected: EventStatus,
        next: EventStatus,
    ) -> Result<bool> {
        let mut events = self.events.write().await;
        let mut active = self.active.write().await;
        let event = events.get_mut(&id).ok_or(StoreError::EventNotFound(id))?;
        if event.status != expected {
            return Ok(false);
        }
        event.status = next;
        event.updated_at = Utc::now();
        if event.status.is_terminal() {
            active.remove(&id);
        }
        Ok(true)
    }

    async fn delete_event(&self, id: EventId) -> Result<()> {
        let mut events = self.events.write().await;
        let mut active = self.active.write().await;
        let mut entries = self.entries.write().await;
        let mut badges = self.badges.write().await;
        let mut qr_codes = self.qr_codes.write().await;

        if events.remove(&id).is_none() {
            return Err(StoreError::EventNotFound(id));
        }
        active.remove(&id);
        entries.retain(|(event_id, _), _| *event_id != id);
        badges.remove(&id);
        qr_codes.remove(&id);
        Ok(())
    }

    async fn insert_entry(&self, entry: &EventEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        let key = (entry.event_id, entry.user);
        if entries.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!(
                "entry {}/{}",
                entry.event_id, entry.user
            )));
        }
        entries.insert(key, entry.clone());
        Ok(())
    }

    async fn put_entry(&self, entry: &EventEntry) -> Result<()> {
        self.entries
            .write()
            .await
            .insert((entry.event_id, entry.user), entry.clone());
        Ok(())
    }

    async fn get_entry(&self, event_id: EventId, user: Address) -> Result<Option<EventEntry>> {
        Ok(self.entries.read().await.get(&(event_id, user)).cloned())
    }

    async fn list_entries(&self, event_id: EventId) -> Result<Vec<EventEntry>> {
        let entries = self.entries.read().await;
        let mut out: Vec<EventEntry> = entries
            .values()
            .filter(|e| e.event_id == event_id)
            .cloned()
            .collect();
        out.sort_by_key(|e| (e.registered_at, e.user));
        Ok(out)
    }

    async fn confirm_entry(
        &self,
        event_id: EventId,
        user: Address,
        at: DateTime<Utc>,
    ) -> Result<ConfirmOutcome> {
        let mut events = self.events.write().await;
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&(event_id, user))
            .ok_or(StoreError::EntryNotFound(event_id, user))?;
        if entry.is_confirmed {
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }
        entry.is_confirmed = true;
        entry.confirmed_at = Some(at);
        if let Some(event) = events.get_mut(&event_id) {
            event.remaining = event.remaining.saturating_sub(1);
            event.updated_at = at;
        }
        Ok(ConfirmOutcome::Confirmed)
    }

    async fn insert_badge(&self, badge: &Badge) -> Result<()> {
        let mut badges = self.badges.write().await;
        if badges.contains_key(&badge.event_id) {
            return Err(StoreError::AlreadyExists(format!(
                "badge for {}",
                badge.event_id
            )));
        }
        badges.insert(badge.event_id, badge.clone());
        Ok(())
    }

    async fn get_badge(&self, event_id: EventId) -> Result<Option<Badge>> {
        Ok(self.badges.read().await.get(&event_id).cloned())
    }

    async fn apply_badge_issue(
        &self,
        event_id: EventId,
        user: Address,
        score: u64,
    ) -> Result<IssueOutcome> {
        let mut entries = self.entries.write().await;
        let mut badges = self.badges.write().await;
        let mut wallets = self.wallets.write().await;

        let entry = entries
            .get_mut(&(event_id, user))
            .ok_or(StoreError::EntryNotFound(event_id, user))?;
        if entry.is_badge_issued {
            return Ok(IssueOutcome::AlreadyIssued);
        }
        let badge = badges
            .get_mut(&event_id)
            .ok_or(StoreError::BadgeNotFound(event_id))?;
        if badge.remain_quantity == 0 {
            return Ok(IssueOutcome::SupplyExhausted);
        }

        entry.is_badge_issued = true;
        badge.remain_quantity -= 1;
        badge.owners.push(user);
        let wallet = wallets.entry(user).or_insert_with(|| Wallet::new(user));
        wallet.badge_count += 1;
        wallet.badge_score += score;
        Ok(IssueOutcome::Issued)
    }

    async fn put_qr(&self, qr: &QrCode) -> Result<()> {
        self.qr_codes.write().await.insert(qr.event_id, qr.clone());
        Ok(())
    }

    async fn get_qr(&self, event_id: EventId) -> Result<Option<QrCode>> {
        Ok(self.qr_codes.read().await.get(&event_id).cloned())
    }

    async fn set_qr_active(&self, event_id: EventId, active: bool) -> Result<bool> {
        let mut qr_codes = self.qr_codes.write().await;
        match qr_codes.get_mut(&event_id) {
            Some(qr) => {
                qr.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_qr_scanned(&self, event_id: EventId, at: DateTime<Utc>) -> Result<()> {
        let mut qr_codes = self.qr_codes.write().await;
        if let Some(qr) = qr_codes.get_mut(&event_id) {
            qr.last_scanned_at = Some(at);
        }
        Ok(())
    }

    async fn get_wallet(&self, address: Address) -> Result<Wallet> {
        Ok(self
            .wallets
            .read()
            .await
            .get(&address)
            .cloned()
            .unwrap_or_else(|| Wallet::new(address)))
    }

    async fn apply_review_grant(
        &self,
        event_id: EventId,
        user: Address,
        amount: Points,
    ) -> Result<GrantOutcome> {
        let mut entries = self.entries.write().await;
        let mut wallets = self.wallets.write().await;

        let entry = entries
            .get_mut(&(event_id, user))
            .ok_or(StoreError::EntryNotFound(event_id, user))?;
        if entry.is_reviewed {
            return Ok(GrantOutcome::AlreadyGranted);
        }
        entry.is_reviewed = true;
        let wallet = wallets.entry(user).or_insert_with(|| Wallet::new(user));
        wallet.mileage = wallet.mileage.saturating_add(amount);
        Ok(GrantOutcome::Granted {
            balance: wallet.mileage,
        })
    }

    async fn apply_exchange(&self, address: Address, amount: Points) -> Result<ExchangeOutcome> {
        let mut wallets = self.wallets.write().await;
        let wallet = wallets
            .entry(address)
            .or_insert_with(|| Wallet::new(address));
        match wallet.mileage.checked_sub(amount) {
            Some(rest) => {
                wallet.mileage = rest;
                wallet.tokens = wallet.tokens.saturating_add(amount);
                Ok(ExchangeOutcome::Settled {
                    mileage: wallet.mileage,
                    tokens: wallet.tokens,
                })
            }
            None => Ok(ExchangeOutcome::InsufficientMileage {
                available: wallet.mileage,
            }),
        }
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            event_count: self.events.read().await.len(),
            active_event_count: self.active.read().await.len(),
            entry_count: self.entries.read().await.len(),
            badge_count: self.badges.read().await.len(),
            wallet_count: self.wallets.read().await.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gather_types::{BadgeKind, EventDraft, EventKind, TokenId};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn test_event(id: u64) -> Event {
        let base = base_time();
        let draft = EventDraft {
            title: format!("Event {}", id),
            content: "content".into(),
            location: "hall".into(),
            capacity: 10,
            kind: EventKind::Fcfs,
            recruit_start_at: base,
            recruit_end_at: base + chrono::Duration::days(1),
            event_start_at: base + chrono::Duration::days(2),
            event_end_at: base + chrono::Duration::days(3),
        };
        Event::from_draft(EventId::new(id), draft, base)
    }

    fn test_badge(event_id: EventId, quantity: u32) -> Badge {
        Badge {
            event_id,
            token_id: TokenId::new(1),
            kind: BadgeKind::Attendance,
            name: "Attendee".into(),
            metadata_uri: "ipfs://meta".into(),
            initial_quantity: quantity,
            remain_quantity: quantity,
            owners: Vec::new(),
            created_at: base_time(),
        }
    }

    fn user(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    #[tokio::test]
    async fn test_status_cas_only_applies_on_expected_state() {
        let backend = MemoryBackend::new();
        let event = test_event(1);
        backend.put_event(&event).await.unwrap();

        let applied = backend
            .update_event_status(event.id, EventStatus::Created, EventStatus::Recruiting)
            .await
            .unwrap();
        assert!(applied);

        // Same transition again: pre-state no longer matches.
        let applied = backend
            .update_event_status(event.id, EventStatus::Created, EventStatus::Recruiting)
            .await
            .unwrap();
        assert!(!applied);

        let stored = backend.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Recruiting);
    }

    #[tokio::test]
    async fn test_terminal_status_leaves_active_index() {
        let backend = MemoryBackend::new();
        let event = test_event(1);
        backend.put_event(&event).await.unwrap();
        assert_eq!(backend.active_events().await.unwrap().len(), 1);

        backend
            .update_event_status(event.id, EventStatus::Created, EventStatus::Canceled)
            .await
            .unwrap();
        assert!(backend.active_events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_entry_latches_once_and_decrements_remaining() {
        let backend = MemoryBackend::new();
        let event = test_event(1);
        backend.put_event(&event).await.unwrap();
        let entry = EventEntry::new(event.id, user(1), base_time());
        backend.insert_entry(&entry).await.unwrap();

        let outcome = backend
            .confirm_entry(event.id, user(1), base_time())
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmOutcome::Confirmed);

        let outcome = backend
            .confirm_entry(event.id, user(1), base_time())
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmOutcome::AlreadyConfirmed);

        let stored = backend.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(stored.remaining, event.capacity - 1);
    }

    #[tokio::test]
    async fn test_duplicate_entry_rejected() {
        let backend = MemoryBackend::new();
        let entry = EventEntry::new(EventId::new(1), user(1), base_time());
        backend.insert_entry(&entry).await.unwrap();
        assert!(matches!(
            backend.insert_entry(&entry).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_badge_issue_commits_all_effects() {
        let backend = MemoryBackend::new();
        let event = test_event(1);
        backend.put_event(&event).await.unwrap();
        backend.insert_entry(&EventEntry::new(event.id, user(1), base_time())).await.unwrap();
        backend.insert_badge(&test_badge(event.id, 2)).await.unwrap();

        let outcome = backend
            .apply_badge_issue(event.id, user(1), BadgeKind::Attendance.score())
            .await
            .unwrap();
        assert_eq!(outcome, IssueOutcome::Issued);

        let badge = backend.get_badge(event.id).await.unwrap().unwrap();
        assert_eq!(badge.remain_quantity, 1);
        assert_eq!(badge.owners, vec![user(1)]);

        let entry = backend.get_entry(event.id, user(1)).await.unwrap().unwrap();
        assert!(entry.is_badge_issued);

        let wallet = backend.get_wallet(user(1)).await.unwrap();
        assert_eq!(wallet.badge_count, 1);
        assert_eq!(wallet.badge_score, BadgeKind::Attendance.score());
    }

    #[tokio::test]
    async fn test_badge_issue_latch_and_supply_guard() {
        let backend = MemoryBackend::new();
        let event = test_event(1);
        backend.put_event(&event).await.unwrap();
        backend.insert_entry(&EventEntry::new(event.id, user(1), base_time())).await.unwrap();
        backend.insert_entry(&EventEntry::new(event.id, user(2), base_time())).await.unwrap();
        backend.insert_badge(&test_badge(event.id, 1)).await.unwrap();

        assert_eq!(
            backend.apply_badge_issue(event.id, user(1), 10).await.unwrap(),
            IssueOutcome::Issued
        );
        assert_eq!(
            backend.apply_badge_issue(event.id, user(1), 10).await.unwrap(),
            IssueOutcome::AlreadyIssued
        );
        assert_eq!(
            backend.apply_badge_issue(event.id, user(2), 10).await.unwrap(),
            IssueOutcome::SupplyExhausted
        );

        let badge = backend.get_badge(event.id).await.unwrap().unwrap();
        assert_eq!(badge.remain_quantity, 0);
        assert_eq!(badge.owners.len(), 1);

        // Nothing was credited for the refused issue.
        let wallet = backend.get_wallet(user(2)).await.unwrap();
        assert_eq!(wallet.badge_count, 0);
    }

    #[tokio::test]
    async fn test_review_grant_latches_once() {
        let backend = MemoryBackend::new();
        let event = test_event(1);
        backend.put_event(&event).await.unwrap();
        backend.insert_entry(&EventEntry::new(event.id, user(1), base_time())).await.unwrap();

        let outcome = backend
            .apply_review_grant(event.id, user(1), Points::new(3))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            GrantOutcome::Granted {
                balance: Points::new(3)
            }
        );

        let outcome = backend
            .apply_review_grant(event.id, user(1), Points::new(3))
            .await
            .unwrap();
        assert_eq!(outcome, GrantOutcome::AlreadyGranted);

        let wallet = backend.get_wallet(user(1)).await.unwrap();
        assert_eq!(wallet.mileage, Points::new(3));
    }

    #[tokio::test]
    async fn test_exchange_settles_or_refuses_atomically() {
        let backend = MemoryBackend::new();
        let event = test_event(1);
        backend.put_event(&event).await.unwrap();
        backend.insert_entry(&EventEntry::new(event.id, user(1), base_time())).await.unwrap();
        backend
            .apply_review_grant(event.id, user(1), Points::new(7))
            .await
            .unwrap();

        let outcome = backend
            .apply_exchange(user(1), Points::new(7))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ExchangeOutcome::Settled {
                mileage: Points::ZERO,
                tokens: Points::new(7)
            }
        );

        let outcome = backend
            .apply_exchange(user(1), Points::new(1))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ExchangeOutcome::InsufficientMileage {
                available: Points::ZERO
            }
        );

        let wallet = backend.get_wallet(user(1)).await.unwrap();
        assert_eq!(wallet.tokens, Points::new(7));
        assert_eq!(wallet.mileage, Points::ZERO);
    }

    #[tokio::test]
    async fn test_delete_event_cascades() {
        let backend = MemoryBackend::new();
        let event = test_event(1);
        backend.put_event(&event).await.unwrap();
        backend.insert_entry(&EventEntry::new(event.id, user(1), base_time())).await.unwrap();
        backend.insert_badge(&test_badge(event.id, 1)).await.unwrap();
        backend
            .put_qr(&QrCode::new(event.id, "tok".into(), base_time()))
            .await
            .unwrap();

        backend.delete_event(event.id).await.unwrap();

        assert!(backend.get_event(event.id).await.unwrap().is_none());
        assert!(backend.get_entry(event.id, user(1)).await.unwrap().is_none());
        assert!(backend.get_badge(event.id).await.unwrap().is_none());
        assert!(backend.get_qr(event.id).await.unwrap().is_none());

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.event_count, 0);
        assert_eq!(stats.entry_count, 0);
    }

    #[tokio::test]
    async fn test_list_entries_registration_order() {
        let backend = MemoryBackend::new();
        let id = EventId::new(1);
        let t0 = base_time();
        let mut first = EventEntry::new(id, user(2), t0);
        first.registered_at = t0;
        let mut second = EventEntry::new(id, user(1), t0 + chrono::Duration::minutes(5));
        second.registered_at = t0 + chrono::Duration::minutes(5);
        backend.insert_entry(&second).await.unwrap();
        backend.insert_entry(&first).await.unwrap();

        let listed = backend.list_entries(id).await.unwrap();
        assert_eq!(listed[0].user, user(2));
        assert_eq!(listed[1].user, user(1));
    }
}
