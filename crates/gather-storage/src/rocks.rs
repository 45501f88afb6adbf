use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::backend::{
    Backend, ConfirmOutcome, ExchangeOutcome, GrantOutcome, IssueOutcome, StoreStats,
};
use crate::error::{Result, StoreError};
use gather_types::{Address, Badge, Event, EventEntry, EventId, EventStatus, Points, QrCode, Wallet};

/// RocksDB backend for durable single-node deployments.
///
/// Guarded commits are read-check-write with a `WriteBatch`, which is
/// atomic on disk. The node is the sole writer of its database and the
/// service layer serializes work per (event, user), so no cross-process
/// conditional writes are needed.
pub struct RocksBackend {
    db: Arc<DB>,
}

impl RocksBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let db = DB::open(&opts, path)
            .map_err(|e| StoreError::Backend(format!("Failed to open RocksDB: {}", e)))?;
        Ok(Self { db: Arc::new(db) })
    }

    fn event_key(id: EventId) -> Vec<u8> {
        format!("evt:{}", id.value()).into_bytes()
    }

    fn active_key(id: EventId) -> Vec<u8> {
        format!("act:{}", id.value()).into_bytes()
    }

    fn entry_key(event_id: EventId, user: Address) -> Vec<u8> {
        format!("ent:{}:{}", event_id.value(), hex::encode(user.as_bytes())).into_bytes()
    }

    fn entry_prefix(event_id: EventId) -> Vec<u8> {
        format!("ent:{}:", event_id.value()).into_bytes()
    }

    fn badge_key(event_id: EventId) -> Vec<u8> {
        format!("bdg:{}", event_id.value()).into_bytes()
    }

    fn qr_key(event_id: EventId) -> Vec<u8> {
        format!("qr:{}", event_id.value()).into_bytes()
    }

    fn wallet_key(address: Address) -> Vec<u8> {
        format!("wal:{}", hex::encode(address.as_bytes())).into_bytes()
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
        serde_json::from_slice(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_value<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.db.get(key) {
            Ok(Some(data)) => Ok(Some(Self::decode(&data)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Backend(format!("RocksDB get error: {}", e))),
        }
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));
        let mut out = Vec::new();
        for item in iter {
            let (key, value) =
                item.map_err(|e| StoreError::Backend(format!("Iterator error: {}", e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Backend(format!("RocksDB batch write error: {}", e)))
    }
}

#[async_trait]
impl Backend for RocksBackend {
    async fn put_event(&self, event: &Event) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put(Self::event_key(event.id), Self::encode(event)?);
        if event.is_terminal() {
            batch.delete(Self::active_key(event.id));
        } else {
            batch.put(Self::active_key(event.id), b"1");
        }
        self.write_batch(batch)
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
        self.get_value(&Self::event_key(id))
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for (_, value) in self.scan_prefix(b"evt:")? {
            events.push(Self::decode::<Event>(&value)?);
        }
        events.sort_by_key(|e| e.id);
        Ok(events)
    }

    async fn active_events(&self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for (key, _) in self.scan_prefix(b"act:")? {
            let id_str = std::str::from_utf8(&key[4..])
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            let id = id_str
                .parse::<u64>()
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if let Some(event) = self.get_value::<Event>(&Self::event_key(EventId::new(id)))? {
                events.push(event);
            }
        }
        events.sort_by_key(|e| e.id);
        Ok(events)
    }

    async fn update_event_status(
        &self,
        id: EventId,
        expected: EventStatus,
        next: EventStatus,
    ) -> Result<bool> {
        let mut event: Event = self
            .get_value(&Self::event_key(id))?
            .ok_or(StoreError::EventNotFound(id))?;
        if event.status != expected {
            return Ok(false);
        }
        event.status = next;
        event.updated_at = Utc::now();

        let mut batch = WriteBatch::default();
        batch.put(Self::event_key(id), Self::encode(&event)?);
        if event.is_terminal() {
            batch.delete(Self::active_key(id));
        }
        self.write_batch(batch)?;
        Ok(true)
    }

    async fn delete_event(&self, id: EventId) -> Result<()> {
        if self.get_value::<Event>(&Self::event_key(id))?.is_none() {
            return Err(StoreError::EventNotFound(id));
        }
        let mut batch = WriteBatch::default();
        batch.delete(Self::event_key(id));
        batch.delete(Self::active_key(id));
        batch.delete(Self::badge_key(id));
        batch.delete(Self::qr_key(id));
        for (key, _) in self.scan_prefix(&Self::entry_prefix(id))? {
            batch.delete(key);
        }
        self.write_batch(batch)
    }

    async fn insert_entry(&self, entry: &EventEntry) -> Result<()> {
        let key = Self::entry_key(entry.event_id, entry.user);
        if self.get_value::<EventEntry>(&key)?.is_some() {
            return Err(StoreError::AlreadyExists(format!(
                "entry {}/{}",
                entry.event_id, entry.user
            )));
        }
        self.db
            .put(key, Self::encode(entry)?)
            .map_err(|e| StoreError::Backend(format!("RocksDB put error: {}", e)))
    }

    async fn put_entry(&self, entry: &EventEntry) -> Result<()> {
        self.db
            .put(
                Self::entry_key(entry.event_id, entry.user),
                Self::encode(entry)?,
            )
            .map_err(|e| StoreError::Backend(format!("RocksDB put error: {}", e)))
    }

    async fn get_entry(&self, event_id: EventId, user: Address) -> Result<Option<EventEntry>> {
        self.get_value(&Self::entry_key(event_id, user))
    }

    async fn list_entries(&self, event_id: EventId) -> Result<Vec<EventEntry>> {
        let mut entries = Vec::new();
        for (_, value) in self.scan_prefix(&Self::entry_prefix(event_id))? {
            entries.push(Self::decode::<EventEntry>(&value)?);
        }
        entries.sort_by_key(|e| (e.registered_at, e.user));
        Ok(entries)
    }

    async fn confirm_entry(
        &self,
        event_id: EventId,
        user: Address,
        at: DateTime<Utc>,
    ) -> Result<ConfirmOutcome> {
        let entry_key = Self::entry_key(event_id, user);
        let mut entry: EventEntry = self
            .get_value(&entry_key)?
            .ok_or(StoreError::EntryNotFound(event_id, user))?;
        if entry.is_confirmed {
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }
        entry.is_confirmed = true;
        entry.confirmed_at = Some(at);

        let mut batch = WriteBatch::default();
        batch.put(entry_key, Self::encode(&entry)?);
        if let Some(mut event) = self.get_value::<Event>(&Self::event_key(event_id))? {
            event.remaining = event.remaining.saturating_sub(1);
            event.updated_at = at;
            batch.put(Self::event_key(event_id), Self::encode(&event)?);
        }
        self.write_batch(batch)?;
        Ok(ConfirmOutcome::Confirmed)
    }

    async fn insert_badge(&self, badge: &Badge) -> Result<()> {
        let key = Self::badge_key(badge.event_id);
        if self.get_value::<Badge>(&key)?.is_some() {
            return Err(StoreError::AlreadyExists(format!(
                "badge for {}",
                badge.event_id
            )));
        }
        self.db
            .put(key, Self::encode(badge)?)
            .map_err(|e| StoreError::Backend(format!("RocksDB put error: {}", e)))
    }

    async fn get_badge(&self, event_id: EventId) -> Result<Option<Badge>> {
        self.get_value(&Self::badge_key(event_id))
    }

    async fn apply_badge_issue(
        &self,
        event_id: EventId,
        user: Address,
        score: u64,
    ) -> Result<IssueOutcome> {
        let entry_key = Self::entry_key(event_id, user);
        let mut entry: EventEntry = self
            .get_value(&entry_key)?
            .ok_or(StoreError::EntryNotFound(event_id, user))?;
        if entry.is_badge_issued {
            return Ok(IssueOutcome::AlreadyIssued);
        }
        let mut badge: Badge = self
            .get_value(&Self::badge_key(event_id))?
            .ok_or(StoreError::BadgeNotFound(event_id))?;
        if badge.remain_quantity == 0 {
            return Ok(IssueOutcome::SupplyExhausted);
        }

        entry.is_badge_issued = true;
        badge.remain_quantity -= 1;
        badge.owners.push(user);
        let mut wallet: Wallet = self
            .get_value(&Self::wallet_key(user))?
            .unwrap_or_else(|| Wallet::new(user));
        wallet.badge_count += 1;
        wallet.badge_score += score;

        let mut batch = WriteBatch::default();
        batch.put(entry_key, Self::encode(&entry)?);
        batch.put(Self::badge_key(event_id), Self::encode(&badge)?);
        batch.put(Self::wallet_key(user), Self::encode(&wallet)?);
        self.write_batch(batch)?;
        Ok(IssueOutcome::Issued)
    }

    async fn put_qr(&self, qr: &QrCode) -> Result<()> {
        self.db
            .put(Self::qr_key(qr.event_id), Self::encode(qr)?)
            .map_err(|e| StoreError::Backend(format!("RocksDB put error: {}", e)))
    }

    async fn get_qr(&self, event_id: EventId) -> Result<Option<QrCode>> {
        self.get_value(&Self::qr_key(event_id))
    }

    async fn set_qr_active(&self, event_id: EventId, active: bool) -> Result<bool> {
        match self.get_value::<QrCode>(&Self::qr_key(event_id))? {
            Some(mut qr) => {
                qr.active = active;
                self.db
                    .put(Self::qr_key(event_id), Self::encode(&qr)?)
                    .map_err(|e| StoreError::Backend(format!("RocksDB put error: {}", e)))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_qr_scanned(&self, event_id: EventId, at: DateTime<Utc>) -> Result<()> {
        if let Some(mut qr) = self.get_value::<QrCode>(&Self::qr_key(event_id))? {
            qr.last_scanned_at = Some(at);
            self.db
                .put(Self::qr_key(event_id), Self::encode(&qr)?)
                .map_err(|e| StoreError::Backend(format!("RocksDB put error: {}", e)))?;
        }
        Ok(())
    }

    async fn get_wallet(&self, address: Address) -> Result<Wallet> {
        Ok(self
            .get_value(&Self::wallet_key(address))?
            .unwrap_or_else(|| Wallet::new(address)))
    }

    async fn apply_review_grant(
        &self,
        event_id: EventId,
        user: Address,
        amount: Points,
    ) -> Result<GrantOutcome> {
        let entry_key = Self::entry_key(event_id, user);
        let mut entry: EventEntry = self
            .get_value(&entry_key)?
            .ok_or(StoreError::EntryNotFound(event_id, user))?;
        if entry.is_reviewed {
            return Ok(GrantOutcome::AlreadyGranted);
        }
        entry.is_reviewed = true;
        let mut wallet: Wallet = self
            .get_value(&Self::wallet_key(user))?
            .unwrap_or_else(|| Wallet::new(user));
        wallet.mileage = wallet.mileage.saturating_add(amount);

        let mut batch = WriteBatch::default();
        batch.put(entry_key, Self::encode(&entry)?);
        batch.put(Self::wallet_key(user), Self::encode(&wallet)?);
        self.write_batch(batch)?;
        Ok(GrantOutcome::Granted {
            balance: wallet.mileage,
        })
    }

    async fn apply_exchange(&self, address: Address, amount: Points) -> Result<ExchangeOutcome> {
        let mut wallet: Wallet = self
            .get_value(&Self::wallet_key(address))?
            .unwrap_or_else(|| Wallet::new(address));
        match wallet.mileage.checked_sub(amount) {
            Some(rest) => {
                wallet.mileage = rest;
                wallet.tokens = wallet.tokens.saturating_add(amount);
                self.db
                    .put(Self::wallet_key(address), Self::encode(&wallet)?)
                    .map_err(|e| StoreError::Backend(format!("RocksDB put error: {}", e)))?;
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
        self.db
            .flush()
            .map_err(|e| StoreError::Backend(format!("RocksDB flush error: {}", e)))
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            event_count: self.scan_prefix(b"evt:")?.len(),
            active_event_count: self.scan_prefix(b"act:")?.len(),
            entry_count: self.scan_prefix(b"ent:")?.len(),
            badge_count: self.scan_prefix(b"bdg:")?.len(),
            wallet_count: self.scan_prefix(b"wal:")?.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gather_types::{BadgeKind, EventDraft, EventKind, TokenId};
    use tempfile::TempDir;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn test_event(id: u64) -> Event {
        let base = base_time();
        let draft = EventDraft {
            title: format!("Event {}", id),
            content: "content".into(),
            location: "hall".into(),
            capacity: 5,
            kind: EventKind::Fcfs,
            recruit_start_at: base,
            recruit_end_at: base + chrono::Duration::days(1),
            event_start_at: base + chrono::Duration::days(2),
            event_end_at: base + chrono::Duration::days(3),
        };
        Event::from_draft(EventId::new(id), draft, base)
    }

    fn user(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    #[tokio::test]
    async fn test_event_roundtrip_and_active_index() {
        let dir = TempDir::new().unwrap();
        let backend = RocksBackend::new(dir.path()).unwrap();

        let event = test_event(1);
        backend.put_event(&event).await.unwrap();
        assert_eq!(backend.active_events().await.unwrap().len(), 1);

        let applied = backend
            .update_event_status(event.id, EventStatus::Created, EventStatus::Canceled)
            .await
            .unwrap();
        assert!(applied);
        assert!(backend.active_events().await.unwrap().is_empty());

        let stored = backend.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Canceled);
    }

    #[tokio::test]
    async fn test_status_cas_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let backend = RocksBackend::new(dir.path()).unwrap();
        let event = test_event(1);
        backend.put_event(&event).await.unwrap();

        let applied = backend
            .update_event_status(event.id, EventStatus::Recruiting, EventStatus::Progressing)
            .await
            .unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn test_entry_and_badge_commit_roundtrip() {
        let dir = TempDir::new().unwrap();
        let backend = RocksBackend::new(dir.path()).unwrap();
        let event = test_event(1);
        backend.put_event(&event).await.unwrap();

        let entry = EventEntry::new(event.id, user(1), base_time());
        backend.insert_entry(&entry).await.unwrap();
        assert!(backend.insert_entry(&entry).await.is_err());

        backend
            .confirm_entry(event.id, user(1), base_time())
            .await
            .unwrap();

        let badge = Badge {
            event_id: event.id,
            token_id: TokenId::new(9),
            kind: BadgeKind::Silver,
            name: "Finisher".into(),
            metadata_uri: "ipfs://meta".into(),
            initial_quantity: 1,
            remain_quantity: 1,
            owners: Vec::new(),
            created_at: base_time(),
        };
        backend.insert_badge(&badge).await.unwrap();

        assert_eq!(
            backend
                .apply_badge_issue(event.id, user(1), badge.kind.score())
                .await
                .unwrap(),
            IssueOutcome::Issued
        );
        assert_eq!(
            backend
                .apply_badge_issue(event.id, user(1), badge.kind.score())
                .await
                .unwrap(),
            IssueOutcome::AlreadyIssued
        );

        let stored = backend.get_badge(event.id).await.unwrap().unwrap();
        assert_eq!(stored.remain_quantity, 0);
        let wallet = backend.get_wallet(user(1)).await.unwrap();
        assert_eq!(wallet.badge_score, BadgeKind::Silver.score());
    }

    #[tokio::test]
    async fn test_wallet_grant_and_exchange_persist() {
        let dir = TempDir::new().unwrap();
        let backend = RocksBackend::new(dir.path()).unwrap();
        let event = test_event(1);
        backend.put_event(&event).await.unwrap();
        backend
            .insert_entry(&EventEntry::new(event.id, user(2), base_time()))
            .await
            .unwrap();

        backend
            .apply_review_grant(event.id, user(2), Points::new(6))
            .await
            .unwrap();
        let outcome = backend
            .apply_exchange(user(2), Points::new(6))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ExchangeOutcome::Settled {
                mileage: Points::ZERO,
                tokens: Points::new(6)
            }
        );
    }

    #[tokio::test]
    async fn test_delete_event_cascades() {
        let dir = TempDir::new().unwrap();
        let backend = RocksBackend::new(dir.path()).unwrap();
        let event = test_event(1);
        backend.put_event(&event).await.unwrap();
        backend
            .insert_entry(&EventEntry::new(event.id, user(1), base_time()))
            .await
            .unwrap();
        backend
            .put_qr(&QrCode::new(event.id, "tok".into(), base_time()))
            .await
            .unwrap();

        backend.delete_event(event.id).await.unwrap();
        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.event_count, 0);
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.wallet_count, 0);
    }
}
