use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{Result, RewardError};
use crate::locks::KeyedLocks;
use gather_chain::{ChainClient, ChainError, MetadataStore};
use gather_storage::{Backend, IssueOutcome, StoreError};
use gather_types::{
    Address, Badge, BadgeDraft, BadgeMetadata, EventId, EventStatus, TxHash,
};

/// Outcome of one recipient's badge issue within a distribution run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecipientOutcome {
    /// Ledger transfer confirmed and local records committed.
    Issued { tx_hash: TxHash },
    /// Latch was already set; nothing was transferred.
    AlreadyIssued,
    /// No supply left for this recipient. Later runs will report the
    /// same until supply is topped up on a new badge, which never
    /// happens today, so this is effectively final for them.
    InsufficientSupply,
    /// Transfer failed or its outcome is unknown; the entry stays
    /// eligible and a later run retries it.
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipientReport {
    pub user: Address,
    pub outcome: RecipientOutcome,
}

/// Per-recipient results of one distribution run. Partial failure is
/// normal here; callers inspect the rows rather than an all-or-nothing
/// status.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionReport {
    pub event_id: EventId,
    pub outcomes: Vec<RecipientReport>,
}

impl DistributionReport {
    pub fn issued(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|r| matches!(r.outcome, RecipientOutcome::Issued { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|r| matches!(r.outcome, RecipientOutcome::Failed { .. }))
            .count()
    }
}

/// Badge creation and distribution against the external ledger.
///
/// The per-event lock serializes creation and distribution runs for one
/// event, so overlapping triggers cannot double-call the ledger or
/// overdraw supply across recipients. The entry latch inside the storage
/// commit stays as the final guard either way.
pub struct BadgeIssuer {
    store: Arc<dyn Backend>,
    chain: Arc<dyn ChainClient>,
    metadata: Arc<dyn MetadataStore>,
    /// Account that holds minted badge supply and funds transfers.
    treasury: Address,
    event_locks: KeyedLocks<EventId>,
}

impl BadgeIssuer {
    pub fn new(
        store: Arc<dyn Backend>,
        chain: Arc<dyn ChainClient>,
        metadata: Arc<dyn MetadataStore>,
        treasury: Address,
    ) -> Self {
        Self {
            store,
            chain,
            metadata,
            treasury,
            event_locks: KeyedLocks::new(),
        }
    }

    /// Pins metadata, mints the fixed supply on the ledger, and records
    /// the badge. Nothing is persisted unless the mint confirms; one
    /// badge per event.
    pub async fn create_badge(&self, event_id: EventId, draft: BadgeDraft) -> Result<Badge> {
        if draft.quantity == 0 {
            return Err(RewardError::InvalidQuantity);
        }
        self.store
            .get_event(event_id)
            .await?
            .ok_or(RewardError::EventNotFound(event_id))?;

        let _guard = self.event_locks.acquire(event_id).await;
        if self.store.get_badge(event_id).await?.is_some() {
            return Err(RewardError::BadgeExists(event_id));
        }

        let metadata = BadgeMetadata {
            name: draft.name.clone(),
            description: draft.description,
            image: draft.image,
            kind: draft.kind,
        };
        let content = self.metadata.pin(&metadata).await?;
        let token_id = self
            .chain
            .mint_badge(self.treasury, draft.kind, draft.quantity, &content.as_uri())
            .await?;

        let badge = Badge {
            event_id,
            token_id,
            kind: draft.kind,
            name: draft.name,
            metadata_uri: content.as_uri(),
            initial_quantity: draft.quantity,
            remain_quantity: draft.quantity,
            owners: Vec::new(),
            created_at: Utc::now(),
        };
        match self.store.insert_badge(&badge).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) => return Err(RewardError::BadgeExists(event_id)),
            Err(e) => {
                // The mint confirmed; the orphaned token needs manual
                // reconciliation.
                error!(
                    event_id = %event_id,
                    token_id = %token_id,
                    error = %e,
                    "Badge minted but record not persisted"
                );
                return Err(e.into());
            }
        }

        info!(
            event_id = %event_id,
            token_id = %token_id,
            kind = %badge.kind,
            quantity = badge.initial_quantity,
            "✅ Badge minted and recorded"
        );
        Ok(badge)
    }

    /// Issues the event's badge to every confirmed, not-yet-issued
    /// entry. Individual failures are reported per recipient and leave
    /// those entries eligible for the next run.
    pub async fn distribute(&self, event_id: EventId) -> Result<DistributionReport> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(RewardError::EventNotFound(event_id))?;
        if event.status != EventStatus::Finished {
            return Err(RewardError::EventNotFinished {
                event_id,
                status: event.status,
            });
        }

        let _guard = self.event_locks.acquire(event_id).await;
        self.store
            .get_badge(event_id)
            .await?
            .ok_or(RewardError::BadgeNotFound(event_id))?;

        let recipients: Vec<Address> = self
            .store
            .list_entries(event_id)
            .await?
            .iter()
            .filter(|e| e.is_confirmed && !e.is_badge_issued)
            .map(|e| e.user)
            .collect();

        let mut report = DistributionReport {
            event_id,
            outcomes: Vec::with_capacity(recipients.len()),
        };
        for user in recipients {
            let outcome = match self.issue_one(event_id, user).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(event_id = %event_id, user = %user, error = %e, "Badge issue failed");
                    RecipientOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.outcomes.push(RecipientReport { user, outcome });
        }

        info!(
            event_id = %event_id,
            eligible = report.outcomes.len(),
            issued = report.issued(),
            failed = report.failed(),
            "📊 Badge distribution complete"
        );
        Ok(report)
    }

    pub async fn badge(&self, event_id: EventId) -> Result<Badge> {
        self.store
            .get_badge(event_id)
            .await?
            .ok_or(RewardError::BadgeNotFound(event_id))
    }

    /// One recipient: supply check, ledger transfer, then the latch
    /// commit. Called with the event lock held; no store lock is held
    /// across the transfer itself.
    async fn issue_one(&self, event_id: EventId, user: Address) -> Result<RecipientOutcome> {
        let badge = self
            .store
            .get_badge(event_id)
            .await?
            .ok_or(RewardError::BadgeNotFound(event_id))?;
        if badge.remain_quantity == 0 {
            return Ok(RecipientOutcome::InsufficientSupply);
        }

        let receipt = match self
            .chain
            .transfer_badge(self.treasury, user, badge.token_id, 1)
            .await
        {
            Ok(receipt) => receipt,
            Err(e @ ChainError::Timeout(_)) => {
                warn!(
                    event_id = %event_id,
                    user = %user,
                    error = %e,
                    "Badge transfer outcome unknown, entry left eligible"
                );
                return Ok(RecipientOutcome::Failed {
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                warn!(event_id = %event_id, user = %user, error = %e, "Badge transfer failed");
                return Ok(RecipientOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        };

        match self
            .store
            .apply_badge_issue(event_id, user, badge.kind.score())
            .await?
        {
            IssueOutcome::Issued => {
                info!(event_id = %event_id, user = %user, tx_hash = %receipt.tx_hash, "✅ Badge issued");
                Ok(RecipientOutcome::Issued {
                    tx_hash: receipt.tx_hash,
                })
            }
            IssueOutcome::AlreadyIssued => {
                warn!(
                    event_id = %event_id,
                    user = %user,
                    "Transfer confirmed for an already-issued entry, needs reconciliation"
                );
                Ok(RecipientOutcome::AlreadyIssued)
            }
            IssueOutcome::SupplyExhausted => {
                error!(
                    event_id = %event_id,
                    user = %user,
                    "Transfer confirmed but supply bookkeeping refused, needs reconciliation"
                );
                Ok(RecipientOutcome::InsufficientSupply)
            }
        }
    }
}
