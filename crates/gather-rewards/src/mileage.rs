use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{Result, RewardError};
use crate::locks::KeyedLocks;
use gather_chain::{ChainClient, ChainError};
use gather_storage::{Backend, ExchangeOutcome, GrantOutcome, StoreError};
use gather_types::{Address, EventId, Points, TxHash, Wallet};

/// Fixed parameters for review rewards and mileage exchanges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardPolicy {
    /// Mileage granted per accepted review.
    pub review_reward: Points,
    /// Minimum mileage balance required to exchange.
    pub exchange_threshold: Points,
    /// Account the fungible tokens are paid out from.
    pub treasury: Address,
    /// Account whose allowance over the treasury funds transfer-from
    /// calls.
    pub operator: Address,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            review_reward: Points::new(1),
            exchange_threshold: Points::new(5),
            treasury: Address::ZERO,
            operator: Address::ZERO,
        }
    }
}

/// Settled exchange: the on-ledger receipt plus the wallet balances
/// after the commit.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeReceipt {
    pub user: Address,
    pub amount: Points,
    pub tx_hash: TxHash,
    pub mileage: Points,
    pub tokens: Points,
}

/// Review mileage grants and mileage-for-token exchanges.
///
/// Grants are purely local latched commits. Exchanges call the ledger;
/// the per-user lock keeps a user to one in-flight exchange so a retry
/// storm cannot debit twice, while grants and reads stay lock-free.
pub struct MileageManager {
    store: Arc<dyn Backend>,
    chain: Arc<dyn ChainClient>,
    policy: RewardPolicy,
    exchange_locks: KeyedLocks<Address>,
}

impl MileageManager {
    pub fn new(store: Arc<dyn Backend>, chain: Arc<dyn ChainClient>, policy: RewardPolicy) -> Self {
        Self {
            store,
            chain,
            policy,
            exchange_locks: KeyedLocks::new(),
        }
    }

    pub fn policy(&self) -> &RewardPolicy {
        &self.policy
    }

    /// Credits the fixed review reward once per (event, user). The latch
    /// and the credit land in one storage commit.
    pub async fn grant_review_mileage(&self, event_id: EventId, user: Address) -> Result<Points> {
        let outcome = self
            .store
            .apply_review_grant(event_id, user, self.policy.review_reward)
            .await
            .map_err(|e| match e {
                StoreError::EntryNotFound(event_id, user) => {
                    RewardError::EntryNotFound { event_id, user }
                }
                other => other.into(),
            })?;

        match outcome {
            GrantOutcome::Granted { balance } => {
                info!(
                    event_id = %event_id,
                    user = %user,
                    amount = %self.policy.review_reward,
                    balance = %balance,
                    "💰 Review mileage granted"
                );
                Ok(balance)
            }
            GrantOutcome::AlreadyGranted => Err(RewardError::AlreadyRewarded { event_id, user }),
        }
    }

    /// Exchanges the user's entire mileage balance for fungible tokens,
    /// paid from the treasury. Local counters move only after the ledger
    /// confirms, in one commit that debits mileage and credits tokens
    /// together.
    pub async fn exchange_mileage(&self, user: Address) -> Result<ExchangeReceipt> {
        let _guard = self.exchange_locks.acquire(user).await;

        let wallet = self.store.get_wallet(user).await?;
        let amount = wallet.mileage;
        if amount < self.policy.exchange_threshold {
            return Err(RewardError::InsufficientMileage {
                available: amount,
                required: self.policy.exchange_threshold,
            });
        }

        let allowed = self
            .chain
            .allowance(self.policy.treasury, self.policy.operator)
            .await?;
        if allowed < amount {
            self.chain
                .approve(self.policy.treasury, self.policy.operator, amount)
                .await?;
            debug!(amount = %amount, "🔓 Raised treasury allowance for exchange");
        }

        let receipt = match self
            .chain
            .token_transfer_from(self.policy.treasury, user, amount)
            .await
        {
            Ok(receipt) => receipt,
            Err(e @ ChainError::Timeout(_)) => {
                warn!(
                    user = %user,
                    amount = %amount,
                    error = %e,
                    "Exchange transfer outcome unknown, mileage retained"
                );
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        match self.store.apply_exchange(user, amount).await? {
            ExchangeOutcome::Settled { mileage, tokens } => {
                info!(
                    user = %user,
                    amount = %amount,
                    tx_hash = %receipt.tx_hash,
                    "💸 Mileage exchanged for tokens"
                );
                Ok(ExchangeReceipt {
                    user,
                    amount,
                    tx_hash: receipt.tx_hash,
                    mileage,
                    tokens,
                })
            }
            ExchangeOutcome::InsufficientMileage { available } => {
                // Unreachable while the per-user lock serializes debits:
                // only exchanges reduce mileage. Kept as a hard signal.
                error!(
                    user = %user,
                    amount = %amount,
                    available = %available,
                    "Exchange transferred on ledger but mileage commit refused, needs reconciliation"
                );
                Err(RewardError::InsufficientMileage {
                    available,
                    required: amount,
                })
            }
        }
    }

    pub async fn wallet(&self, user: Address) -> Result<Wallet> {
        Ok(self.store.get_wallet(user).await?)
    }

    /// On-ledger token balance, read through the chain client.
    pub async fn token_balance(&self, user: Address) -> Result<Points> {
        Ok(self.chain.balance_of(user).await?)
    }
}
