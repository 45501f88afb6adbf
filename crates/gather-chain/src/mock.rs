use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::client::{ChainClient, MetadataStore};
use crate::error::{ChainError, Result};
use crate::types::{ContentHash, TxReceipt};
use gather_types::{Address, BadgeKind, BadgeMetadata, Points, TokenId, TxHash};

/// In-memory ledger double for tests and local development.
///
/// Keeps real balances, holdings, and allowances so contract
/// preconditions (insufficient balance, missing allowance) surface the
/// same way they would against the gateway. Failures are scriptable:
/// `fail_next_transfers`/`fail_next_mints` make the next N mutating
/// calls fail, either as plain call failures or as timeouts when
/// timeout mode is on. Reads and `approve` stay reliable.
pub struct MockChain {
    operator: Address,
    token_balances: Arc<RwLock<HashMap<Address, Points>>>,
    badge_holdings: Arc<RwLock<HashMap<(Address, TokenId), u32>>>,
    allowances: Arc<RwLock<HashMap<(Address, Address), Points>>>,
    next_token: AtomicU64,
    sequence: AtomicU64,
    fail_mints: AtomicU32,
    fail_transfers: AtomicU32,
    timeout_failures: AtomicBool,
    mint_calls: AtomicU64,
    transfer_calls: AtomicU64,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            operator: Address::ZERO,
            token_balances: Arc::new(RwLock::new(HashMap::new())),
            badge_holdings: Arc::new(RwLock::new(HashMap::new())),
            allowances: Arc::new(RwLock::new(HashMap::new())),
            next_token: AtomicU64::new(0),
            sequence: AtomicU64::new(0),
            fail_mints: AtomicU32::new(0),
            fail_transfers: AtomicU32::new(0),
            timeout_failures: AtomicBool::new(false),
            mint_calls: AtomicU64::new(0),
            transfer_calls: AtomicU64::new(0),
        }
    }

    /// Account whose allowance is consumed by `token_transfer_from`.
    pub fn with_operator(mut self, operator: Address) -> Self {
        self.operator = operator;
        self
    }

    pub async fn fund(&self, address: Address, amount: Points) {
        let mut balances = self.token_balances.write().await;
        let balance = balances.entry(address).or_insert(Points::ZERO);
        *balance = balance.saturating_add(amount);
    }

    /// The next `n` badge or token transfers fail.
    pub fn fail_next_transfers(&self, n: u32) {
        self.fail_transfers.store(n, Ordering::SeqCst);
    }

    /// The next `n` mints fail.
    pub fn fail_next_mints(&self, n: u32) {
        self.fail_mints.store(n, Ordering::SeqCst);
    }

    /// Injected failures surface as timeouts instead of call failures.
    pub fn set_timeout_failures(&self, enabled: bool) {
        self.timeout_failures.store(enabled, Ordering::SeqCst);
    }

    pub fn mint_calls(&self) -> u64 {
        self.mint_calls.load(Ordering::SeqCst)
    }

    pub fn transfer_calls(&self) -> u64 {
        self.transfer_calls.load(Ordering::SeqCst)
    }

    pub async fn badge_holding(&self, owner: Address, token_id: TokenId) -> u32 {
        *self
            .badge_holdings
            .read()
            .await
            .get(&(owner, token_id))
            .unwrap_or(&0)
    }

    fn take_failure(&self, counter: &AtomicU32, call: &str) -> Result<()> {
        let injected = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n > 0 {
                    Some(n - 1)
                } else {
                    None
                }
            })
            .is_ok();
        if !injected {
            return Ok(());
        }
        if self.timeout_failures.load(Ordering::SeqCst) {
            Err(ChainError::Timeout(call.to_string()))
        } else {
            Err(ChainError::CallFailed(format!("injected failure: {}", call)))
        }
    }

    fn receipt(&self) -> TxReceipt {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"mock-tx");
        hasher.update(&seq.to_le_bytes());
        hasher.update(&rand::random::<u64>().to_le_bytes());
        TxReceipt {
            tx_hash: TxHash::from_bytes(*hasher.finalize().as_bytes()),
            block_number: seq,
        }
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn mint_badge(
        &self,
        owner: Address,
        _kind: BadgeKind,
        amount: u32,
        _token_uri: &str,
    ) -> Result<TokenId> {
        self.mint_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(&self.fail_mints, "mint_badge")?;

        let token_id = TokenId::new(self.next_token.fetch_add(1, Ordering::SeqCst) + 1);
        self.badge_holdings
            .write()
            .await
            .insert((owner, token_id), amount);
        Ok(token_id)
    }

    async fn transfer_badge(
        &self,
        from: Address,
        to: Address,
        token_id: TokenId,
        amount: u32,
    ) -> Result<TxReceipt> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(&self.fail_transfers, "transfer_badge")?;

        let mut holdings = self.badge_holdings.write().await;
        let held = holdings.get(&(from, token_id)).copied().unwrap_or(0);
        if held < amount {
            return Err(ChainError::Rejected(format!(
                "insufficient badge balance: held {}, need {}",
                held, amount
            )));
        }
        holdings.insert((from, token_id), held - amount);
        *holdings.entry((to, token_id)).or_insert(0) += amount;
        Ok(self.receipt())
    }

    async fn token_transfer_from(
        &self,
        from: Address,
        to: Address,
        amount: Points,
    ) -> Result<TxReceipt> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(&self.fail_transfers, "token_transfer_from")?;

        let mut allowances = self.allowances.write().await;
        let mut balances = self.token_balances.write().await;

        let allowed = allowances
            .get(&(from, self.operator))
            .copied()
            .unwrap_or(Points::ZERO);
        let remaining_allowance = allowed.checked_sub(amount).ok_or_else(|| {
            ChainError::Rejected(format!(
                "allowance exceeded: allowed {}, need {}",
                allowed, amount
            ))
        })?;

        let held = balances.get(&from).copied().unwrap_or(Points::ZERO);
        let remaining_balance = held.checked_sub(amount).ok_or_else(|| {
            ChainError::Rejected(format!(
                "insufficient balance: held {}, need {}",
                held, amount
            ))
        })?;

        allowances.insert((from, self.operator), remaining_allowance);
        balances.insert(from, remaining_balance);
        let credited = balances.entry(to).or_insert(Points::ZERO);
        *credited = credited.saturating_add(amount);
        Ok(self.receipt())
    }

    async fn balance_of(&self, owner: Address) -> Result<Points> {
        Ok(self
            .token_balances
            .read()
            .await
            .get(&owner)
            .copied()
            .unwrap_or(Points::ZERO))
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<Points> {
        Ok(self
            .allowances
            .read()
            .await
            .get(&(owner, spender))
            .copied()
            .unwrap_or(Points::ZERO))
    }

    async fn approve(&self, owner: Address, spender: Address, amount: Points) -> Result<TxReceipt> {
        self.allowances
            .write()
            .await
            .insert((owner, spender), amount);
        Ok(self.receipt())
    }
}

/// In-memory metadata store double.
pub struct MemoryPinStore {
    pinned: Arc<RwLock<HashMap<String, BadgeMetadata>>>,
    fail_next: AtomicU32,
}

impl MemoryPinStore {
    pub fn new() -> Self {
        Self {
            pinned: Arc::new(RwLock::new(HashMap::new())),
            fail_next: AtomicU32::new(0),
        }
    }

    pub fn fail_next_pins(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub async fn pinned_count(&self) -> usize {
        self.pinned.read().await.len()
    }
}

impl Default for MemoryPinStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for MemoryPinStore {
    async fn pin(&self, metadata: &BadgeMetadata) -> Result<ContentHash> {
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n > 0 {
                    Some(n - 1)
                } else {
                    None
                }
            })
            .is_ok();
        if injected {
            return Err(ChainError::CallFailed("pin service unavailable".into()));
        }

        let bytes = serde_json::to_vec(metadata)
            .map_err(|e| ChainError::CallFailed(format!("metadata encoding: {}", e)))?;
        let hash = hex::encode(blake3::hash(&bytes).as_bytes());
        self.pinned
            .write()
            .await
            .insert(hash.clone(), metadata.clone());
        Ok(ContentHash::new(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    #[tokio::test]
    async fn test_mint_and_transfer_badges() {
        let chain = MockChain::new();
        let treasury = user(9);

        let token_id = chain
            .mint_badge(treasury, BadgeKind::Gold, 3, "ipfs://meta")
            .await
            .unwrap();
        assert_eq!(chain.badge_holding(treasury, token_id).await, 3);

        chain
            .transfer_badge(treasury, user(1), token_id, 1)
            .await
            .unwrap();
        assert_eq!(chain.badge_holding(treasury, token_id).await, 2);
        assert_eq!(chain.badge_holding(user(1), token_id).await, 1);
    }

    #[tokio::test]
    async fn test_transfer_rejected_when_supply_gone() {
        let chain = MockChain::new();
        let treasury = user(9);
        let token_id = chain
            .mint_badge(treasury, BadgeKind::Gold, 1, "ipfs://meta")
            .await
            .unwrap();
        chain
            .transfer_badge(treasury, user(1), token_id, 1)
            .await
            .unwrap();

        let err = chain
            .transfer_badge(treasury, user(2), token_id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_failure_injection_and_timeout_mode() {
        let chain = MockChain::new();
        let treasury = user(9);
        let token_id = chain
            .mint_badge(treasury, BadgeKind::Gold, 5, "ipfs://meta")
            .await
            .unwrap();

        chain.fail_next_transfers(1);
        let err = chain
            .transfer_badge(treasury, user(1), token_id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::CallFailed(_)));

        // Counter consumed: the next call goes through.
        chain
            .transfer_badge(treasury, user(1), token_id, 1)
            .await
            .unwrap();

        chain.set_timeout_failures(true);
        chain.fail_next_transfers(1);
        let err = chain
            .transfer_badge(treasury, user(2), token_id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Timeout(_)));

        assert_eq!(chain.transfer_calls(), 4);
    }

    #[tokio::test]
    async fn test_token_transfer_requires_allowance_and_balance() {
        let operator = user(7);
        let treasury = user(9);
        let chain = MockChain::new().with_operator(operator);
        chain.fund(treasury, Points::new(100)).await;

        let err = chain
            .token_transfer_from(treasury, user(1), Points::new(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Rejected(_)));

        chain
            .approve(treasury, operator, Points::new(10))
            .await
            .unwrap();
        chain
            .token_transfer_from(treasury, user(1), Points::new(10))
            .await
            .unwrap();

        assert_eq!(chain.balance_of(user(1)).await.unwrap(), Points::new(10));
        assert_eq!(chain.balance_of(treasury).await.unwrap(), Points::new(90));
        assert_eq!(
            chain.allowance(treasury, operator).await.unwrap(),
            Points::ZERO
        );
    }

    #[tokio::test]
    async fn test_pin_store_hashes_metadata() {
        let store = MemoryPinStore::new();
        let metadata = BadgeMetadata {
            name: "Finisher".into(),
            description: "Completed the event".into(),
            image: "https://img.example/badge.png".into(),
            kind: BadgeKind::Silver,
        };

        let hash = store.pin(&metadata).await.unwrap();
        assert!(hash.as_uri().starts_with("ipfs://"));
        assert_eq!(store.pinned_count().await, 1);

        store.fail_next_pins(1);
        assert!(store.pin(&metadata).await.is_err());
    }
}
