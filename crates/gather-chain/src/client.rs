use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ContentHash, TxReceipt};
use gather_types::{Address, BadgeKind, BadgeMetadata, Points, TokenId};

/// Interface to the badge and token contracts.
///
/// Calls are potentially slow and may fail transiently. Every method
/// returns either a confirmed result or an error; implementations never
/// report success for a call they did not see acknowledged. Callers are
/// expected to keep their own idempotency bookkeeping, since a timed-out
/// call may still have been applied on chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Mints a fixed-supply badge owned by `owner`, returning the new
    /// token id.
    async fn mint_badge(
        &self,
        owner: Address,
        kind: BadgeKind,
        amount: u32,
        token_uri: &str,
    ) -> Result<TokenId>;

    /// Transfers `amount` units of a badge token between accounts.
    async fn transfer_badge(
        &self,
        from: Address,
        to: Address,
        token_id: TokenId,
        amount: u32,
    ) -> Result<TxReceipt>;

    /// Moves fungible tokens out of `from` using the operator's
    /// allowance.
    async fn token_transfer_from(
        &self,
        from: Address,
        to: Address,
        amount: Points,
    ) -> Result<TxReceipt>;

    async fn balance_of(&self, owner: Address) -> Result<Points>;

    async fn allowance(&self, owner: Address, spender: Address) -> Result<Points>;

    /// Sets the spender's allowance over `owner`'s tokens.
    async fn approve(&self, owner: Address, spender: Address, amount: Points) -> Result<TxReceipt>;
}

/// Off-chain store for badge metadata, addressed by content hash.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn pin(&self, metadata: &BadgeMetadata) -> Result<ContentHash>;
}
