use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::client::{ChainClient, MetadataStore};
use crate::error::{ChainError, Result};
use crate::types::{ContentHash, TxReceipt};
use gather_types::{Address, BadgeKind, BadgeMetadata, Points, TokenId, TxHash};

#[derive(Debug, Clone)]
pub struct HttpChainConfig {
    /// JSON-RPC endpoint of the contract gateway.
    pub endpoint: String,
    /// Pinning endpoint of the metadata store.
    pub pin_endpoint: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for HttpChainConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8845".to_string(),
            pin_endpoint: "http://127.0.0.1:8846/pin".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}

/// JSON-RPC client for the contract gateway.
///
/// Transport failures are retried with linear backoff. Timeouts are
/// surfaced immediately as [`ChainError::Timeout`]: the call may have
/// landed, so retrying a mutation blindly could double-apply it, and
/// callers must treat the outcome as unknown. Gateway rejections are
/// final and never retried.
pub struct HttpChain {
    client: reqwest::Client,
    config: HttpChainConfig,
    sequence: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcReceipt {
    tx_hash: String,
    block_number: u64,
}

impl HttpChain {
    pub fn new(config: HttpChainConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChainError::CallFailed(format!("HTTP client build: {}", e)))?;
        Ok(Self {
            client,
            config,
            sequence: AtomicU64::new(0),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut last_error = ChainError::CallFailed(format!("{}: gateway unreachable", method));
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                debug!(method = method, attempt = attempt, "🔄 Retrying ledger call");
            }

            match self
                .client
                .post(&self.config.endpoint)
                .json(&request)
                .send()
                .await
            {
                Ok(response) => {
                    let envelope: RpcEnvelope<T> = response.json().await.map_err(|e| {
                        ChainError::CallFailed(format!("{}: malformed response: {}", method, e))
                    })?;
                    if let Some(err) = envelope.error {
                        return Err(ChainError::Rejected(format!(
                            "{} ({}): {}",
                            method, err.code, err.message
                        )));
                    }
                    return envelope.result.ok_or_else(|| {
                        ChainError::CallFailed(format!("{}: empty response", method))
                    });
                }
                Err(e) if e.is_timeout() => {
                    warn!(method = method, "⏳ Ledger call timed out; outcome unknown");
                    return Err(ChainError::Timeout(method.to_string()));
                }
                Err(e) => {
                    last_error = ChainError::CallFailed(format!("{}: {}", method, e));
                }
            }
        }
        Err(last_error)
    }

    fn parse_receipt(method: &str, raw: RpcReceipt) -> Result<TxReceipt> {
        let tx_hash = TxHash::from_hex(&raw.tx_hash)
            .map_err(|e| ChainError::CallFailed(format!("{}: malformed tx hash: {}", method, e)))?;
        Ok(TxReceipt {
            tx_hash,
            block_number: raw.block_number,
        })
    }
}

#[async_trait]
impl ChainClient for HttpChain {
    async fn mint_badge(
        &self,
        owner: Address,
        kind: BadgeKind,
        amount: u32,
        token_uri: &str,
    ) -> Result<TokenId> {
        #[derive(Deserialize)]
        struct MintResult {
            token_id: u64,
        }

        let result: MintResult = self
            .call(
                "gather_mintBadge",
                json!({
                    "owner": owner.to_string(),
                    "kind": kind.to_string(),
                    "amount": amount,
                    "token_uri": token_uri,
                }),
            )
            .await?;
        Ok(TokenId::new(result.token_id))
    }

    async fn transfer_badge(
        &self,
        from: Address,
        to: Address,
        token_id: TokenId,
        amount: u32,
    ) -> Result<TxReceipt> {
        let raw: RpcReceipt = self
            .call(
                "gather_transferBadge",
                json!({
                    "from": from.to_string(),
                    "to": to.to_string(),
                    "token_id": token_id.value(),
                    "amount": amount,
                }),
            )
            .await?;
        Self::parse_receipt("gather_transferBadge", raw)
    }

    async fn token_transfer_from(
        &self,
        from: Address,
        to: Address,
        amount: Points,
    ) -> Result<TxReceipt> {
        let raw: RpcReceipt = self
            .call(
                "gather_tokenTransferFrom",
                json!({
                    "from": from.to_string(),
                    "to": to.to_string(),
                    "amount": amount.value(),
                }),
            )
            .await?;
        Self::parse_receipt("gather_tokenTransferFrom", raw)
    }

    async fn balance_of(&self, owner: Address) -> Result<Points> {
        let balance: u64 = self
            .call("gather_balanceOf", json!({ "owner": owner.to_string() }))
            .await?;
        Ok(Points::new(balance))
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<Points> {
        let allowed: u64 = self
            .call(
                "gather_allowance",
                json!({
                    "owner": owner.to_string(),
                    "spender": spender.to_string(),
                }),
            )
            .await?;
        Ok(Points::new(allowed))
    }

    async fn approve(&self, owner: Address, spender: Address, amount: Points) -> Result<TxReceipt> {
        let raw: RpcReceipt = self
            .call(
                "gather_approve",
                json!({
                    "owner": owner.to_string(),
                    "spender": spender.to_string(),
                    "amount": amount.value(),
                }),
            )
            .await?;
        Self::parse_receipt("gather_approve", raw)
    }
}

/// HTTP client for the metadata pinning service.
pub struct HttpPinStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPinStore {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::CallFailed(format!("HTTP client build: {}", e)))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl MetadataStore for HttpPinStore {
    async fn pin(&self, metadata: &BadgeMetadata) -> Result<ContentHash> {
        #[derive(Deserialize)]
        struct PinResult {
            hash: String,
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(metadata)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChainError::Timeout("pin".to_string())
                } else {
                    ChainError::CallFailed(format!("pin: {}", e))
                }
            })?;
        let result: PinResult = response
            .json()
            .await
            .map_err(|e| ChainError::CallFailed(format!("pin: malformed response: {}", e)))?;
        Ok(ContentHash::new(result.hash))
    }
}
