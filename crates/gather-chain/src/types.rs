use gather_types::TxHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confirmation of a settled ledger transaction. Clients only construct
/// one after the ledger has acknowledged the call; an unconfirmed or
/// timed-out call surfaces as an error instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

/// Content address returned by the metadata store after pinning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_uri(&self) -> String {
        format!("ipfs://{}", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
