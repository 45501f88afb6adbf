use crate::{Address, Points};
use serde::{Deserialize, Serialize};

/// Per-user reward counters.
///
/// Each counter moves exactly once per corresponding entry-latch
/// transition; the storage layer applies both in the same commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub address: Address,
    /// Off-ledger points earned from reviews, exchangeable for tokens.
    pub mileage: Points,
    /// Fungible tokens received through exchanges.
    pub tokens: Points,
    pub badge_count: u32,
    pub badge_score: u64,
}

impl Wallet {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            mileage: Points::ZERO,
            tokens: Points::ZERO,
            badge_count: 0,
            badge_score: 0,
        }
    }
}
