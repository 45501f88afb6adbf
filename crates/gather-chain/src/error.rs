use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// The call reached the ledger and was rejected (contract revert,
    /// failed precondition, malformed request).
    #[error("Ledger rejected call: {0}")]
    Rejected(String),

    /// The call could not be completed (gateway unreachable, transport
    /// failure, bad response).
    #[error("Ledger call failed: {0}")]
    CallFailed(String),

    /// The call timed out. The outcome is unknown: it may or may not
    /// have been applied on chain, so callers must not record success.
    #[error("Ledger call timed out: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;
