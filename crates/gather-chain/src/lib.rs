//! Interfaces to the external ledger (badge and token contracts) and
//! the off-chain metadata store.
//!
//! The reward services only see the [`ChainClient`] and
//! [`MetadataStore`] traits. [`MockChain`] backs tests and local
//! development; the JSON-RPC gateway client ships behind the
//! `http-chain` feature.

pub mod client;
pub mod error;
pub mod mock;
pub mod types;

#[cfg(feature = "http-chain")]
pub mod http;

pub use client::{ChainClient, MetadataStore};
pub use error::{ChainError, Result};
pub use mock::{MemoryPinStore, MockChain};
pub use types::{ContentHash, TxReceipt};

#[cfg(feature = "http-chain")]
pub use http::{HttpChain, HttpChainConfig, HttpPinStore};
