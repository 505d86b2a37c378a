//! Event source trait - read access to the external ledger
//!
//! The sync engine only needs two operations from the chain: "list all
//! distribution events from a block onward" and "current balance of an
//! address". Everything RPC-specific lives behind this trait so tests can
//! feed scripted event sequences through the engine.

use crate::events::DistributionEvent;
use async_trait::async_trait;
use num_bigint::BigUint;

#[derive(Debug)]
pub enum SourceError {
    /// Endpoint unreachable or mis-configured. Fatal at startup, retryable
    /// on the next scheduled tick during steady state.
    Connectivity(String),
    /// The endpoint answered with a JSON-RPC error object.
    Rpc(String),
    /// The endpoint answered, but the payload did not parse.
    Decode(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Connectivity(e) => write!(f, "Ledger connectivity error: {}", e),
            SourceError::Rpc(e) => write!(f, "Ledger RPC error: {}", e),
            SourceError::Decode(e) => write!(f, "Ledger response decode error: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}

/// Read-only view of the ledger's distribution event stream.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// List all distribution events from `from_block` to the current chain
    /// head, inclusive, in ledger emission order. May be empty.
    ///
    /// The returned order is authoritative: callers do not re-sort.
    async fn list_events(&self, from_block: u64) -> Result<Vec<DistributionEvent>, SourceError>;

    /// Current base-unit balance of `address`.
    async fn get_balance(&self, address: &str) -> Result<BigUint, SourceError>;
}
