//! Distribution event model
//!
//! Events are immutable facts about a single on-ledger distribution. Their
//! identity is the composite ordering key `(block_number, transaction_index,
//! log_index)`, which strictly increases in ledger emission order and doubles
//! as the resume cursor for synchronization.

use chrono::{DateTime, Utc};
use num_bigint::BigUint;

/// Composite position of an event in the ledger's emission order.
///
/// Derived `Ord` gives full lexicographic comparison over
/// `(block_number, transaction_index, log_index)`, which is exactly the
/// ledger's total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderingKey {
    pub block_number: u64,
    pub transaction_index: u32,
    pub log_index: u32,
}

impl OrderingKey {
    /// Sentinel cursor for an empty store. Every real event compares
    /// strictly greater.
    pub const ORIGIN: OrderingKey = OrderingKey {
        block_number: 0,
        transaction_index: 0,
        log_index: 0,
    };

    pub fn new(block_number: u64, transaction_index: u32, log_index: u32) -> Self {
        Self {
            block_number,
            transaction_index,
            log_index,
        }
    }
}

impl std::fmt::Display for OrderingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.block_number, self.transaction_index, self.log_index
        )
    }
}

/// A single token distribution observed on the ledger.
///
/// Amounts are base units (smallest denomination) and are kept as
/// arbitrary-precision integers end to end. Large-supply tokens overflow
/// u128 sums, and floats truncate, so neither is acceptable here.
///
/// `occurred_at` is the containing block's timestamp, not ingestion time.
/// The persistence-time audit timestamp (`stored_at`) is assigned by the
/// store on append and is not part of the event itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionEvent {
    pub block_number: u64,
    pub transaction_index: u32,
    pub log_index: u32,
    pub input_token_amount: BigUint,
    pub distributed_token_amount: BigUint,
    pub swapped_base_amount: BigUint,
    pub distributed_base_amount: BigUint,
    pub occurred_at: DateTime<Utc>,
}

impl DistributionEvent {
    pub fn key(&self) -> OrderingKey {
        OrderingKey::new(self.block_number, self.transaction_index, self.log_index)
    }
}
