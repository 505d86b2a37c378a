//! Aggregation engine - windowed sums and nearest-timestamp lookups
//!
//! Thin query layer over the event store. Aggregates are computed on demand
//! and never persisted.

use crate::store::{EventStore, StoreError};
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use std::sync::Arc;

/// Scan direction for nearest-timestamp lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NearestDirection {
    /// Minimum `occurred_at` >= target.
    AtOrAfter,
    /// Maximum `occurred_at` <= target.
    AtOrBefore,
}

/// Summed base-unit amounts over a closed time window, plus the actual
/// first/last event timestamps inside it. All-zero (with `None` boundaries)
/// when no events fall in the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateWindow {
    pub input_token_total: BigUint,
    pub distributed_token_total: BigUint,
    pub swapped_base_total: BigUint,
    pub distributed_base_total: BigUint,
    pub first_occurred_at: Option<DateTime<Utc>>,
    pub last_occurred_at: Option<DateTime<Utc>>,
}

impl AggregateWindow {
    pub fn empty() -> Self {
        Self {
            input_token_total: BigUint::default(),
            distributed_token_total: BigUint::default(),
            swapped_base_total: BigUint::default(),
            distributed_base_total: BigUint::default(),
            first_occurred_at: None,
            last_occurred_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first_occurred_at.is_none()
    }
}

/// Computes reporting aggregates from stored events.
pub struct AggregationEngine {
    store: Arc<dyn EventStore>,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Sum the four distribution amounts over all events with `occurred_at`
    /// in `[start, end]` inclusive.
    pub async fn summarize(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AggregateWindow, StoreError> {
        self.store.sum_amounts(start, end).await
    }

    /// Nearest stored event timestamp at or around `target`. The nominal
    /// window boundaries rarely coincide with an actual event, so reports
    /// use this to show the true first/last transaction times.
    pub async fn nearest_boundary(
        &self,
        target: DateTime<Utc>,
        direction: NearestDirection,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.store.nearest_occurred_at(target, direction).await
    }
}
