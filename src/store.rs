//! Event store - durable append-only log of distribution events
//!
//! SQLite-backed repository keyed by the composite ordering key. The table
//! is append-only: rows are never updated or deleted, and the PRIMARY KEY
//! makes a duplicate append fail loudly instead of silently rewriting
//! history.
//!
//! Amounts are stored as decimal TEXT so arbitrary-precision values survive
//! SQLite's 64-bit integer width; window sums are therefore computed in Rust
//! over a scan, never with SQL SUM.

use crate::aggregate::{AggregateWindow, NearestDirection};
use crate::events::{DistributionEvent, OrderingKey};
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use num_bigint::BigUint;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum StoreError {
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Durable, ordered append log of ingested events with point queries.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Highest stored ordering key (composite lexicographic order), `None`
    /// if the store is empty.
    async fn latest_ordering_key(&self) -> Result<Option<OrderingKey>, StoreError>;

    /// Insert one event. Atomic: fully visible to subsequent reads or not
    /// at all. A constraint violation (duplicate ordering key) is an error
    /// and leaves the store untouched.
    async fn append(&self, event: &DistributionEvent) -> Result<(), StoreError>;

    /// Sum the four amounts over events with `occurred_at` in
    /// `[start, end]` inclusive. All-zero result for an empty window.
    async fn sum_amounts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AggregateWindow, StoreError>;

    /// Nearest stored `occurred_at` at or after / at or before `target`.
    async fn nearest_occurred_at(
        &self,
        target: DateTime<Utc>,
        direction: NearestDirection,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;
}

/// SQLite implementation of `EventStore`.
pub struct SqliteEventStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEventStore {
    /// Open (or create) the database, apply PRAGMAs, and ensure the schema
    /// exists. Idempotent across restarts.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS distribution_events (
                block_number             INTEGER NOT NULL,
                transaction_index        INTEGER NOT NULL,
                log_index                INTEGER NOT NULL,
                input_token_amount       TEXT NOT NULL,
                distributed_token_amount TEXT NOT NULL,
                swapped_base_amount      TEXT NOT NULL,
                distributed_base_amount  TEXT NOT NULL,
                occurred_at              INTEGER NOT NULL,
                stored_at                INTEGER NOT NULL,
                PRIMARY KEY (block_number, transaction_index, log_index)
            )",
            [],
        )?;

        // Windowed sums and nearest-timestamp lookups scan by occurred_at
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_occurred_at
             ON distribution_events(occurred_at)",
            [],
        )?;

        log::info!("✅ Event store initialized (WAL mode)");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn parse_amount(text: &str) -> Result<BigUint, StoreError> {
        BigUint::parse_bytes(text.as_bytes(), 10)
            .ok_or_else(|| StoreError::Database(format!("Corrupt stored amount '{}'", text)))
    }

    fn parse_timestamp(secs: i64) -> Result<DateTime<Utc>, StoreError> {
        Utc.timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| StoreError::Database(format!("Corrupt stored timestamp {}", secs)))
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn latest_ordering_key(&self) -> Result<Option<OrderingKey>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let key = conn
            .query_row(
                "SELECT block_number, transaction_index, log_index
                 FROM distribution_events
                 ORDER BY block_number DESC, transaction_index DESC, log_index DESC
                 LIMIT 1",
                [],
                |row| {
                    Ok(OrderingKey::new(
                        row.get::<_, u64>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(key)
    }

    async fn append(&self, event: &DistributionEvent) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let stored_at = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO distribution_events
                (block_number, transaction_index, log_index,
                 input_token_amount, distributed_token_amount,
                 swapped_base_amount, distributed_base_amount,
                 occurred_at, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.block_number,
                event.transaction_index,
                event.log_index,
                event.input_token_amount.to_str_radix(10),
                event.distributed_token_amount.to_str_radix(10),
                event.swapped_base_amount.to_str_radix(10),
                event.distributed_base_amount.to_str_radix(10),
                event.occurred_at.timestamp(),
                stored_at,
            ],
        )?;

        Ok(())
    }

    async fn sum_amounts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<AggregateWindow, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT input_token_amount, distributed_token_amount,
                    swapped_base_amount, distributed_base_amount, occurred_at
             FROM distribution_events
             WHERE occurred_at BETWEEN ?1 AND ?2",
        )?;

        let rows = stmt.query_map(params![start.timestamp(), end.timestamp()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut window = AggregateWindow::empty();
        let mut first: Option<i64> = None;
        let mut last: Option<i64> = None;

        for row in rows {
            let (input, distributed, swapped, dist_base, occurred_at) = row?;

            window.input_token_total += Self::parse_amount(&input)?;
            window.distributed_token_total += Self::parse_amount(&distributed)?;
            window.swapped_base_total += Self::parse_amount(&swapped)?;
            window.distributed_base_total += Self::parse_amount(&dist_base)?;

            first = Some(first.map_or(occurred_at, |f: i64| f.min(occurred_at)));
            last = Some(last.map_or(occurred_at, |l: i64| l.max(occurred_at)));
        }

        window.first_occurred_at = first.map(Self::parse_timestamp).transpose()?;
        window.last_occurred_at = last.map(Self::parse_timestamp).transpose()?;

        Ok(window)
    }

    async fn nearest_occurred_at(
        &self,
        target: DateTime<Utc>,
        direction: NearestDirection,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let sql = match direction {
            NearestDirection::AtOrAfter => {
                "SELECT occurred_at FROM distribution_events
                 WHERE occurred_at >= ?1 ORDER BY occurred_at ASC LIMIT 1"
            }
            NearestDirection::AtOrBefore => {
                "SELECT occurred_at FROM distribution_events
                 WHERE occurred_at <= ?1 ORDER BY occurred_at DESC LIMIT 1"
            }
        };

        let secs = conn
            .query_row(sql, params![target.timestamp()], |row| row.get::<_, i64>(0))
            .optional()?;

        secs.map(Self::parse_timestamp).transpose()
    }
}
