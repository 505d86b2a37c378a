//! Integration tests for the sync + report cycle
//!
//! Runs the real SyncEngine and SqliteEventStore against a scripted ledger
//! source and a recording sink, covering:
//! - Initial sync into an empty store
//! - Block-granular re-fetch overlap being dropped by cursor comparison
//! - Idempotence of repeated overlapping cycles
//! - A mid-batch append failure not blocking later events
//! - The on-demand trigger driving a full cycle end to end

#[cfg(test)]
mod sync_report_cycle_tests {
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use distflow::aggregate::AggregationEngine;
    use distflow::events::{DistributionEvent, OrderingKey};
    use distflow::scheduler::{run_report_loop, ReportCycle, ReportTrigger};
    use distflow::source::{EventSource, SourceError};
    use distflow::store::{EventStore, SqliteEventStore};
    use distflow::sync::SyncEngine;
    use distflow::telegram::{ReportSink, SinkError};
    use num_bigint::BigUint;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    /// Scripted ledger: returns its whole event list for every range query
    /// (a block-granular source legitimately re-returns overlap) and records
    /// the requested from_block values.
    struct MockLedger {
        events: Mutex<Vec<DistributionEvent>>,
        balance: BigUint,
        requested_from: Mutex<Vec<u64>>,
    }

    impl MockLedger {
        fn new(events: Vec<DistributionEvent>, balance: BigUint) -> Self {
            Self {
                events: Mutex::new(events),
                balance,
                requested_from: Mutex::new(Vec::new()),
            }
        }

        fn push_event(&self, event: DistributionEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn requested_from(&self) -> Vec<u64> {
            self.requested_from.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSource for MockLedger {
        async fn list_events(
            &self,
            from_block: u64,
        ) -> Result<Vec<DistributionEvent>, SourceError> {
            self.requested_from.lock().unwrap().push(from_block);
            Ok(self.events.lock().unwrap().clone())
        }

        async fn get_balance(&self, _address: &str) -> Result<BigUint, SourceError> {
            Ok(self.balance.clone())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        messages: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl ReportSink for RecordingSink {
        async fn send(&self, chat_id: &str, text: &str) -> Result<(), SinkError> {
            self.messages
                .lock()
                .unwrap()
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn ev(block: u64, tx: u32, log: u32, occurred_at: i64, input_tokens: u64) -> DistributionEvent {
        let one_token = BigUint::parse_bytes(b"1000000000000000000", 10).unwrap();
        DistributionEvent {
            block_number: block,
            transaction_index: tx,
            log_index: log,
            input_token_amount: one_token * input_tokens,
            distributed_token_amount: BigUint::from(0u32),
            swapped_base_amount: BigUint::from(0u32),
            distributed_base_amount: BigUint::from(0u32),
            occurred_at: Utc.timestamp_opt(occurred_at, 0).unwrap(),
        }
    }

    fn open_store(dir: &tempfile::TempDir) -> Arc<dyn EventStore> {
        Arc::new(SqliteEventStore::open(dir.path().join("events.db")).unwrap())
    }

    #[tokio::test]
    async fn test_initial_sync_appends_all_and_sets_cursor() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        let ledger = Arc::new(MockLedger::new(
            vec![
                ev(100, 0, 0, 1000, 1),
                ev(100, 0, 1, 1000, 1),
                ev(101, 2, 0, 1100, 1),
            ],
            BigUint::from(0u32),
        ));

        let engine = SyncEngine::new(ledger.clone(), store.clone());
        let report = engine.sync().await.unwrap();

        assert_eq!(report.appended, 3);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(
            store.latest_ordering_key().await.unwrap(),
            Some(OrderingKey::new(101, 2, 0))
        );
        // Empty store resumes from the origin block
        assert_eq!(ledger.requested_from(), vec![0]);
    }

    #[tokio::test]
    async fn test_refetched_overlap_is_dropped() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        let ledger = Arc::new(MockLedger::new(
            vec![
                ev(100, 0, 0, 1000, 1),
                ev(100, 0, 1, 1000, 1),
                ev(101, 2, 0, 1100, 1),
            ],
            BigUint::from(0u32),
        ));

        let engine = SyncEngine::new(ledger.clone(), store.clone());
        engine.sync().await.unwrap();

        // One new event lands; the source re-returns everything
        ledger.push_event(ev(101, 3, 0, 1100, 1));
        let report = engine.sync().await.unwrap();

        assert_eq!(report.appended, 1);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(
            store.latest_ordering_key().await.unwrap(),
            Some(OrderingKey::new(101, 3, 0))
        );
        // Second fetch starts at the cursor's block, not block + 1
        assert_eq!(ledger.requested_from(), vec![0, 101]);
    }

    #[tokio::test]
    async fn test_two_overlapping_cycles_equal_one() {
        let events = vec![
            ev(100, 0, 0, 1000, 1),
            ev(100, 1, 0, 1000, 2),
            ev(102, 0, 0, 1200, 4),
        ];
        let window_start = Utc.timestamp_opt(0, 0).unwrap();
        let window_end = Utc.timestamp_opt(10_000, 0).unwrap();

        // Two consecutive cycles over the same stream
        let dir_twice = tempdir().unwrap();
        let store_twice = open_store(&dir_twice);
        let ledger = Arc::new(MockLedger::new(events.clone(), BigUint::from(0u32)));
        let engine = SyncEngine::new(ledger, store_twice.clone());
        engine.sync().await.unwrap();
        let second = engine.sync().await.unwrap();
        assert_eq!(second.appended, 0);
        assert_eq!(second.skipped, 3);

        // One cycle over the same stream into a fresh store
        let dir_once = tempdir().unwrap();
        let store_once = open_store(&dir_once);
        let ledger = Arc::new(MockLedger::new(events, BigUint::from(0u32)));
        SyncEngine::new(ledger, store_once.clone()).sync().await.unwrap();

        // Store contents are identical
        assert_eq!(
            store_twice.latest_ordering_key().await.unwrap(),
            store_once.latest_ordering_key().await.unwrap()
        );
        assert_eq!(
            store_twice
                .sum_amounts(window_start, window_end)
                .await
                .unwrap(),
            store_once
                .sum_amounts(window_start, window_end)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_empty_source_is_noop() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        let ledger = Arc::new(MockLedger::new(Vec::new(), BigUint::from(0u32)));

        let report = SyncEngine::new(ledger, store.clone()).sync().await.unwrap();

        assert_eq!(report.appended, 0);
        assert_eq!(report.skipped, 0);
        assert_eq!(store.latest_ordering_key().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_append_does_not_block_batch() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        // The source misbehaves and emits one key twice in a single batch;
        // the second copy passes the cursor filter but hits the PRIMARY KEY
        let ledger = Arc::new(MockLedger::new(
            vec![
                ev(102, 0, 0, 1200, 1),
                ev(102, 0, 0, 1200, 1),
                ev(102, 1, 0, 1200, 1),
            ],
            BigUint::from(0u32),
        ));

        let report = SyncEngine::new(ledger, store.clone()).sync().await.unwrap();

        assert_eq!(report.appended, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(
            store.latest_ordering_key().await.unwrap(),
            Some(OrderingKey::new(102, 1, 0))
        );
    }

    #[tokio::test]
    async fn test_on_demand_trigger_runs_full_cycle() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let now = Utc::now().timestamp();
        let balance = BigUint::parse_bytes(b"1250000000000000000", 10).unwrap();
        let ledger = Arc::new(MockLedger::new(
            vec![ev(100, 0, 0, now - 600, 1), ev(101, 0, 0, now - 300, 2)],
            balance,
        ));
        let sink = RecordingSink::default();

        let cycle = ReportCycle {
            sync: SyncEngine::new(ledger.clone(), store.clone()),
            aggregation: AggregationEngine::new(store.clone()),
            source: ledger,
            sink: Arc::new(sink.clone()),
            wallet_address: "0xdistributor".to_string(),
            receiver_chat_id: "-100777".to_string(),
            report_period_secs: 86_400,
            token_symbol: "TOKEN".to_string(),
            base_symbol: "ETH".to_string(),
        };

        let (trigger_tx, trigger_rx) = mpsc::channel(8);
        // Interval long enough that only the trigger can fire during the test
        let handle = tokio::spawn(async move {
            run_report_loop(cycle, 3600, trigger_rx).await;
        });

        trigger_tx.send(ReportTrigger::OnDemand).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;

        let messages = sink.messages.lock().unwrap().clone();
        assert_eq!(messages.len(), 1);

        let (chat_id, text) = &messages[0];
        assert_eq!(chat_id, "-100777");
        assert!(text.contains("Daily $TOKEN Stats:"));
        assert!(text.contains("- TOKEN processed: 3"));
        assert!(text.contains("Distributor balance: 1.25 ETH"));

        // Both events were ingested before the report went out
        assert_eq!(
            store.latest_ordering_key().await.unwrap(),
            Some(OrderingKey::new(101, 0, 0))
        );

        handle.abort();
    }
}
