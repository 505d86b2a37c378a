//! Report scheduler - fixed-interval and on-demand report cycles
//!
//! One tokio task owns both triggers (the repeating timer and the command
//! channel) and multiplexes them with select!, so two cycles can never run
//! concurrently: the store sees a single writer, no locking beyond its own
//! connection mutex required.

use crate::aggregate::{AggregationEngine, NearestDirection};
use crate::report::{format_report, ReportInputs};
use crate::source::EventSource;
use crate::sync::SyncEngine;
use crate::telegram::ReportSink;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Duration, Instant};

/// Delay before the first scheduled cycle, so startup logging settles
/// before the first report goes out.
const FIRST_TICK_DELAY_SECS: u64 = 1;

/// On-demand request for a full sync+report cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTrigger {
    OnDemand,
}

/// Everything one report cycle needs: engines, delivery, and the report
/// parameters that do not change between ticks.
pub struct ReportCycle {
    pub sync: SyncEngine,
    pub aggregation: AggregationEngine,
    pub source: Arc<dyn EventSource>,
    pub sink: Arc<dyn ReportSink>,
    pub wallet_address: String,
    pub receiver_chat_id: String,
    pub report_period_secs: u64,
    pub token_symbol: String,
    pub base_symbol: String,
}

impl ReportCycle {
    /// Run one sync + aggregate + format + deliver sequence.
    ///
    /// Any failure is logged and the cycle is abandoned; the next tick
    /// retries from the same cursor, so the fixed interval doubles as the
    /// retry backoff.
    pub async fn run(&self) {
        if let Err(e) = self.sync.sync().await {
            log::error!("❌ Sync failed, skipping report this tick: {}", e);
            return;
        }

        let end = Utc::now();
        let start = end - chrono::Duration::seconds(self.report_period_secs as i64);

        let window = match self.aggregation.summarize(start, end).await {
            Ok(window) => window,
            Err(e) => {
                log::error!(
                    "❌ Aggregation failed for window [{}, {}]: {}",
                    start,
                    end,
                    e
                );
                return;
            }
        };

        if window.is_empty() {
            log::info!("📊 No distributions in the current window, sending zero report");
        }

        // The nominal bounds rarely land on an event; report the true
        // first/last transaction timestamps instead
        let first_tx = match self
            .aggregation
            .nearest_boundary(start, NearestDirection::AtOrAfter)
            .await
        {
            Ok(ts) => ts,
            Err(e) => {
                log::error!("❌ Boundary lookup failed at {}: {}", start, e);
                return;
            }
        };
        let last_tx = match self
            .aggregation
            .nearest_boundary(end, NearestDirection::AtOrBefore)
            .await
        {
            Ok(ts) => ts,
            Err(e) => {
                log::error!("❌ Boundary lookup failed at {}: {}", end, e);
                return;
            }
        };

        let balance = match self.source.get_balance(&self.wallet_address).await {
            Ok(balance) => balance,
            Err(e) => {
                log::error!(
                    "❌ Balance lookup failed for {}: {}",
                    self.wallet_address,
                    e
                );
                return;
            }
        };

        let text = format_report(
            &ReportInputs {
                window: &window,
                balance: &balance,
                wallet_address: &self.wallet_address,
                first_tx,
                last_tx,
                token_symbol: &self.token_symbol,
                base_symbol: &self.base_symbol,
            },
            end,
        );

        log::info!("📨 Sending report to chat {}...", self.receiver_chat_id);
        if let Err(e) = self.sink.send(&self.receiver_chat_id, &text).await {
            log::error!(
                "❌ Failed to deliver report to chat {}: {}",
                self.receiver_chat_id,
                e
            );
        }
    }
}

/// Drive report cycles until the trigger channel closes.
///
/// First fire comes after a short fixed delay, then every `interval_secs`.
/// On-demand triggers run the exact same sequence as the timer.
pub async fn run_report_loop(
    cycle: ReportCycle,
    interval_secs: u64,
    mut trigger_rx: mpsc::Receiver<ReportTrigger>,
) {
    log::info!(
        "⏰ Starting report loop (interval: {}s, first cycle in {}s)",
        interval_secs,
        FIRST_TICK_DELAY_SECS
    );

    let mut timer = interval_at(
        Instant::now() + Duration::from_secs(FIRST_TICK_DELAY_SECS),
        Duration::from_secs(interval_secs),
    );

    loop {
        tokio::select! {
            _ = timer.tick() => {
                log::info!("⏰ Interval report cycle");
                cycle.run().await;
            }
            trigger = trigger_rx.recv() => {
                match trigger {
                    Some(ReportTrigger::OnDemand) => {
                        log::info!("📥 On-demand report cycle");
                        cycle.run().await;
                    }
                    None => {
                        log::warn!("⚠️  Trigger channel closed, stopping report loop");
                        break;
                    }
                }
            }
        }
    }

    log::info!("✅ Report loop stopped");
}
