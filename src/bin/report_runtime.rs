//! Report Runtime - production binary
//!
//! Wires the sync + report pipeline together:
//! - Opens the SQLite event store (schema is created idempotently)
//! - Probes the ledger RPC endpoint (no data source means no startup)
//! - Spawns the Telegram command poller (/start trigger)
//! - Runs the report loop (fixed interval + on-demand)
//!
//! Usage:
//!   cargo run --release --bin report_runtime
//!
//! Configuration is environment-driven; see `distflow::config::Config`.

use distflow::aggregate::AggregationEngine;
use distflow::config::Config;
use distflow::rpc::RpcEventSource;
use distflow::scheduler::{run_report_loop, ReportCycle, ReportTrigger};
use distflow::source::EventSource;
use distflow::store::{EventStore, SqliteEventStore};
use distflow::sync::SyncEngine;
use distflow::telegram::{poll_commands, ReportSink, TelegramSink};
use dotenv::dotenv;
use log::{error, info};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    info!("🚀 Distribution report runtime starting...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("📊 Configuration:");
    info!("   ├─ Provider: {}", config.provider_url);
    info!("   ├─ Contract: {}", config.contract_address);
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Report window: {}s", config.report_period_sec);
    info!("   ├─ Send interval: {}s", config.report_send_interval_sec);
    info!("   └─ Receiver chat: {}", config.report_receiver_chat_id);

    let store: Arc<dyn EventStore> = Arc::new(SqliteEventStore::open(&config.db_path)?);

    // No data source, no process: the probe failing here is fatal
    let source: Arc<dyn EventSource> = match RpcEventSource::connect(
        &config.provider_url,
        &config.contract_address,
        &config.event_topic,
        config.rpc_timeout_sec,
    )
    .await
    {
        Ok(source) => Arc::new(source),
        Err(e) => {
            error!("❌ Cannot reach ledger RPC, refusing to start: {}", e);
            std::process::exit(1);
        }
    };

    let sink = TelegramSink::new(&config.telegram_bot_token)?;

    let (trigger_tx, trigger_rx) = mpsc::channel::<ReportTrigger>(8);

    let poller_sink = sink.clone();
    let poller_chat = config.report_receiver_chat_id.clone();
    let poller_interval = config.report_send_interval_sec;
    tokio::spawn(async move {
        poll_commands(poller_sink, trigger_tx, poller_chat, poller_interval).await;
    });
    info!("✅ Command poller spawned");

    let cycle = ReportCycle {
        sync: SyncEngine::new(source.clone(), store.clone()),
        aggregation: AggregationEngine::new(store.clone()),
        source: source.clone(),
        sink: Arc::new(sink) as Arc<dyn ReportSink>,
        wallet_address: config.distributor_wallet_address.clone(),
        receiver_chat_id: config.report_receiver_chat_id.clone(),
        report_period_secs: config.report_period_sec,
        token_symbol: config.token_symbol.clone(),
        base_symbol: config.base_symbol.clone(),
    };

    let interval = config.report_send_interval_sec;
    let loop_handle = tokio::spawn(async move {
        run_report_loop(cycle, interval, trigger_rx).await;
    });
    info!("✅ Report loop running");
    info!("🔄 Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }

    // Let an in-flight cycle finish. A hard kill is still safe: appends are
    // per-event and the cursor is re-derived from the store next start.
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
    loop_handle.abort();

    info!("✅ Report runtime stopped");
    Ok(())
}
