//! Runtime configuration from environment variables

use std::env;

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the report runtime.
///
/// Loaded from environment variables; a missing required variable or an
/// invalid value is fatal at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ledger JSON-RPC endpoint
    pub provider_url: String,

    /// Distribution contract address
    pub contract_address: String,

    /// topic0 hash of the distribution event signature
    pub event_topic: String,

    /// Wallet whose balance the report shows
    pub distributor_wallet_address: String,

    pub telegram_bot_token: String,

    /// Chat that receives the periodic report
    pub report_receiver_chat_id: String,

    /// Path to the SQLite database file
    pub db_path: String,

    /// Rolling window length covered by each report, in seconds
    pub report_period_sec: u64,

    /// How often a report is sent, in seconds
    pub report_send_interval_sec: u64,

    pub token_symbol: String,
    pub base_symbol: String,

    /// Request timeout for ledger RPC calls, in seconds
    pub rpc_timeout_sec: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required: `PROVIDER_URL`, `CONTRACT_ADDRESS`,
    /// `DISTRIBUTION_EVENT_TOPIC`, `DISTRIBUTOR_WALLET_ADDRESS`,
    /// `TELEGRAM_BOT_TOKEN`, `REPORT_RECEIVER_CHAT_ID`.
    ///
    /// Optional with defaults: `DISTFLOW_DB_PATH` (distflow.db),
    /// `REPORT_PERIOD_SEC` (86400), `REPORT_SEND_INTERVAL_SEC` (14400),
    /// `TOKEN_SYMBOL` (TOKEN), `BASE_SYMBOL` (ETH), `RPC_TIMEOUT_SEC` (10).
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider_url = required("PROVIDER_URL")?;
        if !provider_url.starts_with("http://") && !provider_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "PROVIDER_URL must start with http:// or https://".to_string(),
            ));
        }

        let contract_address = required("CONTRACT_ADDRESS")?;

        let event_topic = required("DISTRIBUTION_EVENT_TOPIC")?;
        let topic_digits = event_topic.trim_start_matches("0x");
        if topic_digits.len() != 64 || !topic_digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::InvalidValue(
                "DISTRIBUTION_EVENT_TOPIC must be a 32-byte hex hash".to_string(),
            ));
        }

        let report_send_interval_sec = parse_or("REPORT_SEND_INTERVAL_SEC", 14_400);
        if report_send_interval_sec == 0 {
            return Err(ConfigError::InvalidValue(
                "REPORT_SEND_INTERVAL_SEC must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            provider_url,
            contract_address,
            event_topic,
            distributor_wallet_address: required("DISTRIBUTOR_WALLET_ADDRESS")?,
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            report_receiver_chat_id: required("REPORT_RECEIVER_CHAT_ID")?,
            db_path: env::var("DISTFLOW_DB_PATH").unwrap_or_else(|_| "distflow.db".to_string()),
            report_period_sec: parse_or("REPORT_PERIOD_SEC", 86_400),
            report_send_interval_sec,
            token_symbol: env::var("TOKEN_SYMBOL").unwrap_or_else(|_| "TOKEN".to_string()),
            base_symbol: env::var("BASE_SYMBOL").unwrap_or_else(|_| "ETH".to_string()),
            rpc_timeout_sec: parse_or("RPC_TIMEOUT_SEC", 10),
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVariable(name.to_string()))
}

fn parse_or(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
