//! JSON-RPC event source - live `EventSource` backed by an EVM node
//!
//! Speaks plain JSON-RPC 2.0 over HTTP with reqwest:
//! - `eth_getLogs` filtered by contract address + event topic
//! - `eth_getBlockByNumber` for block timestamps (cached per batch)
//! - `eth_getBalance` for the distributor wallet
//! - `eth_blockNumber` as the startup connectivity probe
//!
//! Log data is the ABI encoding of the four distribution amounts: four
//! 32-byte big-endian words in declaration order (input token, distributed
//! token, swapped base, distributed base).

use crate::events::DistributionEvent;
use crate::source::{EventSource, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use num_bigint::BigUint;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// One log entry as returned by `eth_getLogs`. Quantities arrive as 0x-hex.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "transactionIndex")]
    pub transaction_index: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<Value>,
}

/// The four amounts carried in a distribution log's data field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAmounts {
    pub input_token: BigUint,
    pub distributed_token: BigUint,
    pub swapped_base: BigUint,
    pub distributed_base: BigUint,
}

/// Parse a 0x-prefixed hex quantity into u64 (block numbers, indexes).
pub fn decode_quantity(value: &str) -> Result<u64, SourceError> {
    let digits = value.trim_start_matches("0x");
    if digits.is_empty() {
        return Err(SourceError::Decode(format!(
            "Empty hex quantity: '{}'",
            value
        )));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| SourceError::Decode(format!("Invalid hex quantity '{}': {}", value, e)))
}

/// Decode the 4x32-byte data payload of a distribution log.
pub fn decode_amount_words(data: &str) -> Result<DecodedAmounts, SourceError> {
    let bytes = hex::decode(data.trim_start_matches("0x"))
        .map_err(|e| SourceError::Decode(format!("Invalid log data hex: {}", e)))?;

    if bytes.len() < 128 {
        return Err(SourceError::Decode(format!(
            "Log data too short: {} bytes, expected at least 128",
            bytes.len()
        )));
    }

    let word = |i: usize| BigUint::from_bytes_be(&bytes[i * 32..(i + 1) * 32]);

    Ok(DecodedAmounts {
        input_token: word(0),
        distributed_token: word(1),
        swapped_base: word(2),
        distributed_base: word(3),
    })
}

/// Live event source talking to an EVM JSON-RPC endpoint.
pub struct RpcEventSource {
    client: reqwest::Client,
    provider_url: String,
    contract_address: String,
    event_topic: String,
}

impl RpcEventSource {
    /// Build the client and probe the endpoint with `eth_blockNumber`.
    ///
    /// A failed probe means the process has no data source, so startup must
    /// not proceed. Request/connect timeouts live here at the client layer,
    /// not in the engine.
    pub async fn connect(
        provider_url: &str,
        contract_address: &str,
        event_topic: &str,
        timeout_sec: u64,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .map_err(|e| SourceError::Connectivity(e.to_string()))?;

        let source = Self {
            client,
            provider_url: provider_url.to_string(),
            contract_address: contract_address.to_string(),
            event_topic: event_topic.to_string(),
        };

        let head = source.call("eth_blockNumber", json!([])).await?;
        let head = head
            .as_str()
            .map(decode_quantity)
            .transpose()?
            .unwrap_or_default();
        log::info!("🔌 Connected to ledger RPC (head block: {})", head);

        Ok(source)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, SourceError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.provider_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::Connectivity(format!("{}: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(SourceError::Connectivity(format!(
                "{}: HTTP {}",
                method,
                response.status()
            )));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(format!("{}: {}", method, e)))?;

        if let Some(error) = parsed.error {
            return Err(SourceError::Rpc(format!("{}: {}", method, error)));
        }

        parsed
            .result
            .ok_or_else(|| SourceError::Decode(format!("{}: response without result", method)))
    }

    async fn fetch_block_time(&self, block_number: u64) -> Result<DateTime<Utc>, SourceError> {
        let params = json!([format!("0x{:x}", block_number), false]);
        let result = self.call("eth_getBlockByNumber", params).await?;

        let header: BlockHeader = serde_json::from_value(result).map_err(|e| {
            SourceError::Decode(format!("Block {} header: {}", block_number, e))
        })?;

        let timestamp = decode_quantity(&header.timestamp)?;
        Utc.timestamp_opt(timestamp as i64, 0).single().ok_or_else(|| {
            SourceError::Decode(format!(
                "Block {} has out-of-range timestamp {}",
                block_number, timestamp
            ))
        })
    }
}

#[async_trait]
impl EventSource for RpcEventSource {
    async fn list_events(&self, from_block: u64) -> Result<Vec<DistributionEvent>, SourceError> {
        let params = json!([{
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": "latest",
            "address": self.contract_address,
            "topics": [self.event_topic],
        }]);

        let result = self.call("eth_getLogs", params).await?;
        let logs: Vec<LogEntry> = serde_json::from_value(result)
            .map_err(|e| SourceError::Decode(format!("eth_getLogs: {}", e)))?;

        // One block can carry several logs; look its timestamp up once.
        // TODO: batch the header lookups into a single JSON-RPC batch request
        let mut block_times: HashMap<u64, DateTime<Utc>> = HashMap::new();
        let mut events = Vec::with_capacity(logs.len());

        for entry in logs {
            let block_number = decode_quantity(&entry.block_number)?;
            let transaction_index = decode_quantity(&entry.transaction_index)? as u32;
            let log_index = decode_quantity(&entry.log_index)? as u32;

            let occurred_at = match block_times.get(&block_number) {
                Some(ts) => *ts,
                None => {
                    let ts = self.fetch_block_time(block_number).await?;
                    block_times.insert(block_number, ts);
                    ts
                }
            };

            let amounts = decode_amount_words(&entry.data)?;

            events.push(DistributionEvent {
                block_number,
                transaction_index,
                log_index,
                input_token_amount: amounts.input_token,
                distributed_token_amount: amounts.distributed_token,
                swapped_base_amount: amounts.swapped_base,
                distributed_base_amount: amounts.distributed_base,
                occurred_at,
            });
        }

        Ok(events)
    }

    async fn get_balance(&self, address: &str) -> Result<BigUint, SourceError> {
        let result = self
            .call("eth_getBalance", json!([address, "latest"]))
            .await?;

        let balance_hex = result
            .as_str()
            .ok_or_else(|| SourceError::Decode("eth_getBalance: non-string result".to_string()))?;

        let digits = balance_hex.trim_start_matches("0x");
        if digits.is_empty() {
            return Ok(BigUint::default());
        }

        BigUint::parse_bytes(digits.as_bytes(), 16).ok_or_else(|| {
            SourceError::Decode(format!("eth_getBalance: invalid hex '{}'", balance_hex))
        })
    }
}
