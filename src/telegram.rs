//! Telegram delivery - report sink and /start command poller
//!
//! Delivery is fire-and-forget: one message per reporting cycle to the
//! configured chat. The poller long-polls the Bot API for operator commands;
//! `/start` answers with a one-line status message and queues an on-demand
//! report cycle through the scheduler's trigger channel.

use crate::scheduler::ReportTrigger;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

/// Bot API long-poll duration. The HTTP client timeout must sit above it.
const POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug)]
pub enum SinkError {
    /// Transport-level failure (connect, timeout, non-2xx status).
    Http(String),
    /// The Bot API answered with ok=false.
    Api(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Http(e) => write!(f, "Telegram HTTP error: {}", e),
            SinkError::Api(e) => write!(f, "Telegram API error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

/// Outbound delivery channel for formatted reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), SinkError>;
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    description: Option<String>,
    result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    text: Option<String>,
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramSink {
    client: reqwest::Client,
    api_base: String,
}

impl TelegramSink {
    pub fn new(bot_token: &str) -> Result<Self, SinkError> {
        Self::with_api_base(format!("https://api.telegram.org/bot{}", bot_token))
    }

    /// Point the client at a different gateway (tests, self-hosted bot API).
    pub fn with_api_base(api_base: String) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()
            .map_err(|e| SinkError::Http(e.to_string()))?;

        Ok(Self { client, api_base })
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<ApiEnvelope, SinkError> {
        let url = format!("{}/{}", self.api_base, method);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SinkError::Http(format!("{}: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(SinkError::Http(format!(
                "{}: HTTP {}",
                method,
                response.status()
            )));
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| SinkError::Http(format!("{}: {}", method, e)))?;

        if !envelope.ok {
            return Err(SinkError::Api(format!(
                "{}: {}",
                method,
                envelope.description.as_deref().unwrap_or("unknown error")
            )));
        }

        Ok(envelope)
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, SinkError> {
        let envelope = self
            .call(
                "getUpdates",
                json!({ "timeout": POLL_TIMEOUT_SECS, "offset": offset }),
            )
            .await?;

        let result = envelope.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result)
            .map_err(|e| SinkError::Api(format!("getUpdates payload: {}", e)))
    }
}

#[async_trait]
impl ReportSink for TelegramSink {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), SinkError> {
        self.call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }
}

/// One-line status answer to the /start command.
pub fn welcome_message(receiver_chat_id: &str, interval_secs: u64) -> String {
    format!(
        "Hello! Thank you for launching! From now on a total distributions report goes to chat {} every {} seconds.",
        receiver_chat_id, interval_secs
    )
}

/// Long-poll the Bot API for operator commands.
///
/// Runs until the report loop drops its trigger receiver. Poll failures are
/// logged and retried after a short sleep; the poller never touches the
/// event store, it only replies and queues triggers.
pub async fn poll_commands(
    sink: TelegramSink,
    trigger_tx: mpsc::Sender<ReportTrigger>,
    receiver_chat_id: String,
    interval_secs: u64,
) {
    log::info!("📥 Command poller started (long-poll: {}s)", POLL_TIMEOUT_SECS);

    let mut offset = 0i64;

    loop {
        let updates = match sink.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                log::warn!("⚠️  getUpdates failed: {}", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };

            let is_start = message
                .text
                .as_deref()
                .map(|t| t.trim().starts_with("/start"))
                .unwrap_or(false);
            if !is_start {
                continue;
            }

            let chat_id = message.chat.id.to_string();
            log::info!("📥 /start command from chat {}", chat_id);

            let welcome = welcome_message(&receiver_chat_id, interval_secs);
            if let Err(e) = sink.send(&chat_id, &welcome).await {
                log::warn!("⚠️  Failed to answer /start in chat {}: {}", chat_id, e);
            }

            if trigger_tx.send(ReportTrigger::OnDemand).await.is_err() {
                log::warn!("⚠️  Report loop stopped, shutting down command poller");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_message_names_destination_and_interval() {
        let message = welcome_message("-1001234", 14400);
        assert!(message.contains("-1001234"));
        assert!(message.contains("14400 seconds"));
    }

    #[test]
    fn test_update_deserializes_bot_api_shape() {
        let raw = r#"{
            "update_id": 7,
            "message": {
                "message_id": 1,
                "text": "/start",
                "chat": {"id": -100123, "type": "supergroup"}
            }
        }"#;

        let update: Update = serde_json::from_str(raw).unwrap();
        assert_eq!(update.update_id, 7);
        let message = update.message.unwrap();
        assert_eq!(message.text.as_deref(), Some("/start"));
        assert_eq!(message.chat.id, -100123);
    }
}
