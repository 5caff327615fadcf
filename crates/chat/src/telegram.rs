//! Telegram Bot API transport over HTTPS long polling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use riego_core::config::ChatConfig;
use riego_core::domain::reading::UserId;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::events::{ChatEvent, ChatUpdate, OutboundMessage};
use crate::transport::{ChatTransport, TransportError};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Slack on top of the long-poll window before the HTTP client gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Fragment of the Bot API description when Markdown in a message does not parse.
const ENTITY_REJECTION: &str = "can't parse entities";

/// Attachment keys checked, in order, to name a non-text message.
const MEDIA_KINDS: [&str; 8] =
    ["photo", "document", "voice", "audio", "video", "sticker", "location", "contact"];

pub struct TelegramTransport {
    client: Client,
    api_base: String,
    token: SecretString,
    poll_timeout_secs: u64,
    offset: Mutex<Option<i64>>,
}

impl TelegramTransport {
    pub fn new(config: &ChatConfig) -> Result<Self, TransportError> {
        Self::with_api_base(config, DEFAULT_API_BASE)
    }

    pub fn with_api_base(config: &ChatConfig, api_base: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs) + POLL_GRACE)
            .build()
            .map_err(|error| TransportError::Connect(error.without_url().to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_owned(),
            token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
            offset: Mutex::new(None),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token.expose_secret(), method)
    }

    /// Calls a Bot API method and unwraps its `{ok, result}` envelope.
    ///
    /// Errors never carry the request URL, which embeds the token.
    async fn call(
        &self,
        method: &str,
        body: &impl Serialize,
        wrap: fn(String) -> TransportError,
    ) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|error| wrap(error.without_url().to_string()))?;
        let status = response.status();
        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|error| {
                wrap(format!("{method} returned HTTP {status}: {}", error.without_url()))
            })?;
        envelope.into_result(method).map_err(wrap)
    }
}

#[derive(Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Value,
}

impl ApiEnvelope {
    fn into_result(self, method: &str) -> Result<Value, String> {
        if self.ok {
            Ok(self.result)
        } else {
            Err(format!(
                "{method} rejected: {}",
                self.description.as_deref().unwrap_or("no description")
            ))
        }
    }
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<Value>,
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let me = self.call("getMe", &serde_json::json!({}), TransportError::Connect).await?;
        info!(
            event_name = "ingress.telegram.connected",
            bot = me.get("username").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
            "telegram bot identified"
        );
        Ok(())
    }

    async fn next_updates(&self) -> Result<Option<Vec<ChatUpdate>>, TransportError> {
        let mut offset = self.offset.lock().await;
        let request = GetUpdates {
            offset: *offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: &["message"],
        };
        let result = self.call("getUpdates", &request, TransportError::Receive).await?;
        let batch = parse_updates(&result)?;
        if let Some(next) = batch.next_offset {
            *offset = Some(next);
        }
        debug!(
            event_name = "ingress.telegram.polled",
            updates = batch.updates.len(),
            offset = ?*offset,
            "telegram poll finished"
        );
        Ok(Some(batch.updates))
    }

    /// A message whose Markdown Telegram refuses goes out again as plain text.
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let request = SendMessage {
            chat_id: message.chat_id,
            text: &message.text,
            parse_mode: message.markdown.then_some("Markdown"),
            reply_markup: message.markup.to_telegram(),
        };
        match self.call("sendMessage", &request, TransportError::Send).await {
            Ok(_) => Ok(()),
            Err(TransportError::Send(detail))
                if request.parse_mode.is_some() && detail.contains(ENTITY_REJECTION) =>
            {
                warn!(
                    event_name = "egress.telegram.markdown_rejected",
                    chat_id = message.chat_id,
                    detail = %detail,
                    "resending message without formatting"
                );
                let plain = SendMessage { parse_mode: None, ..request };
                self.call("sendMessage", &plain, TransportError::Send).await?;
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    pub updates: Vec<ChatUpdate>,
    /// Offset acknowledging everything seen, including updates that were skipped.
    pub next_offset: Option<i64>,
}

#[derive(Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Deserialize)]
struct RawMessage {
    chat: RawChat,
    #[serde(default)]
    from: Option<RawUser>,
    #[serde(default)]
    text: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct RawChat {
    id: i64,
}

#[derive(Deserialize)]
struct RawUser {
    id: i64,
}

/// Parses the `result` array of a `getUpdates` answer.
///
/// Updates without a message (edits, callbacks) are dropped but still
/// advance the offset so they are not delivered again.
pub fn parse_updates(result: &Value) -> Result<UpdateBatch, TransportError> {
    let raw: Vec<RawUpdate> = serde_json::from_value(result.clone())
        .map_err(|error| TransportError::Receive(format!("malformed getUpdates result: {error}")))?;

    let next_offset = raw.iter().map(|update| update.update_id).max().map(|id| id + 1);
    let updates = raw
        .into_iter()
        .filter_map(|update| {
            let message = update.message?;
            let user_id = message.from.as_ref().map_or(message.chat.id, |user| user.id);
            let event = match message.text {
                Some(text) => ChatEvent::Text(text),
                None => ChatEvent::Unsupported {
                    kind: MEDIA_KINDS
                        .iter()
                        .find(|kind| message.rest.contains_key(**kind))
                        .map_or("other", |kind| *kind)
                        .to_owned(),
                },
            };
            Some(ChatUpdate {
                update_id: update.update_id,
                chat_id: message.chat.id,
                user_id: UserId(user_id.to_string()),
                event,
            })
        })
        .collect();

    Ok(UpdateBatch { updates, next_offset })
}
