//! Telegram channel adapter.
//!
//! Implements the Channel trait for the Telegram Bot API using long
//! polling (`getUpdates`). Replies go out through `sendMessage`, typing
//! indicators through `sendChatAction`. Only text messages are relayed;
//! stickers, photos and other update kinds are skipped.

use async_trait::async_trait;
use mercy_config::TelegramSettings;
use mercy_core::channel::{Channel, ChannelId, ChannelMessage};
use mercy_core::error::ChannelError;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram rejects messages longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Delay before retrying after a failed poll.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// Allowed user IDs or usernames. Empty = deny all, ["*"] = allow all.
    pub allowed_users: Vec<String>,
    /// Long-polling timeout passed to `getUpdates`.
    pub poll_timeout_secs: u64,
    /// Bot API base URL (overridable for tests).
    pub api_base: String,
}

impl TelegramConfig {
    /// Build from the `[telegram]` config section. `None` when no token is set.
    pub fn from_settings(settings: &TelegramSettings) -> Option<Self> {
        let token = settings.bot_token.as_deref()?.trim();
        if token.is_empty() {
            return None;
        }
        Some(Self {
            bot_token: token.to_string(),
            allowed_users: settings.allowed_users.clone(),
            poll_timeout_secs: settings.poll_timeout_secs,
            api_base: DEFAULT_API_BASE.into(),
        })
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("allowed_users", &self.allowed_users)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Telegram channel adapter.
pub struct TelegramChannel {
    config: TelegramConfig,
    channel_id: ChannelId,
    client: reqwest::Client,
    poller: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self, ChannelError> {
        // The long poll must finish before the HTTP timeout fires.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()
            .map_err(|e| ChannelError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            config,
            channel_id: ChannelId("telegram".into()),
            client,
            poller: tokio::sync::Mutex::new(None),
        })
    }

    fn method_url(config: &TelegramConfig, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            config.api_base.trim_end_matches('/'),
            config.bot_token
        )
    }

    fn allowed(allowed_users: &[String], sender_id: &str, username: Option<&str>) -> bool {
        if allowed_users.iter().any(|u| u == "*") {
            return true;
        }
        allowed_users
            .iter()
            .any(|u| u == sender_id || username.is_some_and(|name| u.trim_start_matches('@') == name))
    }

    /// Call a Bot API method and unwrap its `result` field.
    async fn call<T: serde::de::DeserializeOwned>(
        client: &reqwest::Client,
        config: &TelegramConfig,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, ChannelError> {
        let response = client
            .post(Self::method_url(config, method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionLost(format!("{method}: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ChannelError::Unauthorized {
                channel: "telegram".into(),
                reason: "bot token rejected".into(),
            });
        }

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(format!("{method}: {e}")))?;

        match (envelope.ok, envelope.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(ChannelError::DeliveryFailed {
                channel: "telegram".into(),
                reason: format!(
                    "{method} failed ({status}): {}",
                    envelope.description.unwrap_or_default()
                ),
            }),
        }
    }

    /// Convert one update into a message, if it carries text from a permitted sender.
    fn to_channel_message(
        channel_id: &ChannelId,
        allowed_users: &[String],
        update: Update,
    ) -> Option<ChannelMessage> {
        let message = update.message?;
        let text = message.text?;
        let from = message.from?;
        let sender_id = from.id.to_string();

        if !Self::allowed(allowed_users, &sender_id, from.username.as_deref()) {
            debug!(sender_id = %sender_id, "Ignoring message from user not on allowlist");
            return None;
        }

        Some(ChannelMessage {
            channel_id: channel_id.clone(),
            sender_id,
            sender_name: from.username.or(from.first_name),
            content: text,
            chat_id: message.chat.id.to_string(),
            message_id: Some(message.message_id.to_string()),
        })
    }

    async fn poll_loop(
        client: reqwest::Client,
        config: TelegramConfig,
        channel_id: ChannelId,
        tx: mpsc::Sender<Result<ChannelMessage, ChannelError>>,
    ) {
        let mut offset: i64 = 0;

        loop {
            let body = serde_json::json!({
                "offset": offset,
                "timeout": config.poll_timeout_secs,
                "allowed_updates": ["message"],
            });

            let updates: Vec<Update> = match Self::call(&client, &config, "getUpdates", &body).await {
                Ok(updates) => updates,
                Err(e @ ChannelError::Unauthorized { .. }) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Telegram poll failed, retrying");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Some(msg) = Self::to_channel_message(&channel_id, &config.allowed_users, update)
                    && tx.send(Ok(msg)).await.is_err()
                {
                    debug!("Receiver dropped, stopping Telegram poller");
                    return;
                }
            }

            if tx.is_closed() {
                return;
            }
        }
    }

    /// Split text into chunks Telegram will accept, preferring newline boundaries.
    fn split_message(content: &str) -> Vec<String> {
        if content.chars().count() <= MAX_MESSAGE_CHARS {
            return vec![content.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for line in content.split_inclusive('\n') {
            for ch in line.chars() {
                if current_len == MAX_MESSAGE_CHARS {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.push(ch);
                current_len += 1;
            }
            // Start a fresh chunk at a line break once past half the limit.
            if current_len > MAX_MESSAGE_CHARS / 2 {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        if self.config.bot_token.is_empty() {
            return Err(ChannelError::NotConfigured("Telegram bot token is not set".into()));
        }

        let mut poller = self.poller.lock().await;
        if let Some(handle) = poller.take() {
            handle.abort();
        }

        info!(poll_timeout_secs = self.config.poll_timeout_secs, "Telegram channel starting");
        let (tx, rx) = mpsc::channel(64);
        *poller = Some(tokio::spawn(Self::poll_loop(
            self.client.clone(),
            self.config.clone(),
            self.channel_id.clone(),
            tx,
        )));
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        let reply_to: Option<i64> = reply_to.and_then(|id| id.parse().ok());

        for (i, chunk) in Self::split_message(content).into_iter().enumerate() {
            let mut body = serde_json::json!({ "chat_id": chat_id, "text": chunk });
            // Only the first chunk threads onto the user's message.
            if let (0, Some(id)) = (i, reply_to) {
                body["reply_to_message_id"] = id.into();
            }
            Self::call::<serde_json::Value>(&self.client, &self.config, "sendMessage", &body).await?;
        }

        debug!(chat_id = %chat_id, content_len = content.len(), "Telegram message sent");
        Ok(())
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({ "chat_id": chat_id, "action": "typing" });
        Self::call::<serde_json::Value>(&self.client, &self.config, "sendChatAction", &body)
            .await
            .map(|_| ())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        Self::allowed(&self.config.allowed_users, sender_id, None)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Telegram channel stopping");
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        if self.config.bot_token.is_empty() {
            return Ok(false);
        }
        let me: User =
            Self::call(&self.client, &self.config, "getMe", &serde_json::json!({})).await?;
        debug!(bot = ?me.username, "Telegram getMe succeeded");
        Ok(true)
    }
}

// ── Bot API wire types ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    #[serde(default)]
    from: Option<User>,
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}
