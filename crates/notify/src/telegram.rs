use anyhow::{anyhow, Context, Result};
use bagwatch_config::DispatchConfig;
use bagwatch_core_types::Notification;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::sink::{NotificationSink, SinkError, SinkErrorKind};

/// Telegram limit for photo captions.
const CAPTION_LIMIT: usize = 1024;

/// Telegram Bot API sink (`sendPhoto` with caption, `sendMessage` otherwise).
#[derive(Debug, Clone)]
pub struct TelegramSink {
    client: Client,
    api_base_url: String,
    token: String,
}

impl TelegramSink {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        let token = config.telegram_token.trim();
        if token.is_empty() {
            return Err(anyhow!("telegram sink requires TELEGRAM_TOKEN"));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(100)))
            .build()
            .context("failed to build telegram http client")?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim().trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base_url, self.token, method)
    }

    /// `getMe`; returns the bot username.
    pub async fn check_identity(&self) -> Result<String> {
        let body = self
            .call("getMe", &json!({}))
            .await
            .map_err(|error| anyhow!("telegram getMe failed: {error}"))?;
        Ok(body
            .pointer("/result/username")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }

    pub async fn send_text(&self, chat_id: &str, text: &str) -> std::result::Result<(), SinkError> {
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": false,
        });
        self.call("sendMessage", &payload).await.map(|_| ())
    }

    async fn send_photo(
        &self,
        chat_id: &str,
        photo: &str,
        caption: &str,
    ) -> std::result::Result<(), SinkError> {
        let payload = json!({
            "chat_id": chat_id,
            "photo": photo,
            "caption": caption,
            "parse_mode": "HTML",
        });
        self.call("sendPhoto", &payload).await.map(|_| ())
    }

    async fn call(&self, method: &str, payload: &Value) -> std::result::Result<Value, SinkError> {
        // The request URL embeds the bot token; keep it out of error text.
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|error| {
                SinkError::retryable(
                    "telegram_unavailable",
                    format!("method={method} request_error={}", error.without_url()),
                )
            })?;
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        classify_response(method, status, body)
    }
}

pub(crate) fn classify_response(
    method: &str,
    status: u16,
    body: Value,
) -> std::result::Result<Value, SinkError> {
    let ok = body.get("ok").and_then(Value::as_bool).unwrap_or(false);
    if (200..300).contains(&status) && ok {
        return Ok(body);
    }
    let description = body
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("no description");
    let detail = format!("method={method} http_status={status} description={description}");
    match status {
        429 => {
            let retry_after = body
                .pointer("/parameters/retry_after")
                .and_then(Value::as_u64)
                .map(Duration::from_secs);
            Err(SinkError::rate_limited("telegram_rate_limited", detail, retry_after))
        }
        500..=599 => Err(SinkError::retryable("telegram_server_error", detail)),
        400 => Err(SinkError::terminal("telegram_bad_request", detail)),
        401 | 404 => Err(SinkError::terminal("telegram_unauthorized", detail)),
        403 => Err(SinkError::terminal("telegram_forbidden", detail)),
        _ if (200..300).contains(&status) => {
            Err(SinkError::retryable("telegram_invalid_response", detail))
        }
        _ => Err(SinkError::terminal("telegram_rejected", detail)),
    }
}

impl NotificationSink for TelegramSink {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, notification: &Notification) -> std::result::Result<(), SinkError> {
        let chat_id = notification.channel_target.as_str();
        let photo = notification
            .image_uri
            .as_deref()
            .filter(|_| notification.text.chars().count() <= CAPTION_LIMIT);
        if let Some(photo) = photo {
            match self.send_photo(chat_id, photo, &notification.text).await {
                Ok(()) => return Ok(()),
                Err(error) if error.kind == SinkErrorKind::Terminal && error.code == "telegram_bad_request" => {
                    warn!(
                        token_id = %notification.token_id,
                        error = %error,
                        "telegram rejected photo; sending text only"
                    );
                }
                Err(error) => return Err(error),
            }
        } else if notification.image_uri.is_some() {
            debug!(
                token_id = %notification.token_id,
                "caption too long for photo; sending text only"
            );
        }
        self.send_text(chat_id, &notification.text).await
    }
}
