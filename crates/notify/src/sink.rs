use anyhow::{anyhow, Result};
use bagwatch_config::DispatchConfig;
use bagwatch_core_types::Notification;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::info;

use crate::telegram::TelegramSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErrorKind {
    RateLimited,
    Retryable,
    Terminal,
}

#[derive(Debug, Clone)]
pub struct SinkError {
    pub kind: SinkErrorKind,
    pub code: String,
    pub detail: String,
    pub retry_after: Option<Duration>,
}

impl SinkError {
    pub fn rate_limited(
        code: impl Into<String>,
        detail: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self {
            kind: SinkErrorKind::RateLimited,
            code: code.into(),
            detail: detail.into(),
            retry_after,
        }
    }

    pub fn retryable(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: SinkErrorKind::Retryable,
            code: code.into(),
            detail: detail.into(),
            retry_after: None,
        }
    }

    pub fn terminal(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: SinkErrorKind::Terminal,
            code: code.into(),
            detail: detail.into(),
            retry_after: None,
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sink_error kind={:?} code={} detail={}",
            self.kind, self.code, self.detail
        )
    }
}

impl std::error::Error for SinkError {}

pub trait NotificationSink {
    fn name(&self) -> &'static str;

    fn send(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = std::result::Result<(), SinkError>> + Send;
}

/// Dry-run sink: writes the rendered notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> std::result::Result<(), SinkError> {
        info!(
            channel = %notification.channel_target,
            token_id = %notification.token_id,
            image_uri = notification.image_uri.as_deref().unwrap_or_default(),
            text = %notification.text,
            "notification (log sink)"
        );
        Ok(())
    }
}

/// Sink selected by `dispatch.sink`.
pub enum ConfiguredSink {
    Telegram(TelegramSink),
    Log(LogSink),
}

impl ConfiguredSink {
    pub fn from_config(config: &DispatchConfig) -> Result<Self> {
        match config.sink.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram(TelegramSink::new(config)?)),
            "log" => Ok(Self::Log(LogSink)),
            other => Err(anyhow!("unknown dispatch.sink: {other}")),
        }
    }

    /// Startup connectivity check; a rejected bot credential is fatal.
    pub async fn verify(&self) -> Result<()> {
        match self {
            Self::Telegram(sink) => {
                let username = sink.check_identity().await?;
                info!(bot = %username, "telegram bot credential verified");
                Ok(())
            }
            Self::Log(_) => Ok(()),
        }
    }

    /// Sends a plain announcement to the configured channel.
    pub async fn announce(&self, channel_target: &str, text: &str) -> Result<()> {
        match self {
            Self::Telegram(sink) => sink
                .send_text(channel_target, text)
                .await
                .map_err(|error| anyhow!("startup announcement failed: {error}")),
            Self::Log(_) => {
                info!(channel = %channel_target, text, "announcement (log sink)");
                Ok(())
            }
        }
    }
}

impl NotificationSink for ConfiguredSink {
    fn name(&self) -> &'static str {
        match self {
            Self::Telegram(sink) => sink.name(),
            Self::Log(sink) => sink.name(),
        }
    }

    async fn send(&self, notification: &Notification) -> std::result::Result<(), SinkError> {
        match self {
            Self::Telegram(sink) => sink.send(notification).await,
            Self::Log(sink) => sink.send(notification).await,
        }
    }
}
