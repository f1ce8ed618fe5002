use bagwatch_config::DispatchConfig;
use bagwatch_core_types::Notification;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::sink::{NotificationSink, SinkErrorKind};

#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub min_interval: Duration,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
    pub rate_limit_default: Duration,
    pub stale_after: Duration,
}

impl DispatchPolicy {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_interval_ms),
            max_retries: config.max_retries,
            retry_base: Duration::from_millis(config.retry_base_ms.max(1)),
            retry_max: Duration::from_millis(config.retry_max_ms.max(config.retry_base_ms)),
            rate_limit_default: Duration::from_millis(config.rate_limit_default_ms),
            stale_after: Duration::from_millis(config.stale_after_ms),
        }
    }

    /// Exponential backoff for the `retry`-th retry (1-based), capped at `retry_max`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.retry_base.saturating_mul(factor).min(self.retry_max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent { attempts: u32 },
    DroppedStale,
    DroppedTerminal,
    RetriesExhausted,
}

#[derive(Debug, Default)]
pub struct DispatchTelemetry {
    sent: AtomicU64,
    rate_limited: AtomicU64,
    retried: AtomicU64,
    dropped_stale: AtomicU64,
    dropped_terminal: AtomicU64,
    retries_exhausted: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub sent: u64,
    pub rate_limited: u64,
    pub retried: u64,
    pub dropped_stale: u64,
    pub dropped_terminal: u64,
    pub retries_exhausted: u64,
}

impl DispatchTelemetry {
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dropped_stale: self.dropped_stale.load(Ordering::Relaxed),
            dropped_terminal: self.dropped_terminal.load(Ordering::Relaxed),
            retries_exhausted: self.retries_exhausted.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Serialized delivery of notifications to one sink.
pub struct Dispatcher<S> {
    sink: S,
    policy: DispatchPolicy,
    last_attempt: HashMap<String, Instant>,
    telemetry: Arc<DispatchTelemetry>,
}

impl<S: NotificationSink> Dispatcher<S> {
    pub fn new(sink: S, policy: DispatchPolicy) -> Self {
        Self {
            sink,
            policy,
            last_attempt: HashMap::new(),
            telemetry: Arc::new(DispatchTelemetry::default()),
        }
    }

    pub fn telemetry(&self) -> Arc<DispatchTelemetry> {
        Arc::clone(&self.telemetry)
    }

    /// Delivers notifications until every sender is gone.
    pub async fn run(mut self, mut receiver: mpsc::Receiver<Notification>) {
        info!(sink = self.sink.name(), "dispatcher started");
        while let Some(notification) = receiver.recv().await {
            self.deliver(&notification).await;
        }
        info!(sink = self.sink.name(), "dispatcher stopped");
    }

    pub async fn deliver(&mut self, notification: &Notification) -> DispatchOutcome {
        let mut attempts: u32 = 0;
        let mut not_before: Option<Instant> = None;
        loop {
            if self.is_stale(notification) {
                bump(&self.telemetry.dropped_stale);
                warn!(
                    token_id = %notification.token_id,
                    notification_id = %notification.notification_id,
                    created_at = %notification.created_at,
                    "dropping stale notification"
                );
                return DispatchOutcome::DroppedStale;
            }

            self.wait_for_slot(&notification.channel_target, not_before)
                .await;
            attempts += 1;
            let result = self.sink.send(notification).await;
            self.last_attempt
                .insert(notification.channel_target.clone(), Instant::now());

            let error = match result {
                Ok(()) => {
                    bump(&self.telemetry.sent);
                    info!(
                        token_id = %notification.token_id,
                        channel = %notification.channel_target,
                        attempts,
                        "notification sent"
                    );
                    return DispatchOutcome::Sent { attempts };
                }
                Err(error) => error,
            };

            if error.kind == SinkErrorKind::Terminal {
                bump(&self.telemetry.dropped_terminal);
                warn!(
                    token_id = %notification.token_id,
                    error = %error,
                    "notification rejected by sink; dropping"
                );
                return DispatchOutcome::DroppedTerminal;
            }
            if attempts > self.policy.max_retries {
                bump(&self.telemetry.retries_exhausted);
                warn!(
                    token_id = %notification.token_id,
                    attempts,
                    error = %error,
                    "notification retries exhausted; dropping"
                );
                return DispatchOutcome::RetriesExhausted;
            }

            bump(&self.telemetry.retried);
            let wait = if error.kind == SinkErrorKind::RateLimited {
                bump(&self.telemetry.rate_limited);
                let wait = error.retry_after.unwrap_or(self.policy.rate_limit_default);
                info!(
                    token_id = %notification.token_id,
                    retry_after_ms = wait.as_millis() as u64,
                    "sink rate limited; delaying notification"
                );
                wait
            } else {
                let wait = self.policy.backoff(attempts);
                debug!(
                    token_id = %notification.token_id,
                    error = %error,
                    attempts,
                    wait_ms = wait.as_millis() as u64,
                    "retrying notification after backoff"
                );
                wait
            };
            not_before = Some(Instant::now() + wait);
        }
    }

    fn is_stale(&self, notification: &Notification) -> bool {
        if self.policy.stale_after.is_zero() {
            return false;
        }
        let age = Utc::now().signed_duration_since(notification.created_at);
        age.to_std()
            .map(|age| age > self.policy.stale_after)
            .unwrap_or(false)
    }

    async fn wait_for_slot(&self, channel_target: &str, not_before: Option<Instant>) {
        let paced = self
            .last_attempt
            .get(channel_target)
            .map(|last| *last + self.policy.min_interval);
        let deadline = match (paced, not_before) {
            (Some(paced), Some(not_before)) => Some(paced.max(not_before)),
            (paced, not_before) => paced.or(not_before),
        };
        if let Some(deadline) = deadline {
            if deadline > Instant::now() {
                time::sleep_until(deadline).await;
            }
        }
    }
}
