use std::time::Duration;
use tokio::sync::watch;
use tokio::time;

/// Connection lifecycle of the launch log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Disconnected,
    Connecting,
    Subscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSignal {
    ConnectStarted,
    SubscriptionAcknowledged,
    ConnectionLost,
}

impl SubscriberState {
    pub fn on(self, signal: StreamSignal) -> Self {
        match (self, signal) {
            (_, StreamSignal::ConnectionLost) => Self::Disconnected,
            (Self::Disconnected, StreamSignal::ConnectStarted) => Self::Connecting,
            (Self::Connecting, StreamSignal::SubscriptionAcknowledged) => Self::Subscribed,
            (state, _) => state,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
        }
    }
}

/// Doubling reconnect delay, capped at `max`.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl ReconnectBackoff {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        let initial = Duration::from_millis(initial_ms.max(1));
        let max = Duration::from_millis(max_ms).max(initial);
        Self {
            initial,
            max,
            next: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = delay.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

pub(super) fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Sleeps for `delay` unless shutdown fires first (or the sender goes away).
/// Returns `false` on shutdown.
pub(super) async fn sleep_or_shutdown(
    delay: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    if shutdown_requested(shutdown) {
        return false;
    }
    tokio::select! {
        _ = time::sleep(delay) => true,
        _ = shutdown.changed() => false,
    }
}
