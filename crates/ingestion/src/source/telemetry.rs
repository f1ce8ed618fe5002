use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

use super::core::SubscriberState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionSnapshot {
    pub ts_utc: DateTime<Utc>,
    pub state: SubscriberState,
    pub frames_seen: u64,
    pub launches_enqueued: u64,
    pub launches_replaced_oldest: u64,
    pub launches_backpressured: u64,
    pub not_launch_discarded: u64,
    pub failed_tx_discarded: u64,
    pub malformed_skipped: u64,
    pub connect_failures: u64,
    pub reconnect_count: u64,
    pub idle_timeouts: u64,
}

#[derive(Debug, Default)]
pub(crate) struct IngestionTelemetry {
    pub(crate) state: AtomicU64,
    pub(crate) frames_seen: AtomicU64,
    pub(crate) launches_enqueued: AtomicU64,
    pub(crate) launches_replaced_oldest: AtomicU64,
    pub(crate) launches_backpressured: AtomicU64,
    pub(crate) not_launch_discarded: AtomicU64,
    pub(crate) failed_tx_discarded: AtomicU64,
    pub(crate) malformed_skipped: AtomicU64,
    pub(crate) connect_failures: AtomicU64,
    pub(crate) reconnect_count: AtomicU64,
    pub(crate) idle_timeouts: AtomicU64,
}

impl IngestionTelemetry {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_state(&self, state: SubscriberState) {
        let encoded = match state {
            SubscriberState::Disconnected => 0,
            SubscriberState::Connecting => 1,
            SubscriberState::Subscribed => 2,
        };
        self.state.store(encoded, Ordering::Relaxed);
    }

    fn state(&self) -> SubscriberState {
        match self.state.load(Ordering::Relaxed) {
            1 => SubscriberState::Connecting,
            2 => SubscriberState::Subscribed,
            _ => SubscriberState::Disconnected,
        }
    }

    pub(crate) fn snapshot(&self) -> IngestionSnapshot {
        IngestionSnapshot {
            ts_utc: Utc::now(),
            state: self.state(),
            frames_seen: self.frames_seen.load(Ordering::Relaxed),
            launches_enqueued: self.launches_enqueued.load(Ordering::Relaxed),
            launches_replaced_oldest: self.launches_replaced_oldest.load(Ordering::Relaxed),
            launches_backpressured: self.launches_backpressured.load(Ordering::Relaxed),
            not_launch_discarded: self.not_launch_discarded.load(Ordering::Relaxed),
            failed_tx_discarded: self.failed_tx_discarded.load(Ordering::Relaxed),
            malformed_skipped: self.malformed_skipped.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            reconnect_count: self.reconnect_count.load(Ordering::Relaxed),
            idle_timeouts: self.idle_timeouts.load(Ordering::Relaxed),
        }
    }
}
