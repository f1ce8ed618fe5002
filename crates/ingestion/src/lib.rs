mod source;

use anyhow::{anyhow, Result};
use bagwatch_config::{IngestionConfig, RpcEndpoints};
use bagwatch_core_types::LaunchEvent;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

pub use source::{
    extract_mint_from_logs, is_valid_pubkey, IngestionSnapshot, LaunchLogParser,
    QueueOverflowPolicy, ReconnectBackoff, StreamFrame, StreamSignal, SubscriberState,
};
use source::{IngestionSource, IngestionTelemetry, LaunchQueue};

pub struct IngestionService {
    source: IngestionSource,
    queue_capacity: usize,
    overflow_policy: QueueOverflowPolicy,
    telemetry: Arc<IngestionTelemetry>,
}

impl IngestionService {
    pub fn build(config: &IngestionConfig, endpoints: &RpcEndpoints) -> Result<Self> {
        let overflow_policy = QueueOverflowPolicy::parse(&config.queue_overflow_policy)
            .ok_or_else(|| {
                anyhow!(
                    "unsupported ingestion.queue_overflow_policy: {} (expected block or drop_oldest)",
                    config.queue_overflow_policy
                )
            })?;
        let telemetry = Arc::new(IngestionTelemetry::default());
        let source = IngestionSource::from_config(config, endpoints, Arc::clone(&telemetry))?;
        Ok(Self {
            source,
            queue_capacity: config.queue_capacity.max(1),
            overflow_policy,
            telemetry,
        })
    }

    /// Spawns the source task. The returned handle yields events until the source stops
    /// and its backlog is drained.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> IngestionHandle {
        info!(
            source = self.source.kind(),
            queue_capacity = self.queue_capacity,
            overflow_policy = self.overflow_policy.as_str(),
            "starting launch ingestion"
        );
        let queue = Arc::new(LaunchQueue::new(self.queue_capacity));
        let task = self
            .source
            .spawn(Arc::clone(&queue), self.overflow_policy, shutdown);
        IngestionHandle {
            queue,
            task,
            telemetry: self.telemetry,
        }
    }
}

pub struct IngestionHandle {
    queue: Arc<LaunchQueue>,
    task: JoinHandle<()>,
    telemetry: Arc<IngestionTelemetry>,
}

impl IngestionHandle {
    pub async fn next_event(&self) -> Option<LaunchEvent> {
        self.queue.pop().await
    }

    pub async fn queue_depth(&self) -> usize {
        self.queue.len().await
    }

    pub fn snapshot(&self) -> IngestionSnapshot {
        self.telemetry.snapshot()
    }

    /// Closes the queue and waits for the source task to exit.
    pub async fn stop(self) {
        self.queue.close().await;
        let _ = self.task.await;
    }
}
