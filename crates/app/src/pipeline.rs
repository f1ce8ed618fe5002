use bagwatch_config::PipelineConfig;
use bagwatch_core_types::{LaunchEvent, Notification};
use bagwatch_enrichment::MetadataResolver;
use bagwatch_ingestion::IngestionHandle;
use bagwatch_notify::{DispatchTelemetry, NotificationFormatter};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::dedup::Deduplicator;
use crate::telemetry::{
    format_error_chain, log_runtime_report, PipelineSnapshot, PipelineTelemetry,
};

struct PipelineContext {
    resolver: MetadataResolver,
    formatter: NotificationFormatter,
    dedup: Deduplicator,
    outbox: mpsc::Sender<Notification>,
    telemetry: PipelineTelemetry,
}

impl PipelineContext {
    async fn process_unresolved(&self, event: LaunchEvent) {
        let signature = event.transaction_signature.as_str();
        let token_id = match self.resolver.lookup_transaction_mint(signature).await {
            Ok(Some(token_id)) => token_id,
            Ok(None) => {
                PipelineTelemetry::bump(&self.telemetry.mint_unresolved);
                debug!(signature, "transaction carries no launch mint");
                return;
            }
            Err(error) => {
                PipelineTelemetry::bump(&self.telemetry.mint_unresolved);
                warn!(
                    signature,
                    error = %format_error_chain(&error),
                    "launch mint lookup failed; event skipped"
                );
                return;
            }
        };
        if !self.dedup.check_and_mark(&token_id) {
            PipelineTelemetry::bump(&self.telemetry.duplicates_skipped);
            debug!(token_id = %token_id, signature, "duplicate launch ignored");
            return;
        }
        self.announce(token_id, event).await;
    }

    async fn announce(&self, token_id: String, event: LaunchEvent) {
        let metadata = self.resolver.resolve(&token_id).await;
        PipelineTelemetry::bump(&self.telemetry.enriched);
        if metadata.partial {
            PipelineTelemetry::bump(&self.telemetry.enriched_partial);
        }

        let notification = self.formatter.build(&token_id, &metadata);
        info!(
            token_id = %token_id,
            signature = %event.transaction_signature,
            slot = event.slot,
            name = metadata.display_name(),
            symbol = metadata.display_symbol(),
            partial = metadata.partial,
            latency_ms = (Utc::now() - event.observed_at).num_milliseconds(),
            "launch enriched"
        );
        match self.outbox.send(notification).await {
            Ok(()) => PipelineTelemetry::bump(&self.telemetry.handed_off),
            Err(_) => {
                PipelineTelemetry::bump(&self.telemetry.handoff_failed);
                warn!(token_id = %token_id, "dispatcher channel closed; notification dropped");
            }
        }
    }
}

/// Turns launch events into notifications: mint extraction, dedup, enrichment and
/// hand-off to the dispatcher channel, with bounded enrichment concurrency.
pub(crate) struct Coordinator {
    context: Arc<PipelineContext>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
    drain_timeout: Duration,
}

impl Coordinator {
    pub(crate) fn new(
        resolver: MetadataResolver,
        formatter: NotificationFormatter,
        outbox: mpsc::Sender<Notification>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            context: Arc::new(PipelineContext {
                resolver,
                formatter,
                dedup: Deduplicator::default(),
                outbox,
                telemetry: PipelineTelemetry::default(),
            }),
            permits: Arc::new(Semaphore::new(config.enrichment_concurrency.max(1))),
            tasks: JoinSet::new(),
            drain_timeout: Duration::from_millis(config.drain_timeout_ms),
        }
    }

    /// Takes events until the intake closes or shutdown is signalled. In-flight tasks
    /// keep running; call [`Coordinator::drain`] afterwards.
    pub(crate) async fn run(
        &mut self,
        ingestion: &IngestionHandle,
        dispatch: &DispatchTelemetry,
        report_every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut report = time::interval(report_every.max(Duration::from_secs(1)));
        report.set_missed_tick_behavior(MissedTickBehavior::Skip);
        report.tick().await;

        loop {
            tokio::select! {
                maybe_event = ingestion.next_event() => {
                    match maybe_event {
                        Some(event) => self.accept(event).await,
                        None => {
                            info!("launch intake closed");
                            break;
                        }
                    }
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.record_join(joined);
                }
                _ = report.tick() => {
                    log_runtime_report(
                        self.context.telemetry.snapshot(),
                        self.context.dedup.len(),
                        self.tasks.len(),
                        ingestion.queue_depth().await,
                        &ingestion.snapshot(),
                        dispatch.snapshot(),
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(in_flight = self.tasks.len(), "coordinator stopping intake");
                        break;
                    }
                }
            }
        }
    }

    /// Dedup-checks events that already name their mint, then spawns the enrichment task
    /// once a concurrency permit is free.
    pub(crate) async fn accept(&mut self, event: LaunchEvent) {
        PipelineTelemetry::bump(&self.context.telemetry.events_received);
        if let Some(token_id) = event.token_id.as_deref() {
            if !self.context.dedup.check_and_mark(token_id) {
                PipelineTelemetry::bump(&self.context.telemetry.duplicates_skipped);
                debug!(
                    token_id,
                    signature = %event.transaction_signature,
                    "duplicate launch ignored"
                );
                return;
            }
        }

        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let context = Arc::clone(&self.context);
        self.tasks.spawn(async move {
            let _permit = permit;
            let mut event = event;
            match event.token_id.take() {
                Some(token_id) => context.announce(token_id, event).await,
                None => context.process_unresolved(event).await,
            }
        });
    }

    fn record_join(&self, joined: Result<(), JoinError>) {
        if let Err(error) = joined {
            if error.is_panic() {
                PipelineTelemetry::bump(&self.context.telemetry.task_failures);
                warn!(error = %error, "enrichment task panicked");
            }
        }
    }

    /// Waits up to the drain timeout for in-flight tasks, then aborts the rest. Dropping
    /// the coordinator releases its dispatcher sender.
    pub(crate) async fn drain(self) -> PipelineSnapshot {
        let Self {
            context,
            mut tasks,
            drain_timeout,
            ..
        } = self;
        if !tasks.is_empty() {
            info!(
                in_flight = tasks.len(),
                drain_timeout_ms = drain_timeout.as_millis() as u64,
                "draining in-flight launches"
            );
        }

        let drained = time::timeout(drain_timeout, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(error) = joined {
                    if error.is_panic() {
                        PipelineTelemetry::bump(&context.telemetry.task_failures);
                        warn!(error = %error, "enrichment task panicked");
                    }
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                aborted = tasks.len(),
                "drain timeout elapsed; aborting in-flight launches"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
        context.telemetry.snapshot()
    }
}
