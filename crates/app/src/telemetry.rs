use bagwatch_ingestion::IngestionSnapshot;
use bagwatch_notify::DispatchSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

pub(crate) fn format_error_chain(error: &anyhow::Error) -> String {
    let mut chain = String::new();
    for (idx, cause) in error.chain().enumerate() {
        if idx > 0 {
            chain.push_str(" | ");
        }
        chain.push_str(&cause.to_string());
    }
    chain
}

#[derive(Debug, Default)]
pub(crate) struct PipelineTelemetry {
    pub(crate) events_received: AtomicU64,
    pub(crate) duplicates_skipped: AtomicU64,
    pub(crate) mint_unresolved: AtomicU64,
    pub(crate) enriched: AtomicU64,
    pub(crate) enriched_partial: AtomicU64,
    pub(crate) handed_off: AtomicU64,
    pub(crate) handoff_failed: AtomicU64,
    pub(crate) task_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PipelineSnapshot {
    pub(crate) events_received: u64,
    pub(crate) duplicates_skipped: u64,
    pub(crate) mint_unresolved: u64,
    pub(crate) enriched: u64,
    pub(crate) enriched_partial: u64,
    pub(crate) handed_off: u64,
    pub(crate) handoff_failed: u64,
    pub(crate) task_failures: u64,
}

impl PipelineTelemetry {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            mint_unresolved: self.mint_unresolved.load(Ordering::Relaxed),
            enriched: self.enriched.load(Ordering::Relaxed),
            enriched_partial: self.enriched_partial.load(Ordering::Relaxed),
            handed_off: self.handed_off.load(Ordering::Relaxed),
            handoff_failed: self.handoff_failed.load(Ordering::Relaxed),
            task_failures: self.task_failures.load(Ordering::Relaxed),
        }
    }
}

pub(crate) fn log_runtime_report(
    pipeline: PipelineSnapshot,
    seen_tokens: usize,
    in_flight: usize,
    intake_depth: usize,
    ingestion: &IngestionSnapshot,
    dispatch: DispatchSnapshot,
) {
    info!(
        subscriber_state = ingestion.state.as_str(),
        frames_seen = ingestion.frames_seen,
        launches_enqueued = ingestion.launches_enqueued,
        launches_replaced_oldest = ingestion.launches_replaced_oldest,
        not_launch_discarded = ingestion.not_launch_discarded,
        failed_tx_discarded = ingestion.failed_tx_discarded,
        malformed_skipped = ingestion.malformed_skipped,
        connect_failures = ingestion.connect_failures,
        reconnect_count = ingestion.reconnect_count,
        idle_timeouts = ingestion.idle_timeouts,
        intake_depth,
        "ingestion report"
    );
    info!(
        events_received = pipeline.events_received,
        duplicates_skipped = pipeline.duplicates_skipped,
        mint_unresolved = pipeline.mint_unresolved,
        enriched = pipeline.enriched,
        enriched_partial = pipeline.enriched_partial,
        handed_off = pipeline.handed_off,
        handoff_failed = pipeline.handoff_failed,
        task_failures = pipeline.task_failures,
        seen_tokens,
        in_flight,
        "pipeline report"
    );
    info!(
        sent = dispatch.sent,
        rate_limited = dispatch.rate_limited,
        retried = dispatch.retried,
        dropped_stale = dispatch.dropped_stale,
        dropped_terminal = dispatch.dropped_terminal,
        retries_exhausted = dispatch.retries_exhausted,
        "dispatch report"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn error_chain_joins_causes() {
        let error = Err::<(), _>(anyhow!("connection refused"))
            .context("getMe failed")
            .expect_err("error");
        assert_eq!(format_error_chain(&error), "getMe failed | connection refused");
    }

    #[test]
    fn snapshot_reflects_bumps() {
        let telemetry = PipelineTelemetry::default();
        PipelineTelemetry::bump(&telemetry.events_received);
        PipelineTelemetry::bump(&telemetry.events_received);
        PipelineTelemetry::bump(&telemetry.duplicates_skipped);
        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.events_received, 2);
        assert_eq!(snapshot.duplicates_skipped, 1);
        assert_eq!(snapshot.handed_off, 0);
    }
}
