use anyhow::{anyhow, Result};
use bagwatch_config::{IngestionConfig, RpcEndpoints, RpcProvider};
use bagwatch_core_types::LaunchEvent;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::info;

mod core;
mod logs_stream;
mod parser;
mod queue;
mod telemetry;

pub use self::core::{ReconnectBackoff, StreamSignal, SubscriberState};
pub use self::parser::{extract_mint_from_logs, is_valid_pubkey, LaunchLogParser, StreamFrame};
pub use self::queue::QueueOverflowPolicy;
pub use self::telemetry::IngestionSnapshot;

pub(crate) use self::queue::OverflowQueue;
pub(crate) use self::telemetry::IngestionTelemetry;

use self::logs_stream::subscriber_loop;

type LogsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type LaunchQueue = OverflowQueue<LaunchEvent>;

#[derive(Debug)]
pub(crate) struct SubscriberRuntimeConfig {
    ws_url: String,
    endpoint_label: String,
    program_id: String,
    commitment: String,
    subscribe_timeout: Duration,
    idle_timeout: Duration,
    reconnect_initial_ms: u64,
    reconnect_max_ms: u64,
    reconnect_reset_after: Duration,
    parser: LaunchLogParser,
    telemetry: Arc<IngestionTelemetry>,
}

impl SubscriberRuntimeConfig {
    fn new(
        config: &IngestionConfig,
        ws_url: &str,
        telemetry: Arc<IngestionTelemetry>,
    ) -> Result<Self> {
        let ws_url = ws_url.trim();
        if ws_url.is_empty() {
            return Err(anyhow!("launch log subscriber requires a websocket url"));
        }
        let program_id = config.launchpad_program_id.trim();
        if program_id.is_empty() {
            return Err(anyhow!("ingestion.launchpad_program_id must not be empty"));
        }
        Ok(Self {
            ws_url: ws_url.to_string(),
            endpoint_label: endpoint_label(ws_url),
            program_id: program_id.to_string(),
            commitment: config.commitment.trim().to_string(),
            subscribe_timeout: Duration::from_millis(config.subscribe_timeout_ms.max(100)),
            idle_timeout: Duration::from_millis(config.idle_timeout_ms.max(1_000)),
            reconnect_initial_ms: config.reconnect_initial_ms,
            reconnect_max_ms: config.reconnect_max_ms,
            reconnect_reset_after: Duration::from_millis(config.reconnect_reset_after_ms),
            parser: LaunchLogParser::new(config.launch_instruction_markers.clone()),
            telemetry,
        })
    }
}

/// Scheme, host and path only; provider URLs carry the API key in the query.
fn endpoint_label(ws_url: &str) -> String {
    match url::Url::parse(ws_url) {
        Ok(parsed) => format!(
            "{}://{}{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or_default(),
            parsed.path().trim_end_matches('/')
        ),
        Err(_) => "<invalid url>".to_string(),
    }
}

pub(crate) enum IngestionSource {
    Mock(MockSource),
    LogsStream(Arc<SubscriberRuntimeConfig>),
}

impl IngestionSource {
    pub(crate) fn from_config(
        config: &IngestionConfig,
        endpoints: &RpcEndpoints,
        telemetry: Arc<IngestionTelemetry>,
    ) -> Result<Self> {
        match endpoints.provider {
            RpcProvider::Mock => Ok(Self::Mock(MockSource::new(config.mock_interval_ms, telemetry))),
            RpcProvider::Helius | RpcProvider::Custom | RpcProvider::Public => {
                let runtime = SubscriberRuntimeConfig::new(config, &endpoints.ws_url, telemetry)?;
                Ok(Self::LogsStream(Arc::new(runtime)))
            }
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Mock(_) => "mock",
            Self::LogsStream(_) => "logs_stream",
        }
    }

    pub(crate) fn spawn(
        self,
        queue: Arc<LaunchQueue>,
        policy: QueueOverflowPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        match self {
            Self::Mock(source) => tokio::spawn(source.run(queue, policy, shutdown)),
            Self::LogsStream(runtime) => {
                tokio::spawn(subscriber_loop(runtime, queue, policy, shutdown))
            }
        }
    }
}

/// Emits a synthetic launch on a fixed interval; for local runs without an RPC provider.
pub(crate) struct MockSource {
    interval_ms: u64,
    session_tag: String,
    telemetry: Arc<IngestionTelemetry>,
}

impl MockSource {
    pub(crate) fn new(interval_ms: u64, telemetry: Arc<IngestionTelemetry>) -> Self {
        let session_tag = format!("{}-{}", Utc::now().timestamp_millis(), std::process::id());
        Self {
            interval_ms,
            session_tag,
            telemetry,
        }
    }

    fn event(&self, n: u64) -> LaunchEvent {
        LaunchEvent {
            token_id: Some(format!("MockMint{n}{}", self.session_tag.replace('-', ""))),
            transaction_signature: format!("mock-{}-sig-{n}", self.session_tag),
            slot: 1_000_000 + n,
            logs: vec!["Program log: Instruction: InitializeMint2".to_string()],
            observed_at: Utc::now(),
        }
    }

    async fn run(
        self,
        queue: Arc<LaunchQueue>,
        policy: QueueOverflowPolicy,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = time::interval(Duration::from_millis(self.interval_ms.max(100)));
        let mut sequence: u64 = 0;
        self.telemetry.set_state(SubscriberState::Subscribed);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }
            sequence = sequence.saturating_add(1);
            if queue.push(self.event(sequence), policy).await.is_none() {
                break;
            }
            IngestionTelemetry::bump(&self.telemetry.launches_enqueued);
        }
        self.telemetry.set_state(SubscriberState::Disconnected);
        queue.close().await;
        info!(emitted = sequence, "mock launch source stopped");
    }
}
