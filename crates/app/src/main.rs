use anyhow::{Context, Result};
use bagwatch_config::{load_from_env_or_default, resolve_rpc_endpoints, validate_required_settings};
use bagwatch_enrichment::MetadataResolver;
use bagwatch_ingestion::IngestionService;
use bagwatch_notify::{ConfiguredSink, DispatchPolicy, Dispatcher, NotificationFormatter};
use std::env;
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod dedup;
mod pipeline;
mod secrets;
mod telemetry;

use crate::pipeline::Coordinator;
use crate::secrets::resolve_dispatch_secrets;
use crate::telemetry::format_error_chain;

const DEFAULT_CONFIG_PATH: &str = "configs/dev.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let cli_config = parse_config_arg();
    let require_file = cli_config.is_some();
    let default_path = cli_config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let (mut config, loaded_config_path) = load_from_env_or_default(&default_path, require_file)?;
    resolve_dispatch_secrets(&mut config.dispatch, &loaded_config_path)?;

    init_tracing(&config.system.log_level, config.system.log_json);
    info!(
        config_path = %loaded_config_path.display(),
        env = %config.system.env,
        "configuration loaded"
    );
    validate_required_settings(&config)?;

    let endpoints = resolve_rpc_endpoints(&config.ingestion)?;
    info!(
        provider = endpoints.provider.as_str(),
        program_id = %config.ingestion.launchpad_program_id,
        "rpc provider selected"
    );

    let sink = ConfiguredSink::from_config(&config.dispatch)
        .context("failed to initialize notification sink")?;
    sink.verify()
        .await
        .context("notification sink startup check failed")?;
    let startup_message = config.dispatch.startup_message.trim();
    if !startup_message.is_empty() {
        if let Err(error) = sink
            .announce(config.dispatch.channel_id.trim(), startup_message)
            .await
        {
            warn!(error = %format_error_chain(&error), "startup announcement not delivered");
        }
    }

    let resolver = MetadataResolver::new(&config.metadata, &endpoints.http_url)
        .context("failed to initialize metadata resolver")?;
    let formatter = NotificationFormatter::from_config(&config.dispatch);
    let ingestion = IngestionService::build(&config.ingestion, &endpoints)
        .context("failed to initialize ingestion service")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (outbox, inbox) = mpsc::channel(config.dispatch.queue_capacity.max(1));
    let dispatcher = Dispatcher::new(sink, DispatchPolicy::from_config(&config.dispatch));
    let dispatch_telemetry = dispatcher.telemetry();
    let mut dispatcher_task = tokio::spawn(dispatcher.run(inbox));

    let ingestion = ingestion.start(shutdown_rx.clone());
    let signal_task = tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(error = %error, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let mut coordinator = Coordinator::new(resolver, formatter, outbox, &config.pipeline);
    coordinator
        .run(
            &ingestion,
            &dispatch_telemetry,
            Duration::from_secs(config.system.telemetry_report_seconds),
            shutdown_rx,
        )
        .await;

    ingestion.stop().await;
    signal_task.abort();
    let pipeline = coordinator.drain().await;

    let drain_timeout = Duration::from_millis(config.pipeline.drain_timeout_ms);
    if time::timeout(drain_timeout, &mut dispatcher_task).await.is_err() {
        warn!(
            drain_timeout_ms = config.pipeline.drain_timeout_ms,
            "dispatcher did not finish its backlog in time; aborting"
        );
        dispatcher_task.abort();
    }

    let dispatch = dispatch_telemetry.snapshot();
    info!(
        events_received = pipeline.events_received,
        duplicates_skipped = pipeline.duplicates_skipped,
        handed_off = pipeline.handed_off,
        sent = dispatch.sent,
        dropped_stale = dispatch.dropped_stale,
        dropped_terminal = dispatch.dropped_terminal,
        retries_exhausted = dispatch.retries_exhausted,
        "bagwatch stopped"
    );
    Ok(())
}

fn parse_config_arg() -> Option<PathBuf> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(inline) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(inline));
        }
    }
    None
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    if json {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_env_filter(filter)
            .json()
            .compact()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
