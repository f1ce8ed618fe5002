use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::env_parsing::{first_env, parse_csv_env, parse_env_bool, parse_env_number};
use super::AppConfig;

pub fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
    Ok(cfg)
}

/// Loads the TOML file named by `BAGWATCH_CONFIG` (or `default_path`) and applies
/// environment overrides on top.
///
/// A missing file is an error only when the path was given explicitly, either through
/// `BAGWATCH_CONFIG` or with `require_file`; otherwise built-in defaults are used, which
/// is the usual mode for env-only deployments.
pub fn load_from_env_or_default(
    default_path: &Path,
    require_file: bool,
) -> Result<(AppConfig, PathBuf)> {
    let from_env = env::var("BAGWATCH_CONFIG").ok().map(PathBuf::from);
    let explicit = require_file || from_env.is_some();
    let configured = from_env.unwrap_or_else(|| default_path.to_path_buf());

    let mut config = if configured.exists() || explicit {
        load_from_path(&configured)?
    } else {
        AppConfig::default()
    };

    apply_env_overrides(&mut config)?;
    Ok((config, configured))
}

fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    if let Some(env_name) = first_env(&["BAGWATCH_ENV"]) {
        config.system.env = env_name;
    }
    if let Some(log_level) = first_env(&["BAGWATCH_LOG_LEVEL"]) {
        config.system.log_level = log_level;
    }
    if let Some(log_json) = env::var("BAGWATCH_LOG_JSON").ok().and_then(parse_env_bool) {
        config.system.log_json = log_json;
    }
    if let Some(seconds) = parse_env_number::<u64>("BAGWATCH_TELEMETRY_REPORT_SECONDS")? {
        config.system.telemetry_report_seconds = seconds;
    }

    if let Some(provider) = first_env(&["BAGWATCH_RPC_PROVIDER"]) {
        config.ingestion.provider = provider;
    }
    if let Some(api_key) = first_env(&["BAGWATCH_HELIUS_API_KEY", "HELIUS_API_KEY"]) {
        config.ingestion.helius_api_key = api_key;
    }
    if let Some(ws_url) = first_env(&["BAGWATCH_WS_URL", "WS_URL"]) {
        config.ingestion.ws_url = ws_url;
    }
    if let Some(http_url) = first_env(&["BAGWATCH_RPC_URL", "RPC_URL"]) {
        config.ingestion.http_url = http_url;
    }
    if let Some(program_id) = first_env(&["BAGWATCH_LAUNCHPAD_PROGRAM_ID"]) {
        config.ingestion.launchpad_program_id = program_id;
    }
    if let Ok(markers_csv) = env::var("BAGWATCH_LAUNCH_INSTRUCTION_MARKERS") {
        let values = parse_csv_env(&markers_csv);
        if !values.is_empty() {
            config.ingestion.launch_instruction_markers = values;
        }
    }
    if let Some(capacity) = parse_env_number::<usize>("BAGWATCH_INGESTION_QUEUE_CAPACITY")? {
        config.ingestion.queue_capacity = capacity;
    }
    if let Some(policy) = first_env(&["BAGWATCH_INGESTION_QUEUE_OVERFLOW_POLICY"]) {
        config.ingestion.queue_overflow_policy = policy;
    }
    if let Some(initial_ms) = parse_env_number::<u64>("BAGWATCH_RECONNECT_INITIAL_MS")? {
        config.ingestion.reconnect_initial_ms = initial_ms;
    }
    if let Some(max_ms) = parse_env_number::<u64>("BAGWATCH_RECONNECT_MAX_MS")? {
        config.ingestion.reconnect_max_ms = max_ms;
    }

    if let Some(enabled) = env::var("BAGWATCH_DAS_ENABLED").ok().and_then(parse_env_bool) {
        config.metadata.das_enabled = enabled;
    }
    if let Ok(api_url) = env::var("BAGWATCH_LAUNCHPAD_API_URL") {
        // An explicitly empty value disables the launchpad REST lookup.
        config.metadata.launchpad_api_url = api_url.trim().to_string();
    }
    if let Some(api_key) = first_env(&["BAGWATCH_LAUNCHPAD_API_KEY", "BAGS_API_KEY"]) {
        config.metadata.launchpad_api_key = api_key;
    }
    if let Some(ceiling_ms) = parse_env_number::<u64>("BAGWATCH_RESOLVE_CEILING_MS")? {
        config.metadata.resolve_ceiling_ms = ceiling_ms;
    }
    if let Some(retries) = parse_env_number::<u32>("BAGWATCH_METADATA_RETRIES")? {
        config.metadata.retries = retries;
    }

    if let Some(concurrency) = parse_env_number::<usize>("BAGWATCH_ENRICHMENT_CONCURRENCY")? {
        config.pipeline.enrichment_concurrency = concurrency;
    }

    if let Some(sink) = first_env(&["BAGWATCH_DISPATCH_SINK"]) {
        config.dispatch.sink = sink;
    }
    if let Some(token) = first_env(&["BAGWATCH_TELEGRAM_TOKEN", "TELEGRAM_TOKEN"]) {
        config.dispatch.telegram_token = token;
    }
    if let Some(token_file) = first_env(&["BAGWATCH_TELEGRAM_TOKEN_FILE"]) {
        config.dispatch.telegram_token_file = token_file;
    }
    if let Some(channel_id) = first_env(&["BAGWATCH_CHANNEL_ID", "CHANNEL_ID"]) {
        config.dispatch.channel_id = channel_id;
    }
    if let Some(min_interval_ms) = parse_env_number::<u64>("BAGWATCH_DISPATCH_MIN_INTERVAL_MS")?
    {
        config.dispatch.min_interval_ms = min_interval_ms;
    }
    if let Some(max_retries) = parse_env_number::<u32>("BAGWATCH_DISPATCH_MAX_RETRIES")? {
        config.dispatch.max_retries = max_retries;
    }
    if let Ok(message) = env::var("BAGWATCH_STARTUP_MESSAGE") {
        config.dispatch.startup_message = message;
    }

    if config.ingestion.queue_capacity == 0 {
        return Err(anyhow!("ingestion.queue_capacity must be greater than zero"));
    }
    if config.dispatch.queue_capacity == 0 {
        return Err(anyhow!("dispatch.queue_capacity must be greater than zero"));
    }
    Ok(())
}
