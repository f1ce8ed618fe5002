use super::*;
use std::ffi::OsString;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

static ENV_LOCK: Mutex<()> = Mutex::new(());
static TEMP_CONFIG_COUNTER: AtomicU64 = AtomicU64::new(0);

const UNPREFIXED_ENV: &[&str] = &[
    "HELIUS_API_KEY",
    "RPC_URL",
    "WS_URL",
    "TELEGRAM_TOKEN",
    "CHANNEL_ID",
    "BAGS_API_KEY",
];

#[test]
fn defaults_target_bags_launchpad_with_drop_oldest_queue() {
    let config = AppConfig::default();
    assert_eq!(
        config.ingestion.launchpad_program_id,
        BAGS_UPDATE_AUTHORITY
    );
    assert_eq!(config.ingestion.queue_overflow_policy, "drop_oldest");
    assert!(!config.ingestion.launch_instruction_markers.is_empty());
    assert_eq!(config.metadata.retries, 3);
    assert_eq!(config.dispatch.sink, "telegram");
    assert_eq!(config.metadata.ignored_mints, vec![WRAPPED_SOL_MINT]);
}

#[test]
fn shipped_dev_config_parses() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/dev.toml");
    let config = load_from_path(&path).expect("configs/dev.toml should parse");
    assert_eq!(config.system.env, "dev");
    assert_eq!(config.ingestion.queue_overflow_policy, "drop_oldest");
    assert_eq!(config.dispatch.min_interval_ms, 1_100);
    assert_eq!(config.pipeline.enrichment_concurrency, 8);
}

#[test]
fn missing_default_file_falls_back_to_defaults() {
    with_clean_bagwatch_env(|| {
        let missing = unique_temp_path();
        let (config, path) =
            load_from_env_or_default(&missing, false).expect("defaults should load");
        assert_eq!(path, missing);
        assert_eq!(config.system.log_level, "info");
    });
}

#[test]
fn missing_explicit_file_is_rejected() {
    with_clean_bagwatch_env(|| {
        let missing = unique_temp_path();
        let err = load_from_env_or_default(&missing, true)
            .expect_err("explicit missing config should fail")
            .to_string();
        assert!(err.contains("failed to read config"), "got: {err}");
    });
}

#[test]
fn env_overrides_take_precedence_over_file() {
    with_clean_bagwatch_env(|| {
        with_temp_config_file(
            r#"
[dispatch]
channel_id = "@from_file"
min_interval_ms = 2000

[ingestion]
queue_capacity = 32
"#,
            |path| {
                with_env_var("CHANNEL_ID", "@from_env", || {
                    let (config, _) =
                        load_from_env_or_default(path, true).expect("config should load");
                    assert_eq!(config.dispatch.channel_id, "@from_env");
                    assert_eq!(config.dispatch.min_interval_ms, 2_000);
                    assert_eq!(config.ingestion.queue_capacity, 32);
                });
            },
        );
    });
}

#[test]
fn prefixed_env_wins_over_legacy_name() {
    with_clean_bagwatch_env(|| {
        with_env_var("TELEGRAM_TOKEN", "legacy-token", || {
            with_env_var("BAGWATCH_TELEGRAM_TOKEN", "prefixed-token", || {
                let (config, _) = load_from_env_or_default(&unique_temp_path(), false)
                    .expect("config should load");
                assert_eq!(config.dispatch.telegram_token, "prefixed-token");
            });
        });
    });
}

#[test]
fn invalid_numeric_env_names_the_variable() {
    with_clean_bagwatch_env(|| {
        with_env_var("BAGWATCH_ENRICHMENT_CONCURRENCY", "lots", || {
            let err = load_from_env_or_default(&unique_temp_path(), false)
                .expect_err("invalid number should fail")
                .to_string();
            assert!(
                err.contains("BAGWATCH_ENRICHMENT_CONCURRENCY"),
                "error should mention env var, got: {err}"
            );
        });
    });
}

#[test]
fn empty_launchpad_api_url_env_disables_rest_lookup() {
    with_clean_bagwatch_env(|| {
        with_env_var("BAGWATCH_LAUNCHPAD_API_URL", "", || {
            let (config, _) = load_from_env_or_default(&unique_temp_path(), false)
                .expect("config should load");
            assert!(config.metadata.launchpad_api_url.is_empty());
        });
    });
}

#[test]
fn provider_defaults_to_helius_when_api_key_present() {
    let mut ingestion = IngestionConfig::default();
    ingestion.helius_api_key = "abc".to_string();
    let endpoints = resolve_rpc_endpoints(&ingestion).expect("helius endpoints");
    assert_eq!(endpoints.provider, RpcProvider::Helius);
    assert_eq!(endpoints.ws_url, "wss://mainnet.helius-rpc.com/?api-key=abc");
    assert_eq!(
        endpoints.http_url,
        "https://mainnet.helius-rpc.com/?api-key=abc"
    );
}

#[test]
fn provider_defaults_to_public_without_api_key() {
    let endpoints =
        resolve_rpc_endpoints(&IngestionConfig::default()).expect("public endpoints");
    assert_eq!(endpoints.provider, RpcProvider::Public);
    assert_eq!(endpoints.ws_url, "wss://api.mainnet-beta.solana.com");
}

#[test]
fn explicit_helius_without_key_is_rejected() {
    let mut ingestion = IngestionConfig::default();
    ingestion.provider = "helius".to_string();
    let err = resolve_rpc_endpoints(&ingestion)
        .expect_err("missing key should fail")
        .to_string();
    assert!(err.contains("HELIUS_API_KEY"), "got: {err}");
}

#[test]
fn custom_provider_requires_websocket_scheme() {
    let mut ingestion = IngestionConfig::default();
    ingestion.provider = "custom".to_string();
    ingestion.ws_url = "https://rpc.example.com".to_string();
    let err = resolve_rpc_endpoints(&ingestion)
        .expect_err("http scheme for ws should fail")
        .to_string();
    assert!(err.contains("unsupported scheme"), "got: {err}");

    ingestion.ws_url = "wss://rpc.example.com/ws".to_string();
    ingestion.http_url = "https://rpc.example.com".to_string();
    let endpoints = resolve_rpc_endpoints(&ingestion).expect("custom endpoints");
    assert_eq!(endpoints.provider, RpcProvider::Custom);
    assert_eq!(endpoints.http_url, "https://rpc.example.com");
}

#[test]
fn unknown_provider_is_rejected() {
    let mut ingestion = IngestionConfig::default();
    ingestion.provider = "triton".to_string();
    assert!(resolve_rpc_endpoints(&ingestion).is_err());
}

#[test]
fn telegram_sink_requires_token_and_channel() {
    let mut config = AppConfig::default();
    let err = validate_required_settings(&config)
        .expect_err("missing token should fail")
        .to_string();
    assert!(err.contains("TELEGRAM_TOKEN"), "got: {err}");

    config.dispatch.telegram_token = "123:abc".to_string();
    let err = validate_required_settings(&config)
        .expect_err("missing channel should fail")
        .to_string();
    assert!(err.contains("CHANNEL_ID"), "got: {err}");

    config.dispatch.channel_id = "@bagwatch".to_string();
    validate_required_settings(&config).expect("complete config should validate");
}

#[test]
fn log_sink_runs_without_telegram_credentials() {
    let mut config = AppConfig::default();
    config.dispatch.sink = "log".to_string();
    validate_required_settings(&config).expect("log sink needs no credentials");
}

fn with_env_var<T>(key: &'static str, value: &str, run: impl FnOnce() -> T) -> T {
    let previous = std::env::var_os(key);
    std::env::set_var(key, value);
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(run));
    restore_env_var(key, previous);
    match outcome {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

fn restore_env_var(key: &'static str, previous: Option<OsString>) {
    match previous {
        Some(value) => std::env::set_var(key, value),
        None => std::env::remove_var(key),
    }
}

fn with_clean_bagwatch_env<T>(run: impl FnOnce() -> T) -> T {
    // Serialize all env mutations in this test module.
    let _guard = ENV_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let saved: Vec<(OsString, OsString)> = std::env::vars_os()
        .filter(|(key, _)| {
            let key = key.to_string_lossy();
            key.starts_with("BAGWATCH_") || UNPREFIXED_ENV.contains(&&*key)
        })
        .collect();
    for (key, _) in &saved {
        std::env::remove_var(key);
    }
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(run));
    for (key, value) in saved {
        std::env::set_var(key, value);
    }
    match outcome {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

fn with_temp_config_file<T>(contents: &str, run: impl FnOnce(&Path) -> T) -> T {
    let path = unique_temp_path();
    fs::write(&path, contents).expect("write temp config");
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run(&path)));
    let _ = fs::remove_file(&path);
    match outcome {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

fn unique_temp_path() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    let seq = TEMP_CONFIG_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    std::env::temp_dir().join(format!("bagwatch-config-test-{pid}-{nanos}-{seq}.toml"))
}
