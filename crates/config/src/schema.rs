use serde::Deserialize;

pub const BAGS_UPDATE_AUTHORITY: &str = "BAGSB9TpGrZxQbEsrEznv5jXXdwyP6AXerN8aVRiAmcv";
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub system: SystemConfig,
    pub ingestion: IngestionConfig,
    pub metadata: MetadataConfig,
    pub pipeline: PipelineConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub env: String,
    pub log_level: String,
    pub log_json: bool,
    pub telemetry_report_seconds: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            env: "dev".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            telemetry_report_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// `helius`, `custom`, `public` or `mock`. Empty selects `helius` when an API key is
    /// present and `public` otherwise.
    pub provider: String,
    pub helius_api_key: String,
    pub ws_url: String,
    pub http_url: String,
    pub launchpad_program_id: String,
    pub launch_instruction_markers: Vec<String>,
    pub commitment: String,
    pub subscribe_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    pub reconnect_reset_after_ms: u64,
    pub queue_capacity: usize,
    pub queue_overflow_policy: String,
    pub mock_interval_ms: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            helius_api_key: String::new(),
            ws_url: String::new(),
            http_url: String::new(),
            launchpad_program_id: BAGS_UPDATE_AUTHORITY.to_string(),
            launch_instruction_markers: vec![
                "Instruction: InitializeMint2".to_string(),
                "Instruction: CreateMetadataAccountV3".to_string(),
                "Instruction: InitializeVirtualPoolWithSplToken".to_string(),
            ],
            commitment: "confirmed".to_string(),
            subscribe_timeout_ms: 10_000,
            idle_timeout_ms: 45_000,
            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,
            reconnect_reset_after_ms: 60_000,
            queue_capacity: 256,
            queue_overflow_policy: "drop_oldest".to_string(),
            mock_interval_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub das_enabled: bool,
    pub launchpad_api_url: String,
    pub launchpad_api_key: String,
    pub ipfs_gateway: String,
    pub arweave_gateway: String,
    pub request_timeout_ms: u64,
    pub resolve_ceiling_ms: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub ignored_mints: Vec<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            das_enabled: true,
            launchpad_api_url: "https://bags.fm/api/token".to_string(),
            launchpad_api_key: String::new(),
            ipfs_gateway: "https://ipfs.io/ipfs/".to_string(),
            arweave_gateway: "https://arweave.net/".to_string(),
            request_timeout_ms: 5_000,
            resolve_ceiling_ms: 15_000,
            retries: 3,
            retry_delay_ms: 250,
            ignored_mints: vec![WRAPPED_SOL_MINT.to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub enrichment_concurrency: usize,
    pub drain_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enrichment_concurrency: 8,
            drain_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// `telegram` or `log`.
    pub sink: String,
    pub telegram_token: String,
    pub telegram_token_file: String,
    pub channel_id: String,
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub min_interval_ms: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub rate_limit_default_ms: u64,
    pub stale_after_ms: u64,
    pub queue_capacity: usize,
    pub token_page_base_url: String,
    pub startup_message: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sink: "telegram".to_string(),
            telegram_token: String::new(),
            telegram_token_file: String::new(),
            channel_id: String::new(),
            api_base_url: "https://api.telegram.org".to_string(),
            request_timeout_ms: 10_000,
            min_interval_ms: 1_100,
            max_retries: 4,
            retry_base_ms: 1_000,
            retry_max_ms: 30_000,
            rate_limit_default_ms: 5_000,
            stale_after_ms: 600_000,
            queue_capacity: 128,
            token_page_base_url: "https://bags.fm".to_string(),
            startup_message: String::new(),
        }
    }
}
