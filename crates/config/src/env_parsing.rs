use anyhow::{anyhow, Context, Result};
use std::env;

use super::{AppConfig, IngestionConfig};

pub(crate) fn parse_env_bool(value: String) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_csv_env(csv: &str) -> Vec<String> {
    csv.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .split(',')
        .map(str::trim)
        .map(|value| value.trim_matches('"').trim_matches('\''))
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Returns the first non-empty value among `names`, so legacy unprefixed names can sit
/// next to the `BAGWATCH_*` ones.
pub(crate) fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

pub(crate) fn parse_env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|error| anyhow!("{name} must be a number, got {trimmed:?}: {error}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcProvider {
    Helius,
    Custom,
    Public,
    Mock,
}

impl RpcProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Helius => "helius",
            Self::Custom => "custom",
            Self::Public => "public",
            Self::Mock => "mock",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoints {
    pub provider: RpcProvider,
    pub ws_url: String,
    pub http_url: String,
}

const HELIUS_WS_BASE: &str = "wss://mainnet.helius-rpc.com/?api-key=";
const HELIUS_HTTP_BASE: &str = "https://mainnet.helius-rpc.com/?api-key=";
const PUBLIC_WS_URL: &str = "wss://api.mainnet-beta.solana.com";
const PUBLIC_HTTP_URL: &str = "https://api.mainnet-beta.solana.com";

pub fn resolve_rpc_endpoints(config: &IngestionConfig) -> Result<RpcEndpoints> {
    let api_key = config.helius_api_key.trim();
    let provider = match config.provider.trim().to_ascii_lowercase().as_str() {
        "" if !api_key.is_empty() => RpcProvider::Helius,
        "" => RpcProvider::Public,
        "helius" => RpcProvider::Helius,
        "custom" => RpcProvider::Custom,
        "public" | "solana" => RpcProvider::Public,
        "mock" => RpcProvider::Mock,
        other => return Err(anyhow!("unknown ingestion.provider: {other}")),
    };

    let endpoints = match provider {
        RpcProvider::Helius => {
            if api_key.is_empty() {
                return Err(anyhow!(
                    "ingestion.provider=helius requires HELIUS_API_KEY (ingestion.helius_api_key)"
                ));
            }
            RpcEndpoints {
                provider,
                ws_url: format!("{HELIUS_WS_BASE}{api_key}"),
                http_url: format!("{HELIUS_HTTP_BASE}{api_key}"),
            }
        }
        RpcProvider::Custom => {
            let ws_url = config.ws_url.trim();
            if ws_url.is_empty() {
                return Err(anyhow!(
                    "ingestion.provider=custom requires BAGWATCH_WS_URL (ingestion.ws_url)"
                ));
            }
            validate_url(ws_url, &["ws", "wss"], "ingestion.ws_url")?;
            let http_url = config.http_url.trim();
            if !http_url.is_empty() {
                validate_url(http_url, &["http", "https"], "ingestion.http_url")?;
            }
            RpcEndpoints {
                provider,
                ws_url: ws_url.to_string(),
                http_url: http_url.to_string(),
            }
        }
        RpcProvider::Public => RpcEndpoints {
            provider,
            ws_url: PUBLIC_WS_URL.to_string(),
            http_url: non_empty_or(&config.http_url, PUBLIC_HTTP_URL),
        },
        RpcProvider::Mock => RpcEndpoints {
            provider,
            ws_url: String::new(),
            http_url: config.http_url.trim().to_string(),
        },
    };
    Ok(endpoints)
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

pub(crate) fn validate_url(raw: &str, schemes: &[&str], field: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).with_context(|| format!("{field} is not a valid URL"))?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(anyhow!(
            "{field} has unsupported scheme {} (expected one of {})",
            parsed.scheme(),
            schemes.join("/")
        ));
    }
    if parsed.host_str().is_none() {
        return Err(anyhow!("{field} is missing a host"));
    }
    Ok(())
}

/// Checks the settings the process cannot run without. Runs after secret files are
/// resolved, so `dispatch.telegram_token` already holds the file contents.
pub fn validate_required_settings(config: &AppConfig) -> Result<()> {
    resolve_rpc_endpoints(&config.ingestion)?;

    if config.ingestion.launchpad_program_id.trim().is_empty() {
        return Err(anyhow!("ingestion.launchpad_program_id must not be empty"));
    }
    if config
        .ingestion
        .launch_instruction_markers
        .iter()
        .all(|marker| marker.trim().is_empty())
    {
        return Err(anyhow!(
            "ingestion.launch_instruction_markers must contain at least one marker"
        ));
    }

    match config.dispatch.sink.trim().to_ascii_lowercase().as_str() {
        "telegram" => {
            if config.dispatch.telegram_token.trim().is_empty() {
                return Err(anyhow!(
                    "missing Telegram bot credential: set TELEGRAM_TOKEN (or dispatch.telegram_token_file)"
                ));
            }
            if config.dispatch.channel_id.trim().is_empty() {
                return Err(anyhow!(
                    "missing destination channel: set CHANNEL_ID (dispatch.channel_id)"
                ));
            }
            validate_url(
                config.dispatch.api_base_url.trim(),
                &["http", "https"],
                "dispatch.api_base_url",
            )?;
        }
        "log" => {}
        other => return Err(anyhow!("unknown dispatch.sink: {other}")),
    }

    let launchpad_api_url = config.metadata.launchpad_api_url.trim();
    if !launchpad_api_url.is_empty() {
        validate_url(
            launchpad_api_url,
            &["http", "https"],
            "metadata.launchpad_api_url",
        )?;
    }
    Ok(())
}
