mod das;
mod fetch;
mod launchpad_api;
mod mint_lookup;
mod normalize;
mod offchain;
#[cfg(test)]
mod test_support;

use anyhow::{anyhow, Context, Result};
use bagwatch_config::MetadataConfig;
use bagwatch_core_types::TokenMetadata;
use reqwest::Client;
use serde_json::json;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::time;
use tracing::{debug, warn};

use self::fetch::{HttpFetcher, RetryPolicy};
use self::normalize::fill_missing;

pub use self::normalize::{clean_twitter_handle, resolve_document_uri};

#[derive(Debug)]
enum Lookup {
    Skipped,
    Pending,
    Resolved(TokenMetadata),
    Failed,
}

impl Lookup {
    fn enabled(enabled: bool) -> Self {
        if enabled {
            Self::Pending
        } else {
            Self::Skipped
        }
    }

    fn incomplete(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    fn metadata(&self) -> Option<&TokenMetadata> {
        match self {
            Self::Resolved(metadata) => Some(metadata),
            _ => None,
        }
    }
}

/// Gathers display metadata for a token from the asset index, the off-chain document
/// and the launchpad API. Never fails: missing pieces are absent and flag `partial`.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    fetcher: HttpFetcher,
    rpc_url: Option<String>,
    das_enabled: bool,
    launchpad_api_url: Option<String>,
    launchpad_api_key: Option<String>,
    ipfs_gateway: String,
    arweave_gateway: String,
    resolve_ceiling: Duration,
    ignored_mints: HashSet<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl MetadataResolver {
    pub fn new(config: &MetadataConfig, rpc_http_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(100)))
            .build()
            .context("failed to build metadata http client")?;
        let fetcher = HttpFetcher::new(
            client,
            RetryPolicy {
                retries: config.retries,
                delay_ms: config.retry_delay_ms,
            },
        );
        Ok(Self {
            fetcher,
            rpc_url: non_empty(rpc_http_url),
            das_enabled: config.das_enabled,
            launchpad_api_url: non_empty(&config.launchpad_api_url),
            launchpad_api_key: non_empty(&config.launchpad_api_key),
            ipfs_gateway: config.ipfs_gateway.clone(),
            arweave_gateway: config.arweave_gateway.clone(),
            resolve_ceiling: Duration::from_millis(config.resolve_ceiling_ms.max(1)),
            ignored_mints: config.ignored_mints.iter().cloned().collect(),
        })
    }

    pub async fn resolve(&self, token_id: &str) -> TokenMetadata {
        let started = Instant::now();
        let mut asset = Lookup::enabled(self.das_enabled && self.rpc_url.is_some());
        let mut document = Lookup::Skipped;
        let mut launchpad = Lookup::enabled(self.launchpad_api_url.is_some());

        let lookups = async {
            tokio::join!(
                self.lookup_onchain(token_id, &mut asset, &mut document),
                self.lookup_launchpad(token_id, &mut launchpad),
            )
        };
        let timed_out = time::timeout(self.resolve_ceiling, lookups).await.is_err();

        // Launchpad record first, then the off-chain document, then the asset index.
        let mut metadata = TokenMetadata::default();
        for lookup in [&launchpad, &document, &asset] {
            if let Some(found) = lookup.metadata() {
                fill_missing(&mut metadata, found);
            }
        }
        metadata.partial = [&asset, &document, &launchpad]
            .iter()
            .any(|lookup| lookup.incomplete());
        metadata.image_uri = metadata
            .image_uri
            .take()
            .and_then(|uri| resolve_document_uri(&uri, &self.ipfs_gateway, &self.arweave_gateway));

        if timed_out {
            warn!(
                token_id,
                ceiling_ms = self.resolve_ceiling.as_millis() as u64,
                "metadata resolve hit its ceiling; continuing with partial details"
            );
        }
        debug!(
            token_id,
            partial = metadata.partial,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "metadata resolved"
        );
        metadata
    }

    async fn lookup_onchain(&self, token_id: &str, asset: &mut Lookup, document: &mut Lookup) {
        let Some(rpc_url) = self.rpc_url.as_deref().filter(|_| self.das_enabled) else {
            return;
        };
        let record = match self
            .fetcher
            .rpc_call(rpc_url, "getAsset", json!({ "id": token_id }))
            .await
        {
            Ok(result) => das::parse_asset(&result),
            Err(error) => {
                warn!(token_id, error = %error, "asset lookup failed");
                *asset = Lookup::Failed;
                return;
            }
        };
        *asset = Lookup::Resolved(record.metadata);

        let Some(json_uri) = record.json_uri else {
            return;
        };
        let Some(document_url) =
            resolve_document_uri(&json_uri, &self.ipfs_gateway, &self.arweave_gateway)
        else {
            debug!(token_id, json_uri = %json_uri, "unsupported metadata document uri");
            return;
        };
        *document = Lookup::Pending;
        *document = match self.fetcher.get_json(&document_url, None).await {
            Ok(value) => Lookup::Resolved(offchain::parse_document(&value)),
            Err(error) => {
                warn!(token_id, error = %error, "metadata document fetch failed");
                Lookup::Failed
            }
        };
    }

    async fn lookup_launchpad(&self, token_id: &str, launchpad: &mut Lookup) {
        let Some(base_url) = self.launchpad_api_url.as_deref() else {
            return;
        };
        let url = launchpad_api::token_url(base_url, token_id);
        *launchpad = match self
            .fetcher
            .get_json(&url, self.launchpad_api_key.as_deref())
            .await
        {
            Ok(value) => Lookup::Resolved(launchpad_api::parse_token_record(&value)),
            Err(error) => {
                warn!(token_id, error = %error, "launchpad token lookup failed");
                Lookup::Failed
            }
        };
    }

    /// Finds the mint created by `signature` when the log stream did not carry it.
    pub async fn lookup_transaction_mint(&self, signature: &str) -> Result<Option<String>> {
        let rpc_url = self
            .rpc_url
            .as_deref()
            .ok_or_else(|| anyhow!("no RPC http url configured for transaction lookups"))?;
        let result = self
            .fetcher
            .rpc_call(
                rpc_url,
                "getTransaction",
                json!([
                    signature,
                    {
                        "encoding": "jsonParsed",
                        "commitment": "confirmed",
                        "maxSupportedTransactionVersion": 0
                    }
                ]),
            )
            .await
            .with_context(|| format!("getTransaction failed for {signature}"))?;
        Ok(mint_lookup::extract_launch_mint(&result, &self.ignored_mints))
    }
}
