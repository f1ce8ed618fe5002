use anyhow::{anyhow, Result};
use bagwatch_core_types::LaunchEvent;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

const MINT_LOG_PREFIXES: [&str; 3] = ["Program log: mint: ", "Program log: Mint: ", "Mint: "];

/// Classification of one websocket text frame.
#[derive(Debug)]
pub enum StreamFrame {
    SubscribeAck { request_id: u64, subscription: u64 },
    SubscribeRejected { request_id: u64, message: String },
    Launch(LaunchEvent),
    /// Log notification without any launch instruction marker.
    NotLaunch,
    FailedTransaction { signature: String },
    /// Carries a launch marker but could not be decoded.
    Malformed(anyhow::Error),
    Other,
}

#[derive(Debug, Clone)]
pub struct LaunchLogParser {
    markers: Vec<String>,
}

impl LaunchLogParser {
    pub fn new(markers: Vec<String>) -> Self {
        let markers = markers
            .into_iter()
            .map(|marker| marker.trim().to_string())
            .filter(|marker| !marker.is_empty())
            .collect();
        Self { markers }
    }

    fn matches(&self, haystack: &str) -> bool {
        self.markers.iter().any(|marker| haystack.contains(marker))
    }

    pub fn parse_frame(&self, text: &str) -> StreamFrame {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(error) => {
                if self.matches(text) {
                    return StreamFrame::Malformed(anyhow!("invalid notification json: {error}"));
                }
                debug!(error = %error, "skipping invalid ws message json");
                return StreamFrame::Other;
            }
        };

        if let Some(request_id) = value.get("id").and_then(Value::as_u64) {
            if let Some(subscription) = value.get("result").and_then(Value::as_u64) {
                return StreamFrame::SubscribeAck {
                    request_id,
                    subscription,
                };
            }
            if let Some(error) = value.get("error") {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
                    .unwrap_or_else(|| error.to_string());
                return StreamFrame::SubscribeRejected {
                    request_id,
                    message,
                };
            }
            return StreamFrame::Other;
        }

        match value.get("method").and_then(Value::as_str) {
            Some("logsNotification") => {}
            _ => return StreamFrame::Other,
        }

        // Cheap pre-filter on the raw frame before any structural decoding.
        if !self.matches(text) {
            return StreamFrame::NotLaunch;
        }

        match self.decode_launch(&value) {
            Ok(frame) => frame,
            Err(error) => StreamFrame::Malformed(error),
        }
    }

    fn decode_launch(&self, value: &Value) -> Result<StreamFrame> {
        let result = value
            .pointer("/params/result")
            .ok_or_else(|| anyhow!("missing params.result"))?;
        let event = result
            .get("value")
            .ok_or_else(|| anyhow!("missing result.value"))?;
        let signature = event
            .get("signature")
            .and_then(Value::as_str)
            .filter(|signature| !signature.is_empty())
            .ok_or_else(|| anyhow!("missing transaction signature"))?
            .to_string();
        let logs = event
            .get("logs")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("missing logs array"))?
            .iter()
            .map(|line| {
                line.as_str()
                    .map(ToString::to_string)
                    .ok_or_else(|| anyhow!("non-string log line"))
            })
            .collect::<Result<Vec<_>>>()?;

        if !logs.iter().any(|line| self.matches(line)) {
            return Ok(StreamFrame::NotLaunch);
        }
        if event.get("err").is_some_and(|err| !err.is_null()) {
            return Ok(StreamFrame::FailedTransaction { signature });
        }

        let slot = result
            .pointer("/context/slot")
            .and_then(Value::as_u64)
            .unwrap_or_default();

        Ok(StreamFrame::Launch(LaunchEvent {
            token_id: extract_mint_from_logs(&logs),
            transaction_signature: signature,
            slot,
            logs,
            observed_at: Utc::now(),
        }))
    }
}

pub fn extract_mint_from_logs(logs: &[String]) -> Option<String> {
    logs.iter().find_map(|line| {
        let line = line.trim();
        MINT_LOG_PREFIXES.iter().find_map(|prefix| {
            let rest = line.strip_prefix(prefix)?;
            let candidate = rest.split_whitespace().next()?;
            is_valid_pubkey(candidate).then(|| candidate.to_string())
        })
    })
}

/// True when `value` decodes as base58 to exactly 32 bytes.
pub fn is_valid_pubkey(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    bs58::decode(trimmed)
        .into_vec()
        .map(|decoded| decoded.len() == 32)
        .unwrap_or(false)
}
