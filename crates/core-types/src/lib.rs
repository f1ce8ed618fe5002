use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const UNKNOWN_TOKEN_NAME: &str = "Unknown Token";
pub const UNKNOWN_TOKEN_SYMBOL: &str = "UNKNOWN";

/// Raw launch signal produced by the log stream.
///
/// `token_id` is `None` when the log lines did not carry the mint; the pipeline then
/// resolves it from the originating transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchEvent {
    pub token_id: Option<String>,
    pub transaction_signature: String,
    pub slot: u64,
    pub logs: Vec<String>,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub image_uri: Option<String>,
    pub website_uri: Option<String>,
    pub creator_handle: Option<String>,
    pub fee_recipient_handle: Option<String>,
    pub royalty_percent: Option<f64>,
    /// Set when at least one metadata source failed or the resolve deadline elapsed.
    pub partial: bool,
}

impl TokenMetadata {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_TOKEN_NAME)
    }

    pub fn display_symbol(&self) -> &str {
        self.symbol.as_deref().unwrap_or(UNKNOWN_TOKEN_SYMBOL)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.symbol.is_none()
            && self.image_uri.is_none()
            && self.website_uri.is_none()
            && self.creator_handle.is_none()
            && self.fee_recipient_handle.is_none()
            && self.royalty_percent.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: Uuid,
    pub token_id: String,
    pub channel_target: String,
    pub text: String,
    pub image_uri: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        token_id: impl Into<String>,
        channel_target: impl Into<String>,
        text: String,
        image_uri: Option<String>,
    ) -> Self {
        Self {
            notification_id: Uuid::new_v4(),
            token_id: token_id.into(),
            channel_target: channel_target.into(),
            text,
            image_uri,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metadata_falls_back_to_placeholders() {
        let metadata = TokenMetadata::default();
        assert!(metadata.is_empty());
        assert_eq!(metadata.display_name(), UNKNOWN_TOKEN_NAME);
        assert_eq!(metadata.display_symbol(), UNKNOWN_TOKEN_SYMBOL);
    }
}
