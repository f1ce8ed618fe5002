use bagwatch_core_types::TokenMetadata;
use serde_json::Value;

use crate::normalize::{clean_twitter_handle, non_empty_str, number_like, royalty_in_range};

pub(crate) fn token_url(base_url: &str, token_id: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), token_id)
}

/// Reads the launchpad token record (`name`, `symbol`, `image`, `website`,
/// `royaltyPercentage`, `createdBy.twitter`, `royaltiesTo.twitter`).
pub(crate) fn parse_token_record(record: &Value) -> TokenMetadata {
    let handle = |pointer: &str| {
        non_empty_str(record.pointer(pointer)).and_then(|raw| clean_twitter_handle(&raw))
    };
    TokenMetadata {
        name: non_empty_str(record.get("name")),
        symbol: non_empty_str(record.get("symbol")),
        image_uri: non_empty_str(record.get("image")),
        website_uri: non_empty_str(record.get("website")),
        creator_handle: handle("/createdBy/twitter"),
        fee_recipient_handle: handle("/royaltiesTo/twitter"),
        royalty_percent: royalty_in_range(number_like(record.get("royaltyPercentage"))),
        partial: false,
    }
}
