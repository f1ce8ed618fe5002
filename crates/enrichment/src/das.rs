use bagwatch_core_types::TokenMetadata;
use serde_json::Value;

use crate::normalize::{non_empty_str, number_like, royalty_in_range};

/// Fields read from a DAS `getAsset` result.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct AssetRecord {
    pub(crate) metadata: TokenMetadata,
    pub(crate) json_uri: Option<String>,
}

pub(crate) fn parse_asset(result: &Value) -> AssetRecord {
    let content = result.get("content");
    let metadata = content.and_then(|content| content.get("metadata"));
    let image_uri = content
        .and_then(|content| content.pointer("/files/0/uri"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|uri| !uri.is_empty())
        .map(ToString::to_string)
        .or_else(|| non_empty_str(content.and_then(|content| content.pointer("/links/image"))));
    let royalty_percent = royalty_in_range(
        number_like(result.pointer("/royalty/basis_points"))
            .map(|basis_points| basis_points / 100.0),
    );

    AssetRecord {
        metadata: TokenMetadata {
            name: non_empty_str(metadata.and_then(|metadata| metadata.get("name"))),
            symbol: non_empty_str(metadata.and_then(|metadata| metadata.get("symbol"))),
            image_uri,
            royalty_percent,
            ..TokenMetadata::default()
        },
        json_uri: non_empty_str(content.and_then(|content| content.get("json_uri"))),
    }
}
