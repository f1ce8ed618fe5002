use bagwatch_core_types::TokenMetadata;
use serde_json::Value;

use crate::normalize::{clean_twitter_handle, non_empty_str, number_like, royalty_in_range};

/// Reads the off-chain token document (Metaplex JSON standard plus launchpad extensions).
pub(crate) fn parse_document(document: &Value) -> TokenMetadata {
    let extensions = document.get("extensions");
    let field = |name: &str| {
        non_empty_str(document.get(name))
            .or_else(|| non_empty_str(extensions.and_then(|extensions| extensions.get(name))))
    };
    let creator_handle = ["creator_twitter", "twitter"]
        .into_iter()
        .find_map(|name| field(name))
        .and_then(|raw| clean_twitter_handle(&raw));
    let royalty_percent = royalty_in_range(
        number_like(document.get("sellerFeeBasisPoints"))
            .or_else(|| number_like(document.get("seller_fee_basis_points")))
            .map(|basis_points| basis_points / 100.0),
    );

    TokenMetadata {
        name: field("name"),
        symbol: field("symbol"),
        image_uri: field("image"),
        website_uri: field("website"),
        creator_handle,
        royalty_percent,
        ..TokenMetadata::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_document_with_extensions() {
        let document = json!({
            "name": "Bag Cat",
            "symbol": "BCAT",
            "image": "https://ipfs.io/ipfs/bafyimg",
            "extensions": {
                "website": "https://bagcat.fun",
                "twitter": "https://x.com/bagcat"
            },
            "sellerFeeBasisPoints": 200
        });
        let metadata = parse_document(&document);
        assert_eq!(metadata.name.as_deref(), Some("Bag Cat"));
        assert_eq!(metadata.website_uri.as_deref(), Some("https://bagcat.fun"));
        assert_eq!(metadata.creator_handle.as_deref(), Some("bagcat"));
        assert_eq!(metadata.royalty_percent, Some(2.0));
        assert_eq!(metadata.fee_recipient_handle, None);
    }

    #[test]
    fn creator_twitter_wins_over_project_twitter() {
        let document = json!({
            "twitter": "@project",
            "creator_twitter": "@builder"
        });
        assert_eq!(
            parse_document(&document).creator_handle.as_deref(),
            Some("builder")
        );
    }

    #[test]
    fn non_object_document_yields_nothing() {
        assert!(parse_document(&json!("oops")).is_empty());
    }
}
