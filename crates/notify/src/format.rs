use bagwatch_config::DispatchConfig;
use bagwatch_core_types::{Notification, TokenMetadata};

const HEADLINE: &str = "🚀 New Coin Launched on Bags!";
const PARTIAL_NOTICE: &str = "⚠️ Some details unavailable";
const SOLSCAN_TOKEN_URL: &str = "https://solscan.io/token/";
pub const LOG_CHANNEL_TARGET: &str = "log";

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Creator / fee recipient lines when both are known and differ; otherwise a single
/// `Twitter:` line for the one handle (or the shared one, compared case-insensitively).
fn handle_lines(creator: Option<&str>, fee_recipient: Option<&str>) -> Vec<String> {
    match (creator, fee_recipient) {
        (Some(creator), Some(fee_recipient)) if creator.eq_ignore_ascii_case(fee_recipient) => {
            vec![format!("Twitter: @{}", escape_html(creator))]
        }
        (Some(creator), Some(fee_recipient)) => vec![
            format!("Creator: @{}", escape_html(creator)),
            format!("Fee Recipient: @{}", escape_html(fee_recipient)),
        ],
        (Some(handle), None) | (None, Some(handle)) => {
            vec![format!("Twitter: @{}", escape_html(handle))]
        }
        (None, None) => Vec::new(),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

#[derive(Debug, Clone)]
pub struct NotificationFormatter {
    channel_target: String,
    token_page_base_url: String,
}

impl NotificationFormatter {
    pub fn new(channel_target: impl Into<String>, token_page_base_url: impl Into<String>) -> Self {
        let token_page_base_url: String = token_page_base_url.into();
        Self {
            channel_target: channel_target.into(),
            token_page_base_url: token_page_base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        let channel = config.channel_id.trim();
        let channel = if channel.is_empty() {
            LOG_CHANNEL_TARGET
        } else {
            channel
        };
        Self::new(channel, config.token_page_base_url.as_str())
    }

    pub fn render_text(&self, token_id: &str, metadata: &TokenMetadata) -> String {
        let token = escape_html(token_id);
        let mut lines = vec![
            HEADLINE.to_string(),
            String::new(),
            format!("Name: {}", escape_html(metadata.display_name())),
            format!("Ticker: {}", escape_html(metadata.display_symbol())),
            format!("Mint: <code>{token}</code>"),
            format!("Solscan: {SOLSCAN_TOKEN_URL}{token}"),
        ];

        let mut details = handle_lines(
            metadata.creator_handle.as_deref(),
            metadata.fee_recipient_handle.as_deref(),
        );
        if let Some(royalty) = metadata
            .royalty_percent
            .filter(|value| value.is_finite() && (0.0..=100.0).contains(value))
        {
            details.push(format!("Royalty: {royalty}%"));
        }
        if let Some(website) = metadata.website_uri.as_deref() {
            details.push(format!("Website: {}", escape_html(website)));
        }
        if !self.token_page_base_url.is_empty() {
            details.push(format!(
                "Bags: {}/{token}",
                escape_html(&self.token_page_base_url)
            ));
        }
        if !details.is_empty() {
            lines.push(String::new());
            lines.extend(details);
        }

        if metadata.partial {
            lines.push(String::new());
            lines.push(PARTIAL_NOTICE.to_string());
        }
        lines.join("\n")
    }

    pub fn build(&self, token_id: &str, metadata: &TokenMetadata) -> Notification {
        let image_uri = metadata
            .image_uri
            .as_deref()
            .filter(|uri| is_http_url(uri))
            .map(ToString::to_string);
        Notification::new(
            token_id,
            self.channel_target.as_str(),
            self.render_text(token_id, metadata),
            image_uri,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINT: &str = "7GCihgDB8fe6KNjn2MYtkzZcRjQy3t9GHdC8uHYmW2hr";

    fn formatter() -> NotificationFormatter {
        NotificationFormatter::new("@bags_launches", "https://bags.fm/")
    }

    fn full_metadata() -> TokenMetadata {
        TokenMetadata {
            name: Some("Bag <Cat> & Co".to_string()),
            symbol: Some("BCAT".to_string()),
            image_uri: Some("https://img.example/bcat.png".to_string()),
            website_uri: Some("https://bagcat.fun".to_string()),
            creator_handle: Some("alice".to_string()),
            fee_recipient_handle: Some("bob".to_string()),
            royalty_percent: Some(1.5),
            partial: false,
        }
    }

    #[test]
    fn renders_full_notification() {
        let text = formatter().render_text(MINT, &full_metadata());
        let expected = format!(
            "🚀 New Coin Launched on Bags!\n\n\
             Name: Bag &lt;Cat&gt; &amp; Co\n\
             Ticker: BCAT\n\
             Mint: <code>{MINT}</code>\n\
             Solscan: https://solscan.io/token/{MINT}\n\n\
             Creator: @alice\n\
             Fee Recipient: @bob\n\
             Royalty: 1.5%\n\
             Website: https://bagcat.fun\n\
             Bags: https://bags.fm/{MINT}"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn empty_metadata_uses_placeholders_and_omits_absent_fields() {
        let text = NotificationFormatter::new("@c", "").render_text(MINT, &TokenMetadata::default());
        assert!(text.contains("Name: Unknown Token"));
        assert!(text.contains("Ticker: UNKNOWN"));
        for absent in ["Creator", "Fee Recipient", "Twitter", "Royalty", "Website", "Bags:", "⚠️"] {
            assert!(!text.contains(absent), "unexpected {absent} in {text}");
        }
        assert!(!text.contains("None"));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn matching_handles_collapse_to_single_line() {
        let metadata = TokenMetadata {
            creator_handle: Some("Alice".to_string()),
            fee_recipient_handle: Some("alice".to_string()),
            ..TokenMetadata::default()
        };
        let text = formatter().render_text(MINT, &metadata);
        assert!(text.contains("Twitter: @Alice"));
        assert!(!text.contains("Creator"));
        assert!(!text.contains("Fee Recipient"));
    }

    #[test]
    fn single_handle_is_labelled_generically() {
        let fee_only = TokenMetadata {
            fee_recipient_handle: Some("bob".to_string()),
            ..TokenMetadata::default()
        };
        let text = formatter().render_text(MINT, &fee_only);
        assert!(text.contains("Twitter: @bob"));
        assert!(!text.contains("Fee Recipient"));

        let creator_only = TokenMetadata {
            creator_handle: Some("alice".to_string()),
            ..TokenMetadata::default()
        };
        let text = formatter().render_text(MINT, &creator_only);
        assert!(text.contains("Twitter: @alice"));
        assert!(!text.contains("Creator"));
    }

    #[test]
    fn out_of_range_royalty_is_omitted() {
        for royalty in [150.0, -1.0] {
            let metadata = TokenMetadata {
                royalty_percent: Some(royalty),
                ..TokenMetadata::default()
            };
            let text = formatter().render_text(MINT, &metadata);
            assert!(!text.contains("Royalty"), "rendered {royalty}: {text}");
        }
    }

    #[test]
    fn partial_metadata_gets_notice() {
        let metadata = TokenMetadata {
            partial: true,
            ..TokenMetadata::default()
        };
        let text = formatter().render_text(MINT, &metadata);
        assert!(text.ends_with("\n\n⚠️ Some details unavailable"));
    }

    #[test]
    fn build_keeps_only_http_images() {
        let formatter = formatter();
        let notification = formatter.build(MINT, &full_metadata());
        assert_eq!(notification.channel_target, "@bags_launches");
        assert_eq!(notification.token_id, MINT);
        assert_eq!(
            notification.image_uri.as_deref(),
            Some("https://img.example/bcat.png")
        );

        let metadata = TokenMetadata {
            image_uri: Some("ipfs://bafy".to_string()),
            ..TokenMetadata::default()
        };
        assert_eq!(formatter.build(MINT, &metadata).image_uri, None);
    }

    #[test]
    fn log_channel_when_no_channel_configured() {
        let config = DispatchConfig {
            channel_id: String::new(),
            ..DispatchConfig::default()
        };
        let notification = NotificationFormatter::from_config(&config).build(MINT, &TokenMetadata::default());
        assert_eq!(notification.channel_target, LOG_CHANNEL_TARGET);
    }
}
