use bagwatch_core_types::TokenMetadata;
use serde_json::Value;

const HANDLE_URL_PREFIXES: [&str; 6] = [
    "https://www.x.com/",
    "https://www.twitter.com/",
    "https://x.com/",
    "https://twitter.com/",
    "x.com/",
    "twitter.com/",
];

/// Reduces a handle, profile URL or tweet URL to the bare account name.
pub fn clean_twitter_handle(raw: &str) -> Option<String> {
    let mut handle = raw.trim();
    if let Some((account, _)) = handle.split_once("/status/") {
        handle = account;
    }
    let handle = handle.replace('@', "");
    let mut handle = handle.trim();
    for prefix in HANDLE_URL_PREFIXES {
        if let Some(stripped) = handle.strip_prefix(prefix) {
            handle = stripped;
            break;
        }
    }
    let handle = handle
        .split(['/', '?'])
        .next()
        .unwrap_or_default()
        .trim();
    (!handle.is_empty()).then(|| handle.to_string())
}

/// Rewrites `ipfs://` and `ar://` locations onto HTTP gateways. Returns `None` for
/// schemes that cannot be fetched.
pub fn resolve_document_uri(uri: &str, ipfs_gateway: &str, arweave_gateway: &str) -> Option<String> {
    let uri = uri.trim();
    if let Some(path) = uri.strip_prefix("ipfs://") {
        let path = path.strip_prefix("ipfs/").unwrap_or(path);
        return (!path.is_empty()).then(|| join_gateway(ipfs_gateway, path));
    }
    if let Some(path) = uri.strip_prefix("ar://") {
        return (!path.is_empty()).then(|| join_gateway(arweave_gateway, path));
    }
    if uri.starts_with("https://") || uri.starts_with("http://") {
        return Some(uri.to_string());
    }
    None
}

fn join_gateway(gateway: &str, path: &str) -> String {
    format!("{}/{}", gateway.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub(crate) fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// Accepts numbers and numeric strings (`"2"`, `"2.5%"`).
pub(crate) fn number_like(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Royalty percentages outside [0, 100] are discarded.
pub(crate) fn royalty_in_range(percent: Option<f64>) -> Option<f64> {
    percent.filter(|value| value.is_finite() && (0.0..=100.0).contains(value))
}

/// Fills every absent field of `target` from `source`; present fields win.
pub(crate) fn fill_missing(target: &mut TokenMetadata, source: &TokenMetadata) {
    fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
        if slot.is_none() {
            slot.clone_from(value);
        }
    }
    fill(&mut target.name, &source.name);
    fill(&mut target.symbol, &source.symbol);
    fill(&mut target.image_uri, &source.image_uri);
    fill(&mut target.website_uri, &source.website_uri);
    fill(&mut target.creator_handle, &source.creator_handle);
    fill(&mut target.fee_recipient_handle, &source.fee_recipient_handle);
    fill(&mut target.royalty_percent, &source.royalty_percent);
}
