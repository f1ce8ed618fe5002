use serde_json::Value;
use std::collections::HashSet;

const MINT_INIT_INSTRUCTIONS: [&str; 2] = ["initializeMint", "initializeMint2"];

/// Picks the launched mint out of a jsonParsed `getTransaction` result: the first
/// post-balance mint not in `ignored`, else the first mint-initialization instruction.
/// Failed transactions yield nothing.
pub(crate) fn extract_launch_mint(result: &Value, ignored: &HashSet<String>) -> Option<String> {
    let meta = result.get("meta")?;
    if meta.get("err").is_some_and(|err| !err.is_null()) {
        return None;
    }

    let from_balances = meta
        .get("postTokenBalances")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|balance| balance.get("mint").and_then(Value::as_str))
        .find(|mint| !ignored.contains(*mint));
    if let Some(mint) = from_balances {
        return Some(mint.to_string());
    }

    let outer = result
        .pointer("/transaction/message/instructions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten();
    let inner = meta
        .get("innerInstructions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|group| group.get("instructions").and_then(Value::as_array))
        .flatten();
    outer
        .chain(inner)
        .filter(|instruction| {
            instruction
                .pointer("/parsed/type")
                .and_then(Value::as_str)
                .is_some_and(|kind| MINT_INIT_INSTRUCTIONS.contains(&kind))
        })
        .filter_map(|instruction| instruction.pointer("/parsed/info/mint").and_then(Value::as_str))
        .find(|mint| !ignored.contains(*mint))
        .map(ToString::to_string)
}
