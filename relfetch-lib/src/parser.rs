use crate::error::ReleaseError;
use crate::release::{Asset, Release};
use serde_json::Value;

/// Parses the body of a releases endpoint into releases, in response order.
///
/// Only a body that is not a JSON array is an error. Inside the array every
/// field is read independently and falls back to an empty string, and assets
/// without a name or a URL are dropped.
pub fn parse_releases(raw: &[u8]) -> Result<Vec<Release>, ReleaseError> {
    let root: Value = serde_json::from_slice(raw)
        .map_err(|e| ReleaseError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let Value::Array(items) = root else {
        return Err(ReleaseError::MalformedResponse(format!(
            "expected a JSON array, got {}",
            json_kind(&root)
        )));
    };

    Ok(items.iter().map(parse_release).collect())
}

fn parse_release(item: &Value) -> Release {
    let commit_id = item
        .get("commit")
        .filter(|commit| commit.is_object())
        .map(|commit| string_field(commit, "short_id"))
        .unwrap_or_default();

    let assets = match item.get("assets") {
        Some(assets @ Value::Object(_)) => {
            let mut parsed = link_assets(assets);
            parsed.extend(source_assets(assets));
            parsed
        }
        _ => Vec::new(),
    };

    Release {
        tag: string_field(item, "tag_name"),
        display_name: string_field(item, "name"),
        created_at: string_field(item, "created_at"),
        commit_id,
        description: string_field(item, "description"),
        assets,
    }
}

/// `assets.links[]`: named links, preferring `direct_asset_url` over `url`.
fn link_assets(assets: &Value) -> Vec<Asset> {
    array_field(assets, "links")
        .iter()
        .filter_map(|link| {
            let mut url = string_field(link, "direct_asset_url");
            if url.is_empty() {
                url = string_field(link, "url");
            }
            Asset::new(string_field(link, "name"), url)
        })
        .collect()
}

/// `assets.sources[]`: generated source archives, labelled by their format.
fn source_assets(assets: &Value) -> Vec<Asset> {
    array_field(assets, "sources")
        .iter()
        .filter_map(|source| {
            let label = format!("Source ({})", string_field(source, "format"));
            Asset::new(label, string_field(source, "url"))
        })
        .collect()
}

/// Returns the string stored under `key`, or an empty string when the key is
/// missing, `value` is not an object, or the stored value is not a string.
pub fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
