use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// `scheme://domain/<project>/-/jobs/<id>/artifacts/raw/<rest>`, the browser
/// URL of a single file inside a CI job's artifacts.
static JOB_ARTIFACT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<origin>[A-Za-z][A-Za-z0-9+.\-]*://[^/?#]+)/(?P<project>[^?#]+?)/-/jobs/(?P<job>[^/?#]+)/artifacts/raw/(?P<rest>.*)$",
    )
    .unwrap()
});

const HOSTILE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];
const LAST_RESORT_NAME: &str = "download";

/// Returns the URL the transfer should actually request.
///
/// Job artifact browser URLs only serve their content to a logged-in session,
/// so they are mapped onto the equivalent token-authenticated API route.
/// Every other URL is returned untouched.
pub fn resolve_source_url(url: &str) -> String {
    let Some(caps) = JOB_ARTIFACT_REGEX.captures(url) else {
        return url.to_string();
    };

    let project: String = url::form_urlencoded::byte_serialize(caps["project"].as_bytes()).collect();
    format!(
        "{}/api/v4/projects/{}/jobs/{}/artifacts/{}",
        &caps["origin"], project, &caps["job"], &caps["rest"]
    )
}

/// Derives the on-disk file name for an asset from the URL it is fetched from.
///
/// The last path segment wins; `fallback` (the asset's display name) is used
/// when that segment is empty. Query strings are dropped and path-hostile
/// characters become `_`.
pub fn destination_file_name(url: &str, fallback: &str) -> String {
    let tail = strip_query(url).rsplit('/').next().unwrap_or_default();
    let name = [tail, strip_query(fallback)]
        .into_iter()
        .find(|candidate| is_usable(candidate))
        .unwrap_or(LAST_RESORT_NAME);
    sanitize_file_name(name)
}

pub fn destination_path(root: &Path, url: &str, fallback: &str) -> PathBuf {
    root.join(destination_file_name(url, fallback))
}

pub fn sanitize_file_name(name: &str) -> String {
    name.replace(HOSTILE_CHARS, "_")
}

fn strip_query(value: &str) -> &str {
    value.split('?').next().unwrap_or_default()
}

fn is_usable(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".."
}
