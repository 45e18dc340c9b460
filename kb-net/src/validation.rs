// kb-net/src/validation.rs
use std::path::Path;

use kb_common::error::{KbError, Result};
use kb_common::FormulaRecord;
use tracing::warn;
use url::Url;

/// Validates a source URL. `https` and `file` are always accepted; plain
/// `http` only when `allow_insecure_http` is set.
pub fn validate_url(url_str: &str, allow_insecure_http: bool) -> Result<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| KbError::Validation(format!("Failed to parse URL '{url_str}': {e}")))?;
    match url.scheme() {
        "https" | "file" => Ok(url),
        "http" if allow_insecure_http => {
            warn!("Using insecure http URL: {}", url_str);
            Ok(url)
        }
        other => Err(KbError::Validation(format!(
            "Invalid URL scheme for '{url_str}': Must be https, but got '{other}'"
        ))),
    }
}

/// Verifies a fetched artifact against the formula checksum.
///
/// Returns `Ok(false)` when the formula carries no checksum and nothing was
/// checked, `Ok(true)` when the digest matched.
pub async fn verify_artifact(formula: &FormulaRecord, path: &Path) -> Result<bool> {
    match &formula.checksum {
        Some(checksum) => {
            kb_aio::verify_checksum_async(path, checksum).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}
