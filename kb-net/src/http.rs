// kb-net/src/http.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use kb_common::config::Config;
use kb_common::error::{KbError, Result};
use kb_common::FormulaRecord;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use tokio::fs::{self, File as TokioFile};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use url::Url;

use crate::validation::validate_url;

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "kb formula installer (Rust)";

/// Where the source archive for `formula` lives in the download cache.
pub fn cached_source_path(formula: &FormulaRecord, config: &Config) -> PathBuf {
    config
        .cache_dir()
        .join(format!("{}--{}", formula.name, formula.source_file_name()))
}

/// Obtains the source archive for `formula`, reusing the cache when possible.
///
/// A cached file is reused only if it still matches the checksum (or the
/// formula has none). Otherwise the primary URL and then each mirror is
/// tried once, in order. Freshly downloaded files are not verified here.
pub async fn fetch_source(formula: &FormulaRecord, config: &Config) -> Result<PathBuf> {
    let primary = formula.resolve_source_location()?;
    let cache_path = cached_source_path(formula, config);
    debug!(
        "Preparing to fetch source for '{}' from URL: {}",
        formula.name, primary
    );
    debug!("Target cache path: {}", cache_path.display());

    if cache_path.is_file() {
        match &formula.checksum {
            Some(checksum) => match kb_aio::verify_checksum_async(&cache_path, checksum).await {
                Ok(()) => {
                    debug!("Using valid cached file: {}", cache_path.display());
                    return Ok(cache_path);
                }
                Err(e) => {
                    debug!(
                        "Cached file failed verification ({}): {}. Redownloading.",
                        cache_path.display(),
                        e
                    );
                    if let Err(remove_err) = fs::remove_file(&cache_path).await {
                        debug!(
                            "Failed to remove stale cached file {}: {}",
                            cache_path.display(),
                            remove_err
                        );
                    }
                }
            },
            None => {
                debug!(
                    "Using cached file (no checksum provided): {}",
                    cache_path.display()
                );
                return Ok(cache_path);
            }
        }
    }

    fs::create_dir_all(config.cache_dir()).await?;

    let urls_to_try = std::iter::once(formula.url.as_str())
        .chain(formula.mirrors.iter().map(|s| s.as_str()));
    let mut last_error: Option<KbError> = None;
    let mut client: Option<Client> = None;

    for current_url in urls_to_try {
        let url = match validate_url(current_url, config.allow_insecure_http) {
            Ok(url) => url,
            Err(e) => {
                warn!("Skipping source location {}: {}", current_url, e);
                last_error = Some(e);
                continue;
            }
        };
        debug!("Attempting download from: {}", url);
        let attempt = if url.scheme() == "file" {
            copy_local(&url, &cache_path).await
        } else {
            let client = match &client {
                Some(c) => c.clone(),
                None => {
                    let built = build_http_client()?;
                    client = Some(built.clone());
                    built
                }
            };
            download(&client, &url, &cache_path).await
        };
        match attempt {
            Ok(()) => {
                debug!("Fetched {} to {}", url, cache_path.display());
                return Ok(cache_path);
            }
            Err(e) => {
                error!("Download attempt failed from {}: {}", url, e);
                last_error = Some(e);
            }
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "All download attempts failed.".to_string());
    Err(KbError::Fetch {
        name: formula.name.clone(),
        url: formula.url.clone(),
        reason,
    })
}

fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| KbError::Generic(format!("Failed to build HTTP client: {e}")))
}

fn temp_path_for(final_path: &Path) -> PathBuf {
    let temp_filename = format!(
        ".{}.download",
        final_path.file_name().unwrap_or_default().to_string_lossy()
    );
    final_path.with_file_name(temp_filename)
}

async fn copy_local(url: &Url, final_path: &Path) -> Result<()> {
    let source = url
        .to_file_path()
        .map_err(|_| KbError::Validation(format!("Not a local file URL: {url}")))?;
    let temp_path = temp_path_for(final_path);
    fs::copy(&source, &temp_path).await.map_err(|e| {
        KbError::Generic(format!("Failed to copy {}: {}", source.display(), e))
    })?;
    fs::rename(&temp_path, final_path).await?;
    Ok(())
}

async fn download(client: &Client, url: &Url, final_path: &Path) -> Result<()> {
    let temp_path = temp_path_for(final_path);
    debug!("Downloading to temporary path: {}", temp_path.display());
    if temp_path.exists() {
        if let Err(e) = fs::remove_file(&temp_path).await {
            warn!(
                "Could not remove existing temporary file {}: {}",
                temp_path.display(),
                e
            );
        }
    }

    let response = client.get(url.as_str()).send().await?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);
    if !status.is_success() {
        return Err(KbError::Generic(format!("HTTP error {status} for URL {url}")));
    }

    let mut temp_file = TokioFile::create(&temp_path).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        temp_file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    temp_file.flush().await?;
    drop(temp_file);
    debug!("Wrote {} bytes to {}", written, temp_path.display());

    fs::rename(&temp_path, final_path).await?;
    Ok(())
}
