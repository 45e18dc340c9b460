// kb-aio/src/checksum.rs
use std::path::Path;

use kb_common::error::Result;
use kb_common::model::Checksum;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Asynchronously verifies a file against `expected`.
/// Reads the file asynchronously but performs hashing synchronously.
pub async fn verify_checksum_async(path: &Path, expected: &Checksum) -> Result<()> {
    debug!("Async Verifying checksum for: {}", path.display());
    let mut file = File::open(path).await?;

    let mut hasher = expected.algorithm().hasher();
    let mut buffer = vec![0u8; 8192];
    let mut total_bytes_read: u64 = 0;

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total_bytes_read += n as u64;
    }

    let actual = hasher.finalize_hex();
    debug!(
        "Async Calculated {}: {} ({} bytes read)",
        expected.algorithm().name(),
        actual,
        total_bytes_read
    );
    debug!("Expected {}:   {}", expected.algorithm().name(), expected.hex());

    expected.check_hex(&path.display().to_string(), &actual)
}
