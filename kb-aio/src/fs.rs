// kb-aio/src/fs.rs
use std::fs;
use std::io::Write;
use std::path::Path;

use kb_common::error::{KbError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed to create directory {}: {}", path.display(), e);
        KbError::from(e)
    })
}

pub fn remove_directory_recursive(path: &Path) -> Result<()> {
    debug!("Removing directory recursively: {}", path.display());
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!("Failed to remove directory {}: {}", path.display(), e);
            Err(KbError::from(e))
        }
    }
}

/// Removes `path` if it is an empty directory; returns whether it was removed.
pub fn remove_dir_if_empty(path: &Path) -> Result<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                return Ok(false);
            }
            fs::remove_dir(path)?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(KbError::from(e)),
    }
}

#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
pub fn set_permissions(path: &Path, _mode: u32) -> Result<()> {
    debug!(
        "Setting permissions not supported on this platform: {}",
        path.display()
    );
    Ok(())
}

/// Atomically writes data to a file using a temporary file in the same directory.
pub fn atomic_write_file(original_path: &Path, content: &[u8]) -> Result<()> {
    let dir = original_path.parent().ok_or_else(|| {
        KbError::Generic(format!(
            "Cannot get parent directory for {}",
            original_path.display()
        ))
    })?;
    create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    let temp_path = temp_file.path().to_path_buf();
    debug!(
        "Atomically writing {} bytes to {} via temp file {}",
        content.len(),
        original_path.display(),
        temp_path.display()
    );

    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;

    temp_file.persist(original_path).map_err(|e| {
        error!(
            "Failed to persist temporary file {} over {}: {}",
            temp_path.display(),
            original_path.display(),
            e.error
        );
        KbError::from(e.error)
    })?;

    if let Err(e) = set_permissions(original_path, 0o644) {
        warn!(
            "Failed to set default permissions on {}: {}",
            original_path.display(),
            e
        );
    }
    Ok(())
}

pub async fn atomic_write_file_async(path: &Path, content: &[u8]) -> Result<()> {
    let path = path.to_path_buf();
    let content = content.to_vec();
    tokio::task::spawn_blocking(move || atomic_write_file(&path, &content))
        .await
        .map_err(|e| KbError::Generic(format!("JoinError in atomic write: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/receipt.json");
        atomic_write_file(&path, b"one").unwrap();
        atomic_write_file(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }

    #[test]
    fn removes_only_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("full");
        fs::create_dir_all(&full).unwrap();
        fs::write(full.join("f"), b"x").unwrap();
        assert!(!remove_dir_if_empty(&full).unwrap());
        let empty = dir.path().join("empty");
        fs::create_dir_all(&empty).unwrap();
        assert!(remove_dir_if_empty(&empty).unwrap());
        assert!(!empty.exists());
        remove_directory_recursive(&full).unwrap();
        remove_directory_recursive(&full).unwrap();
    }
}
