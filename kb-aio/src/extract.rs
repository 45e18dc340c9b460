// kb-aio/src/extract.rs
// Handles source archive extraction off the async runtime.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use kb_common::error::{KbError, Result};
use tracing::{debug, error};
use xz2::read::XzDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
}

impl ArchiveKind {
    /// Infers the archive kind from a file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz") || name.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Extracts `archive_path` into `target_dir`, dropping `strip_components`
/// leading path components from every entry.
pub async fn extract_archive_async(
    archive_path: &Path,
    target_dir: &Path,
    strip_components: usize,
) -> Result<()> {
    let kind = ArchiveKind::from_path(archive_path).ok_or_else(|| {
        KbError::Validation(format!(
            "Unsupported archive type for {}",
            archive_path.display()
        ))
    })?;
    debug!(
        "Extracting archive '{}' ({:?}) to '{}' (strip_components={})",
        archive_path.display(),
        kind,
        target_dir.display(),
        strip_components
    );

    tokio::fs::create_dir_all(target_dir).await?;
    let archive_path = archive_path.to_path_buf();
    let target_dir = target_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let reader = BufReader::new(File::open(&archive_path)?);
        let decoded: Box<dyn Read> = match kind {
            ArchiveKind::Tar => Box::new(reader),
            ArchiveKind::TarGz => Box::new(GzDecoder::new(reader)),
            ArchiveKind::TarBz2 => Box::new(BzDecoder::new(reader)),
            ArchiveKind::TarXz => Box::new(XzDecoder::new(reader)),
        };
        unpack_tar(decoded, &target_dir, strip_components, &archive_path)
    })
    .await
    .map_err(|e| KbError::Generic(format!("JoinError in archive extraction: {e}")))?
}

fn unpack_tar<R: Read>(
    reader: R,
    target_dir: &Path,
    strip_components: usize,
    archive_path_for_log: &Path,
) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);

    let entries = archive.entries().map_err(|e| {
        KbError::Generic(format!(
            "Failed to read TAR entries from {}: {}",
            archive_path_for_log.display(),
            e
        ))
    })?;
    for entry_result in entries {
        let mut entry = entry_result.map_err(|e| {
            KbError::Generic(format!(
                "Error reading TAR entry from {}: {}",
                archive_path_for_log.display(),
                e
            ))
        })?;
        let original_path: PathBuf = entry
            .path()
            .map_err(|e| {
                KbError::Generic(format!(
                    "Invalid path in TAR entry from {}: {}",
                    archive_path_for_log.display(),
                    e
                ))
            })?
            .into_owned();

        let stripped: Vec<Component> = original_path.components().skip(strip_components).collect();
        if stripped.is_empty() {
            continue;
        }
        let relative = match normalize_within(stripped.iter().copied()) {
            Some(relative) if relative.as_os_str().is_empty() => continue,
            Some(relative) => relative,
            None => {
                error!(
                    "Disallowed path {} within {}",
                    original_path.display(),
                    archive_path_for_log.display()
                );
                return Err(KbError::Validation(format!(
                    "Unsafe path component in {}",
                    original_path.display()
                )));
            }
        };
        ensure_no_symlink_parents(target_dir, &relative)?;
        let target_path = target_dir.join(&relative);

        if let Some(parent) = target_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if let Ok(meta) = std::fs::symlink_metadata(&target_path) {
            if meta.file_type().is_symlink() {
                debug!("Replacing existing link {}", target_path.display());
                std::fs::remove_file(&target_path)?;
            }
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let link_name: PathBuf = entry
                .link_name()?
                .map(|name| name.into_owned())
                .ok_or_else(|| {
                    KbError::Validation(format!("Link {} has no target", original_path.display()))
                })?;
            if link_name.is_absolute() {
                return Err(unsafe_link(&original_path, &link_name));
            }
            if entry_type.is_hard_link() {
                // Hard link names are relative to the archive root.
                let source = normalize_within(link_name.components().skip(strip_components))
                    .filter(|p| !p.as_os_str().is_empty())
                    .ok_or_else(|| unsafe_link(&original_path, &link_name))?;
                ensure_no_symlink_parents(target_dir, &source)?;
                std::fs::hard_link(target_dir.join(&source), &target_path)?;
                continue;
            }
            // Symlink targets are relative to the link's own directory.
            let parent = relative.parent().unwrap_or_else(|| Path::new(""));
            if normalize_within(parent.components().chain(link_name.components())).is_none() {
                return Err(unsafe_link(&original_path, &link_name));
            }
        }

        entry.unpack(&target_path).map_err(|e| {
            KbError::Generic(format!(
                "Failed to unpack {} to {}: {}",
                original_path.display(),
                target_path.display(),
                e
            ))
        })?;
    }
    debug!("Finished extracting {}", archive_path_for_log.display());
    Ok(())
}

/// Resolves `.` and `..` lexically. `None` when the path is absolute or
/// climbs above its starting point.
fn normalize_within<'a>(components: impl Iterator<Item = Component<'a>>) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for comp in components {
        match comp {
            Component::Normal(p) => parts.push(p),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.into_iter().collect())
}

/// Fails if any existing directory between `base` and `relative` is a
/// symlink, so nothing is written through a link the archive planted.
fn ensure_no_symlink_parents(base: &Path, relative: &Path) -> Result<()> {
    let mut current = base.to_path_buf();
    let Some(parent) = relative.parent() else {
        return Ok(());
    };
    for comp in parent.components() {
        current.push(comp);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(KbError::Validation(format!(
                    "Refusing to extract through symlink {}",
                    current.display()
                )));
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Ok(())
}

fn unsafe_link(entry: &Path, link_name: &Path) -> KbError {
    KbError::Validation(format!(
        "Link {} points outside the extraction directory: {}",
        entry.display(),
        link_name.display()
    ))
}

/// The directory a build should run in: the single top-level directory of
/// an unpacked tarball, or `dir` itself when the archive had several entries.
pub fn find_source_root(dir: &Path) -> Result<PathBuf> {
    let mut entries = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path());
    match (entries.next(), entries.next()) {
        (Some(only), None) if only.is_dir() => Ok(only),
        (None, _) => Err(KbError::Validation(format!(
            "Archive unpacked to an empty directory: {}",
            dir.display()
        ))),
        _ => Ok(dir.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;

    fn write_tarball(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn detects_archive_kinds() {
        assert_eq!(
            ArchiveKind::from_path(Path::new("kanabo-0.2.0.tar.gz")),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(ArchiveKind::from_path(Path::new("x.tbz2")), Some(ArchiveKind::TarBz2));
        assert_eq!(ArchiveKind::from_path(Path::new("x.tar.xz")), Some(ArchiveKind::TarXz));
        assert_eq!(ArchiveKind::from_path(Path::new("x.zip")), None);
    }

    #[tokio::test]
    async fn extracts_and_finds_single_top_level_dir() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("kanabo-0.2.0.tar.gz");
        write_tarball(
            &archive,
            &[
                ("kanabo-kanabo-0.2.0/Makefile", "install:\n"),
                ("kanabo-kanabo-0.2.0/src/main.c", "int main(void){return 0;}\n"),
            ],
        );
        let out = dir.path().join("out");
        extract_archive_async(&archive, &out, 0).await.unwrap();
        let root = find_source_root(&out).unwrap();
        assert_eq!(root, out.join("kanabo-kanabo-0.2.0"));
        assert!(root.join("src/main.c").is_file());
    }

    #[tokio::test]
    async fn strips_leading_components() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("src.tgz");
        write_tarball(&archive, &[("top/Makefile", "all:\n")]);
        let out = dir.path().join("out");
        extract_archive_async(&archive, &out, 1).await.unwrap();
        assert!(out.join("Makefile").is_file());
    }

    #[tokio::test]
    async fn rejects_unsupported_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("src.zip");
        std::fs::write(&archive, b"PK").unwrap();
        assert!(matches!(
            extract_archive_async(&archive, &dir.path().join("out"), 0).await,
            Err(KbError::Validation(_))
        ));
    }

    fn write_tar_with_link(path: &Path, link: &str, target: &Path, then: Option<&str>) {
        let mut builder = tar::Builder::new(File::create(path).unwrap());
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        builder.append_link(&mut header, link, target).unwrap();
        if let Some(name) = then {
            let body = b"payload";
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, &body[..]).unwrap();
        }
        builder.into_inner().unwrap();
    }

    #[tokio::test]
    async fn symlink_escaping_the_target_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        let archive = dir.path().join("escape.tar");
        write_tar_with_link(&archive, "top/link", &outside, Some("top/link/evil.txt"));

        let out = dir.path().join("out");
        let result = extract_archive_async(&archive, &out, 0).await;
        assert!(matches!(result, Err(KbError::Validation(_))), "{result:?}");
        assert!(!outside.join("evil.txt").exists());
    }

    #[tokio::test]
    async fn relative_symlink_climbing_out_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("climb.tar");
        write_tar_with_link(&archive, "top/link", Path::new("../../.."), None);
        assert!(matches!(
            extract_archive_async(&archive, &dir.path().join("out"), 0).await,
            Err(KbError::Validation(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn writing_through_an_internal_symlink_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("inner.tar");
        write_tar_with_link(&archive, "top/lib", Path::new("src"), Some("top/lib/x.c"));
        let out = dir.path().join("out");
        assert!(matches!(
            extract_archive_async(&archive, &out, 0).await,
            Err(KbError::Validation(_))
        ));
        assert!(std::fs::symlink_metadata(out.join("top/lib"))
            .unwrap()
            .file_type()
            .is_symlink());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_inside_the_tree_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("ok.tar");
        write_tar_with_link(&archive, "top/Makefile.link", Path::new("Makefile"), None);
        let out = dir.path().join("out");
        extract_archive_async(&archive, &out, 0).await.unwrap();
        assert_eq!(
            std::fs::read_link(out.join("top/Makefile.link")).unwrap(),
            PathBuf::from("Makefile")
        );
    }

    #[test]
    fn empty_directory_has_no_source_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_source_root(dir.path()).is_err());
    }
}
