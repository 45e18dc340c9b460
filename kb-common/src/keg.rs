// kb-common/src/keg.rs
use std::fs;
use std::path::PathBuf;

use semver::Version;
use tracing::{debug, warn};

use super::config::Config;
use super::error::Result;

pub const RECEIPT_FILENAME: &str = "INSTALL_RECEIPT.json";

/// One installed version of a formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledKeg {
    pub name: String,
    pub version_str: String,
    pub path: PathBuf,
}

/// Queries installed kegs in the Cellar.
#[derive(Debug)]
pub struct KegRegistry {
    config: Config,
}

impl KegRegistry {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn cellar_path(&self) -> PathBuf {
        self.config.cellar_dir()
    }

    /// All installed versions of `name`, oldest first.
    pub fn installed_versions(&self, name: &str) -> Result<Vec<InstalledKeg>> {
        let formula_dir = self.config.formula_cellar_dir(name);
        if !formula_dir.is_dir() {
            debug!("[KEG_REGISTRY:{}] no cellar directory at {}", name, formula_dir.display());
            return Ok(Vec::new());
        }

        let mut kegs = Vec::new();
        for entry in fs::read_dir(&formula_dir)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(
                        "[KEG_REGISTRY:{}] error reading entry in {}: {}. Skipping.",
                        name,
                        formula_dir.display(),
                        e
                    );
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(version_str) = path.file_name().and_then(|n| n.to_str()) {
                kegs.push(InstalledKeg {
                    name: name.to_string(),
                    version_str: version_str.to_string(),
                    path: path.clone(),
                });
            }
        }
        kegs.sort_by(|a, b| compare_versions(&a.version_str, &b.version_str));
        Ok(kegs)
    }

    pub fn get_installed_keg(&self, name: &str) -> Result<Option<InstalledKeg>> {
        let latest = self.installed_versions(name)?.pop();
        match &latest {
            Some(keg) => debug!(
                "[KEG_REGISTRY:{}] latest keg: {} ({})",
                name,
                keg.version_str,
                keg.path.display()
            ),
            None => debug!("[KEG_REGISTRY:{}] not installed", name),
        }
        Ok(latest)
    }

    pub fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.get_installed_keg(name)?.is_some())
    }

    pub fn list_installed_kegs(&self) -> Result<Vec<InstalledKeg>> {
        let cellar_dir = self.cellar_path();
        debug!("[KEG_REGISTRY] scanning cellar: {}", cellar_dir.display());
        if !cellar_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&cellar_dir)? {
            match entry {
                Ok(e) if e.path().is_dir() => {
                    if let Some(name) = e.file_name().to_str() {
                        names.push(name.to_string());
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("[KEG_REGISTRY] error reading entry in cellar: {}. Skipping.", e),
            }
        }
        names.sort();

        let mut kegs = Vec::new();
        for name in names {
            kegs.extend(self.installed_versions(&name)?);
        }
        debug!("[KEG_REGISTRY] found {} installed kegs", kegs.len());
        Ok(kegs)
    }
}

/// Unparsable versions sort first, lexicographically; the rest by semver.
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (Version::parse(a), Version::parse(b)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb),
        (Err(_), Ok(_)) => Ordering::Less,
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_kegs_in_version_order() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::with_root(root.path());
        for v in ["0.10.0", "0.2.0", "0.1.0-SNAPSHOT"] {
            fs::create_dir_all(config.formula_keg_path("kanabo", v)).unwrap();
        }
        fs::create_dir_all(config.formula_keg_path("libyaml", "0.2.5")).unwrap();

        let registry = KegRegistry::new(config);
        let versions: Vec<String> = registry
            .installed_versions("kanabo")
            .unwrap()
            .into_iter()
            .map(|k| k.version_str)
            .collect();
        assert_eq!(versions, vec!["0.1.0-SNAPSHOT", "0.2.0", "0.10.0"]);
        assert_eq!(
            registry.get_installed_keg("kanabo").unwrap().unwrap().version_str,
            "0.10.0"
        );
        assert!(registry.is_installed("libyaml").unwrap());
        assert!(!registry.is_installed("check").unwrap());
        assert_eq!(registry.list_installed_kegs().unwrap().len(), 4);
    }

    #[test]
    fn unparsable_versions_sort_before_semver() {
        let mut versions = vec!["1.10.0", "1.9", "HEAD", "1.9.0"];
        versions.sort_by(|a, b| compare_versions(a, b));
        assert_eq!(versions, vec!["1.9", "HEAD", "1.9.0", "1.10.0"]);
    }

    #[test]
    fn missing_cellar_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let registry = KegRegistry::new(Config::with_root(root.path()));
        assert!(registry.list_installed_kegs().unwrap().is_empty());
    }
}
