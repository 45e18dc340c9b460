// kb-core/src/check/installed.rs
use std::path::PathBuf;

use kb_common::config::Config;
use kb_common::error::Result;
use kb_common::keg::KegRegistry;
use tracing::debug;

use crate::install::InstallReceipt;

#[derive(Debug, Clone)]
pub struct InstalledPackageInfo {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    /// Missing for kegs kb did not install itself.
    pub receipt: Option<InstallReceipt>,
}

pub async fn get_installed_packages(config: &Config) -> Result<Vec<InstalledPackageInfo>> {
    let keg_registry = KegRegistry::new(config.clone());
    let mut installed = Vec::new();
    for keg in keg_registry.list_installed_kegs()? {
        let receipt = match InstallReceipt::read_from(&keg.path).await {
            Ok(r) => Some(r),
            Err(e) => {
                debug!("No readable receipt in {}: {}", keg.path.display(), e);
                None
            }
        };
        installed.push(InstalledPackageInfo {
            name: keg.name,
            version: keg.version_str,
            path: keg.path,
            receipt,
        });
    }
    Ok(installed)
}
