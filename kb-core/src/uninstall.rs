// kb-core/src/uninstall.rs
use kb_common::config::Config;
use kb_common::error::{KbError, Result};
use kb_common::keg::{InstalledKeg, KegRegistry};
use tracing::{debug, warn};

/// Rejects names that would not stay inside their own Cellar directory.
pub fn validate_formula_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains(std::path::MAIN_SEPARATOR)
    {
        return Err(KbError::Validation(format!("Invalid formula name '{name}'")));
    }
    Ok(())
}

/// Removes every installed keg of `name` and returns what was removed.
pub fn uninstall_formula(name: &str, config: &Config) -> Result<Vec<InstalledKeg>> {
    validate_formula_name(name)?;
    let registry = KegRegistry::new(config.clone());
    let kegs = registry.installed_versions(name)?;
    if kegs.is_empty() {
        return Err(KbError::NotFound(format!("{name} is not installed")));
    }

    for keg in &kegs {
        debug!(
            "Uninstalling {} version {} from {}",
            keg.name,
            keg.version_str,
            keg.path.display()
        );
        kb_aio::fs::remove_directory_recursive(&keg.path)?;
    }

    let cellar_dir = config.formula_cellar_dir(name);
    if let Err(e) = kb_aio::fs::remove_dir_if_empty(&cellar_dir) {
        warn!("Could not remove {}: {}", cellar_dir.display(), e);
    }
    Ok(kegs)
}
