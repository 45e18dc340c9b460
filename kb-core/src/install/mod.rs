// kb-core/src/install/mod.rs
//! The install pipeline.
//!
//! Steps run strictly in order and each one gates the next:
//! resolve source, fetch, verify, check dependencies, unpack, create the
//! prefix, run the install command, write the receipt.

pub mod receipt;

use std::path::{Path, PathBuf};

use kb_common::config::Config;
use kb_common::error::{KbError, Result};
use kb_common::keg::{KegRegistry, RECEIPT_FILENAME};
use kb_common::model::RenderedCommand;
use kb_common::FormulaRecord;
pub use receipt::InstallReceipt;
use semver::Version;
use tracing::{debug, info, warn};

use crate::build::env::BuildEnvironment;
use crate::build::{devtools, make};
use crate::check;

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Install here instead of the formula's keg in the Cellar.
    pub prefix: Option<PathBuf>,
    /// Compiler invocation for `{cc}`; discovered when unset.
    pub cc: Option<String>,
    pub ignore_dependencies: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub name: String,
    pub version: Version,
    pub prefix: PathBuf,
    pub command: RenderedCommand,
    pub integrity_verified: bool,
    /// `None` for a dry run.
    pub receipt: Option<InstallReceipt>,
}

impl InstallOutcome {
    pub fn is_dry_run(&self) -> bool {
        self.receipt.is_none()
    }
}

/// Installs `formula` into its prefix.
///
/// Any failure aborts the pipeline. If the install command fails after kb
/// created the prefix, the prefix is removed again.
pub async fn install_formula(
    formula: &FormulaRecord,
    config: &Config,
    options: &InstallOptions,
) -> Result<InstallOutcome> {
    formula.validate()?;
    let version = formula.resolved_version()?;
    let prefix = match &options.prefix {
        Some(p) => p.clone(),
        None => config.formula_keg_path(&formula.name, &version.to_string()),
    };
    if !prefix.is_absolute() {
        return Err(KbError::Validation(format!(
            "Install prefix must be an absolute path, got '{}'",
            prefix.display()
        )));
    }
    let compiler = devtools::resolve_compiler_invocation(config, options.cc.as_deref())?;

    if options.dry_run {
        let command = make::render_install_command(formula, &prefix, &compiler)?;
        debug!("Dry run for {}: {}", formula.name, command);
        return Ok(InstallOutcome {
            name: formula.name.clone(),
            version,
            prefix,
            command,
            integrity_verified: false,
            receipt: None,
        });
    }

    if prefix.join(RECEIPT_FILENAME).is_file() {
        return Err(KbError::Validation(format!(
            "{} {} is already installed at {}",
            formula.name,
            version,
            prefix.display()
        )));
    }

    info!("==> Installing {} {}", formula.name, version);
    let source_url = formula.resolve_source_location()?;
    debug!("Source location: {}", source_url);

    info!("==> Fetching {}", formula.source_file_name());
    let archive = kb_net::fetch_source(formula, config).await?;

    let integrity_verified = kb_net::verify_artifact(formula, &archive).await?;
    if integrity_verified {
        debug!("Verified {}", archive.display());
    } else {
        warn!(
            "{} has no checksum; installing unverified source {}",
            formula.name,
            archive.display()
        );
    }

    let dependency_kegs = if options.ignore_dependencies {
        warn!("Skipping dependency check for {}", formula.name);
        Vec::new()
    } else {
        let registry = KegRegistry::new(config.clone());
        check::check_dependencies(formula, &registry)?
    };
    let dependency_paths: Vec<PathBuf> = dependency_kegs.into_iter().map(|k| k.path).collect();

    kb_aio::fs::create_dir_all(&config.tmp_dir())?;
    let build_dir = tempfile::Builder::new()
        .prefix(&format!("{}-", formula.name))
        .tempdir_in(config.tmp_dir())?;
    info!("==> Unpacking {}", archive.display());
    kb_aio::extract_archive_async(&archive, build_dir.path(), 0).await?;
    let source_root = kb_aio::find_source_root(build_dir.path())?;
    debug!("Source root: {}", source_root.display());

    let created_prefix = !prefix.exists();
    kb_aio::fs::create_dir_all(&prefix)?;

    let result = run_install_step(
        formula,
        config,
        &source_root,
        &prefix,
        &compiler,
        &dependency_paths,
    )
    .await
    .map(|command| InstallReceipt::new(formula, version.clone(), integrity_verified, command));

    let receipt = match result {
        Ok(receipt) => receipt,
        Err(e) => {
            if created_prefix {
                cleanup_prefix(config, formula, &prefix);
            }
            return Err(e);
        }
    };
    if let Err(e) = receipt.write_to(&prefix).await {
        if created_prefix {
            cleanup_prefix(config, formula, &prefix);
        }
        return Err(e);
    }

    info!("==> Installed {} {} to {}", formula.name, version, prefix.display());
    Ok(InstallOutcome {
        name: formula.name.clone(),
        version,
        prefix,
        command: receipt.command.clone(),
        integrity_verified,
        receipt: Some(receipt),
    })
}

async fn run_install_step(
    formula: &FormulaRecord,
    config: &Config,
    source_root: &Path,
    prefix: &Path,
    compiler: &str,
    dependency_paths: &[PathBuf],
) -> Result<RenderedCommand> {
    let build_env = BuildEnvironment::new(config, compiler, dependency_paths)?;
    make::install(formula, source_root, prefix, compiler, &build_env).await
}

fn cleanup_prefix(config: &Config, formula: &FormulaRecord, prefix: &Path) {
    warn!("Removing partially installed prefix {}", prefix.display());
    if let Err(e) = kb_aio::fs::remove_directory_recursive(prefix) {
        warn!("Failed to remove {}: {}", prefix.display(), e);
    }
    let cellar_dir = config.formula_cellar_dir(&formula.name);
    if prefix.parent() == Some(cellar_dir.as_path()) {
        if let Err(e) = kb_aio::fs::remove_dir_if_empty(&cellar_dir) {
            debug!("Could not tidy {}: {}", cellar_dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use kb_common::history;
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn dry_run_renders_without_touching_disk() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::with_root(root.path());
        let options = InstallOptions {
            prefix: Some(PathBuf::from("/opt/kanabo")),
            cc: Some("cc".to_string()),
            dry_run: true,
            ..Default::default()
        };
        let outcome = install_formula(&history::latest().unwrap(), &config, &options)
            .await
            .unwrap();
        assert!(outcome.is_dry_run());
        assert_eq!(
            outcome.command.to_string(),
            "make prefix=/opt/kanabo CC=cc install"
        );
        assert!(!config.cache_dir().exists());
        assert!(!config.tmp_dir().exists());
    }

    #[tokio::test]
    async fn default_prefix_is_the_cellar_keg() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::with_root(root.path());
        let options = InstallOptions {
            cc: Some("cc".to_string()),
            dry_run: true,
            ..Default::default()
        };
        let outcome = install_formula(&history::snapshot(1).unwrap(), &config, &options)
            .await
            .unwrap();
        assert_eq!(
            outcome.prefix,
            config.formula_keg_path("kanabo", "0.1.0-SNAPSHOT")
        );
        assert_eq!(outcome.command.args[0], format!("PREFIX={}", outcome.prefix.display()));
    }

    #[tokio::test]
    async fn relative_prefix_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::with_root(root.path());
        let options = InstallOptions {
            prefix: Some(PathBuf::from("opt/kanabo")),
            cc: Some("cc".to_string()),
            dry_run: true,
            ..Default::default()
        };
        assert!(matches!(
            install_formula(&history::latest().unwrap(), &config, &options).await,
            Err(KbError::Validation(_))
        ));
    }
}
