// kb-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{KbError, Result};

// Used when neither KB_ROOT nor HOMEBREW_PREFIX is set.
const DEFAULT_FALLBACK_KB_ROOT: &str = "/opt/kb";

#[derive(Debug, Clone)]
pub struct Config {
    pub kb_root: PathBuf,
    /// Compiler invocation substituted for `{cc}`; resolved at install time when unset.
    pub cc: Option<String>,
    pub allow_insecure_http: bool,
    /// Parallel make jobs; the CPU count when unset.
    pub make_jobs: Option<usize>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading kb configuration");

        let kb_root_str = env::var("KB_ROOT")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| env::var("HOMEBREW_PREFIX").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| {
                debug!(
                    "KB_ROOT and HOMEBREW_PREFIX not set, falling back to default: {}",
                    DEFAULT_FALLBACK_KB_ROOT
                );
                DEFAULT_FALLBACK_KB_ROOT.to_string()
            });
        let kb_root = PathBuf::from(&kb_root_str);
        if !kb_root.is_absolute() {
            return Err(KbError::Config(format!(
                "KB_ROOT must be an absolute path, got '{kb_root_str}'"
            )));
        }
        debug!("Effective KB_ROOT set to: {}", kb_root.display());

        let cc = env::var("KB_CC").ok().filter(|s| !s.is_empty());
        let allow_insecure_http = env::var("KB_ALLOW_INSECURE_HTTP").is_ok_and(|v| v == "1");

        let make_jobs = match env::var("KB_MAKE_JOBS") {
            Ok(v) => Some(v.parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(|| {
                KbError::Config(format!("KB_MAKE_JOBS must be a positive integer, got '{v}'"))
            })?),
            Err(_) => None,
        };

        debug!("Configuration loaded successfully.");
        Ok(Self {
            kb_root,
            cc,
            allow_insecure_http,
            make_jobs,
        })
    }

    /// A configuration rooted at `root` with every other setting at its default.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            kb_root: root.into(),
            cc: None,
            allow_insecure_http: false,
            make_jobs: None,
        }
    }

    pub fn kb_root(&self) -> &Path {
        &self.kb_root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.kb_root.join("bin")
    }

    pub fn cellar_dir(&self) -> PathBuf {
        self.kb_root.join("Cellar")
    }

    pub fn formula_dir(&self) -> PathBuf {
        self.kb_root.join("Library/Formula")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.kb_root.join("kb_cache")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.kb_root.join("kb_logs")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.kb_root.join("tmp")
    }

    pub fn formula_cellar_dir(&self, formula_name: &str) -> PathBuf {
        self.cellar_dir().join(formula_name)
    }

    pub fn formula_keg_path(&self, formula_name: &str, version_str: &str) -> PathBuf {
        self.formula_cellar_dir(formula_name).join(version_str)
    }
}
