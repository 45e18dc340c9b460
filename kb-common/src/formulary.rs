// kb-common/src/formulary.rs
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::config::Config;
use super::error::{KbError, Result};
use super::model::FormulaRecord;
use super::{dsl, history};

/// Resolves formula references to records.
///
/// A reference is a path to a `.toml`, `.json` or `.rb` file, a name looked up
/// in the formula directory, or `kanabo@N` for a bundled snapshot. A bare
/// `kanabo` falls back to the newest bundled snapshot when no file exists.
pub struct Formulary {
    formula_dir: PathBuf,
    parsed_cache: Mutex<HashMap<String, Arc<FormulaRecord>>>,
}

impl Formulary {
    pub fn new(config: &Config) -> Self {
        Self::with_dir(config.formula_dir())
    }

    pub fn with_dir(formula_dir: impl Into<PathBuf>) -> Self {
        Self {
            formula_dir: formula_dir.into(),
            parsed_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn formula_dir(&self) -> &Path {
        &self.formula_dir
    }

    pub fn load_formula(&self, reference: &str) -> Result<Arc<FormulaRecord>> {
        if let Some(hit) = self.cache_lock()?.get(reference) {
            debug!("Loaded formula '{}' from parsed cache.", reference);
            return Ok(Arc::clone(hit));
        }

        let record = Arc::new(self.resolve(reference)?);
        debug!(
            "Loaded formula '{}' ({}) for reference '{}'",
            record.name,
            record
                .resolved_version()
                .map(|v| v.to_string())
                .unwrap_or_else(|_| "unknown version".to_string()),
            reference
        );
        self.cache_lock()?
            .insert(reference.to_string(), Arc::clone(&record));
        Ok(record)
    }

    /// Names of formulas available in the formula directory, plus the bundled one.
    pub fn available(&self) -> Result<Vec<String>> {
        let mut names = vec![history::BUNDLED_FORMULA.to_string()];
        if self.formula_dir.is_dir() {
            for entry in fs::read_dir(&self.formula_dir)? {
                let path = entry?.path();
                let is_formula = matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("toml") | Some("json") | Some("rb")
                );
                if let (true, Some(stem)) = (is_formula, path.file_stem().and_then(|s| s.to_str())) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn cache_lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<FormulaRecord>>>> {
        self.parsed_cache
            .lock()
            .map_err(|_| KbError::Generic("formula cache lock poisoned".to_string()))
    }

    fn resolve(&self, reference: &str) -> Result<FormulaRecord> {
        let as_path = Path::new(reference);
        if as_path.extension().is_some() && as_path.is_file() {
            return load_formula_file(as_path);
        }

        if let Some((name, n)) = history::parse_snapshot_ref(reference) {
            if name == history::BUNDLED_FORMULA {
                return history::snapshot(n);
            }
            return Err(KbError::NotFound(format!(
                "No snapshot history for formula '{name}'"
            )));
        }

        for ext in ["toml", "json", "rb"] {
            let candidate = self.formula_dir.join(format!("{reference}.{ext}"));
            if candidate.is_file() {
                return load_formula_file(&candidate);
            }
        }

        if reference == history::BUNDLED_FORMULA {
            debug!("Using bundled '{}' formula", reference);
            return history::latest();
        }

        Err(KbError::NotFound(format!(
            "Formula '{}' not found in {}",
            reference,
            self.formula_dir.display()
        )))
    }
}

pub fn load_formula_file(path: &Path) -> Result<FormulaRecord> {
    debug!("Reading formula file {}", path.display());
    let raw = fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => FormulaRecord::from_toml_str(&raw),
        Some("json") => FormulaRecord::from_json_str(&raw),
        Some("rb") => dsl::parse_formula_rb(&raw),
        other => Err(KbError::Validation(format!(
            "Unsupported formula file type {:?} for {}",
            other.unwrap_or(""),
            path.display()
        ))),
    }
}
