// kb-common/src/model/formula.rs
//! The formula record: everything a runtime needs to fetch, verify and
//! install one released version of a package.

use std::collections::BTreeSet;

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::checksum::Checksum;
use super::template::{InstallTemplate, CC_KEY, PREFIX_KEY};
use crate::dependency::{Dependency, DependencyPhase};
use crate::error::{KbError, Result};

const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.gz", ".tgz", ".tar.bz2", ".tbz", ".tbz2", ".tar.xz", ".txz", ".tar", ".zip",
];

/// One immutable release descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    /// Source tarball location.
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mirrors: Vec<String>,
    /// Absent in some releases; verification is skipped when it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    pub install: InstallTemplate,
}

impl FormulaRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>, install: InstallTemplate) -> Self {
        Self {
            name: name.into(),
            version: None,
            desc: None,
            homepage: None,
            url: url.into(),
            mirrors: Vec::new(),
            checksum: None,
            dependencies: Vec::new(),
            install,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The source location. An empty or unparsable URL is a configuration error.
    pub fn resolve_source_location(&self) -> Result<Url> {
        if self.url.trim().is_empty() {
            return Err(KbError::Config(format!(
                "Formula '{}' has no source URL",
                self.name
            )));
        }
        Url::parse(&self.url).map_err(|e| {
            KbError::Config(format!(
                "Formula '{}' has an invalid source URL '{}': {}",
                self.name, self.url, e
            ))
        })
    }

    /// Checks `artifact` against the recorded checksum.
    ///
    /// Succeeds unconditionally when the record carries no checksum: such a
    /// release offers no integrity guarantee and callers that care should
    /// consult [`FormulaRecord::has_checksum`].
    pub fn verify(&self, artifact: &[u8]) -> Result<()> {
        match &self.checksum {
            Some(checksum) => checksum.verify_bytes(&self.source_file_name(), artifact),
            None => {
                debug!(
                    "Formula '{}' has no checksum; skipping integrity verification",
                    self.name
                );
                Ok(())
            }
        }
    }

    pub fn has_checksum(&self) -> bool {
        self.checksum.is_some()
    }

    /// The declared dependencies as `(name, phase)` pairs.
    pub fn resolve_build_dependencies(&self) -> BTreeSet<(String, DependencyPhase)> {
        self.dependencies
            .iter()
            .map(|dep| (dep.name.clone(), dep.phase()))
            .collect()
    }

    /// Last path segment of the source URL, e.g. `kanabo-0.2.0.tar.gz`.
    pub fn source_file_name(&self) -> String {
        self.url
            .split(['?', '#'])
            .next()
            .and_then(|u| u.rsplit('/').next())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("{}-download", self.name))
    }

    /// The explicit version, or one derived from the source file name.
    pub fn resolved_version(&self) -> Result<Version> {
        if let Some(v) = &self.version {
            return Ok(v.clone());
        }
        version_from_file_name(&self.name, &self.source_file_name()).ok_or_else(|| {
            KbError::Validation(format!(
                "Cannot determine a version for '{}' from '{}'",
                self.name, self.url
            ))
        })
    }

    /// Checks the record invariants. Called by every loader.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(KbError::Validation("formula has an empty name".to_string()));
        }
        self.resolve_source_location()?;
        for mirror in &self.mirrors {
            Url::parse(mirror).map_err(|e| {
                KbError::Validation(format!(
                    "Formula '{}' has an invalid mirror '{}': {}",
                    self.name, mirror, e
                ))
            })?;
        }
        let mut seen = BTreeSet::new();
        for dep in &self.dependencies {
            if dep.name.trim().is_empty() {
                return Err(KbError::Validation(format!(
                    "Formula '{}' declares a dependency with an empty name",
                    self.name
                )));
            }
            if !seen.insert(dep.name.as_str()) {
                return Err(KbError::Validation(format!(
                    "Formula '{}' declares dependency '{}' more than once",
                    self.name, dep.name
                )));
            }
        }
        self.install.validate(&[PREFIX_KEY, CC_KEY])?;
        self.resolved_version()?;
        Ok(())
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let record: Self = toml::from_str(raw)?;
        record.validate()?;
        Ok(record)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(raw)?;
        record.validate()?;
        Ok(record)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| KbError::Generic(format!("Failed to serialize formula '{}': {e}", self.name)))
    }
}

/// Derives a version from an archive name such as `kanabo-0.1.0-SNAPSHOT.tar.gz`
/// or `v1.2.tar.gz`. Two-component versions are padded to three.
pub fn version_from_file_name(name: &str, file_name: &str) -> Option<Version> {
    let stem = ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .unwrap_or(file_name);
    let candidate = stem
        .strip_prefix(&format!("{name}-"))
        .or_else(|| stem.rsplit_once('-').map(|(_, v)| v).filter(|v| v.starts_with(|c: char| c.is_ascii_digit())))
        .unwrap_or(stem);
    let candidate = candidate.strip_prefix('v').unwrap_or(candidate);
    parse_loose_version(candidate)
}

/// Parses `raw` as semver, padding `1` and `1.4` out to three components.
pub fn parse_loose_version(raw: &str) -> Option<Version> {
    if let Ok(v) = Version::parse(raw) {
        return Some(v);
    }
    let (core, pre) = match raw.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (raw, None),
    };
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0"),
        2 => format!("{core}.0"),
        _ => return None,
    };
    let full = match pre {
        Some(pre) => format!("{padded}-{pre}"),
        None => padded,
    };
    Version::parse(&full).ok()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kanabo(url: &str, checksum: Option<Checksum>) -> FormulaRecord {
        let mut record = FormulaRecord::new("kanabo", url, InstallTemplate::make_install("prefix"));
        record.checksum = checksum;
        record.dependencies = vec![Dependency::new_build("check"), Dependency::new_runtime("libyaml")];
        record
    }

    #[test]
    fn source_location_requires_url() {
        let record = kanabo("", None);
        assert!(matches!(
            record.resolve_source_location(),
            Err(KbError::Config(_))
        ));
        let record = kanabo("https://example.com/kanabo-0.2.0.tar.gz", None);
        assert_eq!(
            record.resolve_source_location().unwrap().as_str(),
            "https://example.com/kanabo-0.2.0.tar.gz"
        );
    }

    #[test]
    fn verify_without_checksum_always_succeeds() {
        let record = kanabo("https://example.com/kanabo-0.2.0.tar.gz", None);
        assert!(record.verify(b"anything at all").is_ok());
        assert!(record.verify(b"").is_ok());
    }

    #[test]
    fn verify_with_checksum_gates_on_digest() {
        let artifact = b"kanabo source tarball";
        let digest = crate::model::checksum::ChecksumAlgorithm::Sha1.hex_digest(artifact);
        let record = kanabo(
            "https://example.com/kanabo-0.1.0.tar.gz",
            Some(Checksum::sha1(&digest).unwrap()),
        );
        assert!(record.verify(artifact).is_ok());
        assert!(matches!(
            record.verify(b"tampered"),
            Err(KbError::Integrity { .. })
        ));
    }

    #[test]
    fn dependencies_resolve_to_name_phase_pairs() {
        let record = kanabo("https://example.com/kanabo-0.2.0.tar.gz", None);
        let deps: Vec<_> = record.resolve_build_dependencies().into_iter().collect();
        assert_eq!(
            deps,
            vec![
                ("check".to_string(), DependencyPhase::Build),
                ("libyaml".to_string(), DependencyPhase::Runtime),
            ]
        );
    }

    #[test]
    fn duplicate_dependency_is_invalid() {
        let mut record = kanabo("https://example.com/kanabo-0.2.0.tar.gz", None);
        record.dependencies.push(Dependency::new_runtime("check"));
        assert!(matches!(record.validate(), Err(KbError::Validation(_))));
    }

    #[test]
    fn versions_from_file_names() {
        assert_eq!(
            version_from_file_name("kanabo", "kanabo-0.1.0-SNAPSHOT.tar.gz"),
            Some(Version::parse("0.1.0-SNAPSHOT").unwrap())
        );
        assert_eq!(
            version_from_file_name("kanabo", "kanabo-0.2.0.tar.gz"),
            Some(Version::parse("0.2.0").unwrap())
        );
        assert_eq!(
            version_from_file_name("foo", "v1.2.tgz"),
            Some(Version::parse("1.2.0").unwrap())
        );
        assert_eq!(version_from_file_name("foo", "latest.tar.gz"), None);
    }

    #[test]
    fn toml_round_trip_keeps_missing_checksum_absent() {
        let raw = r#"
name = "kanabo"
homepage = "https://github.com/kevinbirch/kanabo"
url = "https://github.com/kevinbirch/kanabo/archive/kanabo-0.2.0.tar.gz"
dependencies = [
    { name = "check", tags = "BUILD" },
    { name = "libyaml" },
]

[install]
program = "make"
args = ["prefix={prefix}", "CC={cc}", "install"]
"#;
        let record = FormulaRecord::from_toml_str(raw).unwrap();
        assert!(record.checksum.is_none());
        assert_eq!(record.resolved_version().unwrap(), Version::parse("0.2.0").unwrap());
        assert_eq!(record.dependencies[1].phase(), DependencyPhase::Runtime);

        let again = FormulaRecord::from_toml_str(&record.to_toml_string().unwrap()).unwrap();
        assert_eq!(again, record);
    }
}
