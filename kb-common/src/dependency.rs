// kb-common/src/dependency.rs
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct DependencyTag: u8 {
        const RUNTIME     = 0b00000001;
        const BUILD       = 0b00000010;
        const TEST        = 0b00000100;
        const OPTIONAL    = 0b00001000;
        const RECOMMENDED = 0b00010000;
    }
}

impl Default for DependencyTag {
    fn default() -> Self {
        Self::RUNTIME
    }
}

impl fmt::Display for DependencyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        write!(f, "{}", names.join("|").to_lowercase())
    }
}

impl DependencyTag {
    /// Maps a formula DSL symbol (`:build`, `:test`, ...) to its tag.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim_start_matches(':') {
            "build" => Some(Self::BUILD),
            "test" => Some(Self::TEST),
            "optional" => Some(Self::OPTIONAL),
            "recommended" => Some(Self::RECOMMENDED),
            "run" | "runtime" => Some(Self::RUNTIME),
            _ => None,
        }
    }
}

/// When a dependency has to be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyPhase {
    /// Needed only while building, not at runtime.
    Build,
    Runtime,
}

impl fmt::Display for DependencyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub tags: DependencyTag,
}

impl Dependency {
    pub fn new_runtime(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: DependencyTag::RUNTIME,
        }
    }

    pub fn new_build(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: DependencyTag::BUILD,
        }
    }

    pub fn new_with_tags(name: impl Into<String>, tags: DependencyTag) -> Self {
        Self {
            name: name.into(),
            tags,
        }
    }

    pub fn phase(&self) -> DependencyPhase {
        if self.is_runtime() {
            DependencyPhase::Runtime
        } else {
            DependencyPhase::Build
        }
    }

    pub fn is_runtime(&self) -> bool {
        self.tags.intersects(
            DependencyTag::RUNTIME | DependencyTag::RECOMMENDED | DependencyTag::OPTIONAL,
        )
    }

    /// Optional dependencies never block an install.
    pub fn is_required(&self) -> bool {
        !self.tags.contains(DependencyTag::OPTIONAL) && !self.tags.contains(DependencyTag::TEST)
    }
}
