// kb-core/src/install/receipt.rs
use std::path::Path;

use chrono::{DateTime, Utc};
use kb_common::dependency::Dependency;
use kb_common::error::Result;
use kb_common::keg::RECEIPT_FILENAME;
use kb_common::model::{Checksum, RenderedCommand};
use kb_common::FormulaRecord;
use semver::Version;
use serde::{Deserialize, Serialize};

/// Written into the prefix after a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub name: String,
    pub version: Version,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
    /// False when the formula carried no checksum and nothing was verified.
    pub integrity_verified: bool,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    pub command: RenderedCommand,
    pub installed_at: DateTime<Utc>,
}

impl InstallReceipt {
    pub fn new(
        formula: &FormulaRecord,
        version: Version,
        integrity_verified: bool,
        command: RenderedCommand,
    ) -> Self {
        Self {
            name: formula.name.clone(),
            version,
            source_url: formula.url.clone(),
            checksum: formula.checksum.clone(),
            integrity_verified,
            dependencies: formula.dependencies.clone(),
            command,
            installed_at: Utc::now(),
        }
    }

    pub async fn write_to(&self, prefix: &Path) -> Result<()> {
        kb_aio::write_json_async(&prefix.join(RECEIPT_FILENAME), self).await
    }

    pub async fn read_from(prefix: &Path) -> Result<Self> {
        kb_aio::read_json_async(&prefix.join(RECEIPT_FILENAME)).await
    }
}
