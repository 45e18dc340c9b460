// kb-common/src/history.rs
//! The published kanabo formula records, oldest first.
//!
//! Each entry is an immutable snapshot. Across the series the checksum is
//! introduced, dropped, restored and dropped again, and the last release
//! switches the make variable from `PREFIX` to `prefix`.

use crate::error::{KbError, Result};
use crate::model::FormulaRecord;

pub const BUNDLED_FORMULA: &str = "kanabo";

const SNAPSHOTS: [&str; 5] = [
    include_str!("../formula/kanabo/1.toml"),
    include_str!("../formula/kanabo/2.toml"),
    include_str!("../formula/kanabo/3.toml"),
    include_str!("../formula/kanabo/4.toml"),
    include_str!("../formula/kanabo/5.toml"),
];

/// Snapshot `n`, counting from 1.
pub fn snapshot(n: usize) -> Result<FormulaRecord> {
    let raw = n
        .checked_sub(1)
        .and_then(|i| SNAPSHOTS.get(i))
        .ok_or_else(|| {
            KbError::NotFound(format!(
                "{BUNDLED_FORMULA} snapshot {n} (available: 1..={})",
                SNAPSHOTS.len()
            ))
        })?;
    FormulaRecord::from_toml_str(raw)
}

pub fn latest() -> Result<FormulaRecord> {
    snapshot(SNAPSHOTS.len())
}

pub fn all() -> Result<Vec<FormulaRecord>> {
    (1..=SNAPSHOTS.len()).map(snapshot).collect()
}

/// Splits `name@N` into its name and snapshot number.
pub fn parse_snapshot_ref(reference: &str) -> Option<(&str, usize)> {
    let (name, n) = reference.split_once('@')?;
    Some((name, n.parse().ok()?))
}
