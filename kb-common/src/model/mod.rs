// kb-common/src/model/mod.rs
pub mod checksum;
pub mod formula;
pub mod template;

pub use checksum::{Checksum, ChecksumAlgorithm};
pub use formula::FormulaRecord;
pub use template::{InstallTemplate, RenderedCommand, Substitutions};
