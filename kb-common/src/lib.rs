// kb-common/src/lib.rs
pub mod config;
pub mod dependency;
pub mod dsl;
pub mod error;
pub mod formulary;
pub mod history;
pub mod keg;
pub mod model;

// Re-export key types
pub use config::Config;
pub use dependency::{Dependency, DependencyPhase, DependencyTag};
pub use error::{KbError, Result};
pub use model::{Checksum, FormulaRecord, InstallTemplate, Substitutions};
