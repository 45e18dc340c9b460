// kb-core/src/lib.rs

pub mod build;
pub mod check;
pub mod install;
pub mod uninstall;

pub use build::env::BuildEnvironment;
pub use install::{install_formula, InstallOptions, InstallOutcome, InstallReceipt};
pub use uninstall::{uninstall_formula, validate_formula_name};
