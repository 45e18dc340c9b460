pub mod deps;
pub mod installed;

pub use deps::{check_dependencies, unsatisfied_dependencies};
pub use installed::{get_installed_packages, InstalledPackageInfo};
