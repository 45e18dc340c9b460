// kb-core/src/build/mod.rs
//! Everything needed to run a formula's install command: compiler discovery,
//! the sanitized process environment and the `make` shell-out itself.

pub mod devtools;
pub mod env;
pub mod make;
