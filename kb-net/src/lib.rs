// kb-net/src/lib.rs
pub mod http;
pub mod validation;

pub use http::{cached_source_path, fetch_source};
pub use kb_common::{
    error::{KbError, Result},
    Config, FormulaRecord,
};
pub use validation::{validate_url, verify_artifact};
