// kb-aio/src/lib.rs
//! Asynchronous IO operations for kb (checksums, processes, archives, json, fs)

pub mod checksum;
pub mod extract;
pub mod fs;
pub mod json_io;
pub mod process;

pub use checksum::verify_checksum_async;
pub use extract::{extract_archive_async, find_source_root, ArchiveKind};
pub use json_io::{read_json_async, write_json_async};
pub use process::run_command_async;
