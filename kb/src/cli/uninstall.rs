// kb/src/cli/uninstall.rs
use std::path::Path;

use clap::Args;
use colored::Colorize;
use kb_common::config::Config;
use kb_common::error::{KbError, Result};
use kb_common::keg::KegRegistry;
use kb_core::{uninstall_formula, validate_formula_name};
use tracing::debug;

#[derive(Args, Debug)]
pub struct Uninstall {
    /// Formula names to remove
    #[arg(required = true)]
    pub names: Vec<String>,
}

impl Uninstall {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let registry = KegRegistry::new(config.clone());
        let mut failures = Vec::new();

        for name in &self.names {
            if let Err(e) = validate_formula_name(name) {
                failures.push(e.to_string());
                continue;
            }
            let (file_count, size_bytes) = registry
                .installed_versions(name)?
                .iter()
                .map(|keg| count_files_and_size(&keg.path))
                .fold((0, 0), |(f, s), (kf, ks)| (f + kf, s + ks));

            match uninstall_formula(name, config) {
                Ok(kegs) => {
                    for keg in &kegs {
                        debug!("Removed {}", keg.path.display());
                    }
                    println!(
                        "{} {} ({} files, {})",
                        "Uninstalled".green(),
                        name.cyan(),
                        file_count,
                        format_size(size_bytes)
                    );
                }
                Err(e) => failures.push(format!("{name}: {e}")),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(KbError::Generic(failures.join("; ")))
        }
    }
}

fn count_files_and_size(path: &Path) -> (u64, u64) {
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .fold((0, 0), |(count, size), entry| {
            let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
            (count + 1, size + len)
        })
}

fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if size >= MB {
        format!("{:.1}MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.1}KB", size as f64 / KB as f64)
    } else {
        format!("{size}B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sizes() {
        assert_eq!(format_size(12), "12B");
        assert_eq!(format_size(2048), "2.0KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0MB");
    }
}
