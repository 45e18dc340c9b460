// kb/src/cli/import.rs
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use kb_common::config::Config;
use kb_common::dsl;
use kb_common::error::{KbError, Result};
use tracing::debug;

#[derive(Args, Debug)]
pub struct Import {
    /// A Ruby formula file
    pub file: PathBuf,
    /// Write the TOML formula here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Import {
    pub async fn run(&self, _config: &Config) -> Result<()> {
        let source = tokio::fs::read_to_string(&self.file).await.map_err(|e| {
            KbError::NotFound(format!("Cannot read {}: {}", self.file.display(), e))
        })?;
        let record = dsl::parse_formula_rb(&source)?;
        debug!("Imported formula '{}' from {}", record.name, self.file.display());
        let toml = record.to_toml_string()?;

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, toml).await?;
                println!(
                    "{} Wrote {} to {}",
                    "==>".green().bold(),
                    record.name,
                    path.display()
                );
            }
            None => print!("{toml}"),
        }
        Ok(())
    }
}
