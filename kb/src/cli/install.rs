// kb/src/cli/install.rs
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use kb_common::config::Config;
use kb_common::error::Result;
use kb_common::formulary::Formulary;
use kb_core::{install_formula, InstallOptions};
use tracing::instrument;

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Formula name, `kanabo@N`, or a path to a formula file
    pub formula: String,

    /// Install prefix (defaults to the formula's keg in the Cellar)
    #[arg(long)]
    pub prefix: Option<PathBuf>,

    /// Compiler invocation substituted for CC (defaults to KB_CC, then discovery)
    #[arg(long)]
    pub cc: Option<String>,

    /// Install even if dependencies are not installed
    #[arg(long)]
    pub ignore_dependencies: bool,

    /// Print the install command without fetching or running anything
    #[arg(long)]
    pub dry_run: bool,
}

impl InstallArgs {
    #[instrument(skip(self, config), fields(formula = %self.formula))]
    pub async fn run(&self, config: &Config) -> Result<()> {
        let formulary = Formulary::new(config);
        let formula = formulary.load_formula(&self.formula)?;

        let options = InstallOptions {
            prefix: self.prefix.clone(),
            cc: self.cc.clone(),
            ignore_dependencies: self.ignore_dependencies,
            dry_run: self.dry_run,
        };
        let outcome = install_formula(&formula, config, &options).await?;

        if outcome.is_dry_run() {
            println!("{} Would run in {}:", "==>".blue().bold(), outcome.prefix.display());
            println!("{}", outcome.command);
            return Ok(());
        }

        if !outcome.integrity_verified {
            println!(
                "{} {} has no checksum; the source was not verified",
                "Warning:".yellow().bold(),
                outcome.name
            );
        }
        println!(
            "{} {} {} installed to {}",
            "==>".green().bold(),
            outcome.name.cyan(),
            outcome.version,
            outcome.prefix.display()
        );
        Ok(())
    }
}
