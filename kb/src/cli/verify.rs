// kb/src/cli/verify.rs
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use kb_common::config::Config;
use kb_common::error::Result;
use kb_common::formulary::Formulary;

#[derive(Args, Debug)]
pub struct Verify {
    /// Formula name, `kanabo@N`, or a path to a formula file
    pub formula: String,
    /// The downloaded source archive
    pub artifact: PathBuf,
}

impl Verify {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let formula = Formulary::new(config).load_formula(&self.formula)?;
        if kb_net::verify_artifact(&formula, &self.artifact).await? {
            println!(
                "{} {} matches {}",
                "OK".green().bold(),
                self.artifact.display(),
                formula.checksum.as_ref().map(|c| c.to_string()).unwrap_or_default()
            );
        } else {
            println!(
                "{} {} has no checksum; {} accepted without verification",
                "Warning:".yellow().bold(),
                formula.name,
                self.artifact.display()
            );
        }
        Ok(())
    }
}
