// kb/src/cli.rs
//! Defines the command-line argument structure using clap.

use clap::{ArgAction, Parser, Subcommand};
use kb_common::config::Config;
use kb_common::error::Result;

pub mod history;
pub mod import;
pub mod info;
pub mod install;
pub mod list;
pub mod uninstall;
pub mod verify;

use crate::cli::history::History;
use crate::cli::import::Import;
use crate::cli::info::Info;
use crate::cli::install::InstallArgs;
use crate::cli::list::List;
use crate::cli::uninstall::Uninstall;
use crate::cli::verify::Verify;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "kb", bin_name = "kb")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, verify and install a formula from source
    Install(InstallArgs),
    /// Show a formula record
    Info(Info),
    /// Check a downloaded artifact against a formula's checksum
    Verify(Verify),
    /// Show the bundled kanabo formula snapshots
    History(History),
    /// Convert a Ruby formula file to a kb formula
    Import(Import),
    /// List installed formulas
    List(List),
    /// Remove every installed version of a formula
    Uninstall(Uninstall),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Install(command) => command.run(config).await,
            Self::Info(command) => command.run(config).await,
            Self::Verify(command) => command.run(config).await,
            Self::History(command) => command.run(config).await,
            Self::Import(command) => command.run(config).await,
            Self::List(command) => command.run(config).await,
            Self::Uninstall(command) => command.run(config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn parses_install_flags() {
        let args = CliArgs::parse_from([
            "kb",
            "-vv",
            "install",
            "kanabo@5",
            "--prefix",
            "/opt/kanabo",
            "--cc",
            "cc",
            "--ignore-dependencies",
            "--dry-run",
        ]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Install(install) => {
                assert_eq!(install.formula, "kanabo@5");
                assert_eq!(install.prefix.as_deref(), Some(std::path::Path::new("/opt/kanabo")));
                assert_eq!(install.cc.as_deref(), Some("cc"));
                assert!(install.ignore_dependencies);
                assert!(install.dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
