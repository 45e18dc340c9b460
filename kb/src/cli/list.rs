// kb/src/cli/list.rs
use clap::Args;
use colored::Colorize;
use kb_common::config::Config;
use kb_common::error::Result;
use kb_core::check::get_installed_packages;
use prettytable::{format, Cell, Row, Table};

#[derive(Args, Debug)]
pub struct List {}

impl List {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let installed = get_installed_packages(config).await?;
        if installed.is_empty() {
            println!("{}", "0 formulas installed".yellow());
            return Ok(());
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Name").style_spec("b"),
            Cell::new("Version").style_spec("b"),
            Cell::new("Verified").style_spec("b"),
            Cell::new("Installed").style_spec("b"),
        ]));
        for pkg in &installed {
            let (verified, when) = match &pkg.receipt {
                Some(r) => (
                    if r.integrity_verified { "yes" } else { "no" },
                    r.installed_at.format("%Y-%m-%d %H:%M").to_string(),
                ),
                None => ("?", "-".to_string()),
            };
            table.add_row(Row::new(vec![
                Cell::new(&pkg.name).style_spec("Fg"),
                Cell::new(&pkg.version),
                Cell::new(verified),
                Cell::new(&when),
            ]));
        }
        table.printstd();
        println!("{} formulas installed", installed.len().to_string().bold());
        Ok(())
    }
}
