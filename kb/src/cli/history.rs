// kb/src/cli/history.rs
use clap::Args;
use kb_common::config::Config;
use kb_common::error::Result;
use kb_common::history;
use prettytable::{format, Cell, Row, Table};

#[derive(Args, Debug)]
pub struct History {}

impl History {
    pub async fn run(&self, _config: &Config) -> Result<()> {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Ref").style_spec("b"),
            Cell::new("Version").style_spec("b"),
            Cell::new("Checksum").style_spec("b"),
            Cell::new("Prefix variable").style_spec("b"),
        ]));

        for (i, record) in history::all()?.iter().enumerate() {
            let version = record.resolved_version()?;
            let checksum = record
                .checksum
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            table.add_row(Row::new(vec![
                Cell::new(&format!("{}@{}", record.name, i + 1)),
                Cell::new(&version.to_string()),
                Cell::new(&checksum),
                Cell::new(record.install.prefix_variable().unwrap_or("-")),
            ]));
        }
        table.printstd();
        Ok(())
    }
}
