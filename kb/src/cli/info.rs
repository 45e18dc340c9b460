// kb/src/cli/info.rs
use clap::Args;
use colored::Colorize;
use kb_common::config::Config;
use kb_common::error::Result;
use kb_common::formulary::Formulary;
use kb_common::keg::KegRegistry;
use kb_common::FormulaRecord;

#[derive(Args, Debug)]
pub struct Info {
    /// Formula name, `kanabo@N`, or a path to a formula file. Lists
    /// available formulas when omitted.
    pub formula: Option<String>,
}

impl Info {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let formulary = Formulary::new(config);
        let Some(reference) = &self.formula else {
            println!("{}", "Available formulas:".bold());
            for name in formulary.available()? {
                println!("  {name}");
            }
            return Ok(());
        };

        let formula = formulary.load_formula(reference)?;
        print_formula_info(&formula);

        let registry = KegRegistry::new(config.clone());
        match registry.get_installed_keg(&formula.name)? {
            Some(keg) => println!(
                "{} {} ({})",
                "Installed:".bold(),
                keg.version_str,
                keg.path.display()
            ),
            None => println!("{} {}", "Installed:".bold(), "no".dimmed()),
        }
        Ok(())
    }
}

fn print_formula_info(formula: &FormulaRecord) {
    let version = formula
        .resolved_version()
        .map(|v| v.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    println!("{} {}", formula.name.green().bold(), version);
    if let Some(desc) = &formula.desc {
        println!("{desc}");
    }
    if let Some(homepage) = &formula.homepage {
        println!("{} {}", "Homepage:".bold(), homepage);
    }
    println!("{} {}", "Source:".bold(), formula.url);
    for mirror in &formula.mirrors {
        println!("{} {}", "Mirror:".bold(), mirror);
    }
    match &formula.checksum {
        Some(checksum) => println!("{} {}", "Checksum:".bold(), checksum),
        None => println!("{} {}", "Checksum:".bold(), "none (source is not verified)".yellow()),
    }

    let deps = formula.resolve_build_dependencies();
    if !deps.is_empty() {
        println!("{}", "Dependencies:".bold());
        for (name, phase) in deps {
            println!("  {name} ({phase})");
        }
    }
    println!(
        "{} {} {}",
        "Install:".bold(),
        formula.install.program,
        formula.install.args.join(" ")
    );
}
