// kb-core/src/check/deps.rs
use kb_common::dependency::Dependency;
use kb_common::error::{KbError, Result};
use kb_common::keg::{InstalledKeg, KegRegistry};
use kb_common::FormulaRecord;
use tracing::debug;

/// Required dependencies of `formula` with no keg in the Cellar.
pub fn unsatisfied_dependencies(
    formula: &FormulaRecord,
    registry: &KegRegistry,
) -> Result<Vec<Dependency>> {
    let mut missing = Vec::new();
    for dep in formula.dependencies.iter().filter(|d| d.is_required()) {
        if !registry.is_installed(&dep.name)? {
            missing.push(dep.clone());
        }
    }
    Ok(missing)
}

/// Fails with [`KbError::Dependency`] naming every unsatisfied dependency.
///
/// On success returns the installed kegs backing the required dependencies,
/// in declaration order.
pub fn check_dependencies(
    formula: &FormulaRecord,
    registry: &KegRegistry,
) -> Result<Vec<InstalledKeg>> {
    let missing = unsatisfied_dependencies(formula, registry)?;
    if !missing.is_empty() {
        let names: Vec<String> = missing
            .iter()
            .map(|d| format!("{} ({})", d.name, d.phase()))
            .collect();
        return Err(KbError::Dependency(format!(
            "'{}' requires {} which {} not installed",
            formula.name,
            names.join(", "),
            if missing.len() == 1 { "is" } else { "are" }
        )));
    }

    let mut kegs = Vec::new();
    for dep in formula.dependencies.iter().filter(|d| d.is_required()) {
        if let Some(keg) = registry.get_installed_keg(&dep.name)? {
            debug!(
                "Dependency '{}' satisfied by {}",
                dep.name,
                keg.path.display()
            );
            kegs.push(keg);
        }
    }
    Ok(kegs)
}
