// kb-core/src/build/make.rs
use std::path::Path;

use kb_common::error::{KbError, Result};
use kb_common::model::RenderedCommand;
use kb_common::{FormulaRecord, Substitutions};
use tracing::{debug, info};

use super::env::BuildEnvironment;

/// Renders the formula's install command for `prefix` and `compiler` without
/// running it.
pub fn render_install_command(
    formula: &FormulaRecord,
    prefix: &Path,
    compiler: &str,
) -> Result<RenderedCommand> {
    let subs = Substitutions::for_install(prefix.display().to_string(), compiler);
    formula.install.render(&subs)
}

/// Runs the formula's install command in `source_dir`.
///
/// The process inherits nothing but `build_env`. A non-zero exit becomes
/// [`KbError::Install`] carrying the exit status; its output is echoed to
/// stderr first.
pub async fn install(
    formula: &FormulaRecord,
    source_dir: &Path,
    prefix: &Path,
    compiler: &str,
    build_env: &BuildEnvironment,
) -> Result<RenderedCommand> {
    let rendered = render_install_command(formula, prefix, compiler)?;
    info!("==> Running {}", rendered);

    let program = build_env.resolve_program(&rendered.program, source_dir)?;
    let output = kb_aio::run_command_async(
        program,
        rendered.args.clone(),
        Some(source_dir.to_path_buf()),
        Some(build_env.vars().clone()),
    )
    .await?;

    if !output.status.success() {
        eprintln!("{} failed with status: {}", rendered, output.status);
        eprintln!("stdout:\n{}", String::from_utf8_lossy(&output.stdout));
        eprintln!("stderr:\n{}", String::from_utf8_lossy(&output.stderr));
        return Err(KbError::install_failed(rendered.to_string(), output.status));
    }
    debug!(
        "{} stdout:\n{}",
        rendered.program,
        String::from_utf8_lossy(&output.stdout)
    );
    debug!("{} completed successfully.", rendered);
    Ok(rendered)
}
