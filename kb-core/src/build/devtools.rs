use std::env;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use kb_common::config::Config;
use kb_common::error::{KbError, Result};
use tracing::debug;

pub fn find_compiler(name: &str) -> Result<PathBuf> {
    let env_var_name = match name {
        "cc" => "CC",
        _ => "",
    };
    if !env_var_name.is_empty() {
        if let Ok(compiler_path) = env::var(env_var_name) {
            let path = PathBuf::from(compiler_path);
            if path.is_file() {
                debug!(
                    "Using compiler from env var {}: {}",
                    env_var_name,
                    path.display()
                );
                return Ok(path);
            } else {
                debug!(
                    "Env var {} points to non-existent file: {}",
                    env_var_name,
                    path.display()
                );
            }
        }
    }

    if cfg!(target_os = "macos") {
        debug!("Attempting to find '{name}' using xcrun");
        let output = Command::new("xcrun")
            .arg("--find")
            .arg(name)
            .stderr(Stdio::piped())
            .output();

        match output {
            Ok(out) if out.status.success() => {
                let path_str = String::from_utf8_lossy(&out.stdout).trim().to_string();
                let path = PathBuf::from(&path_str);
                if !path_str.is_empty() && path.is_file() {
                    debug!("Found compiler via xcrun: {}", path.display());
                    return Ok(path);
                }
                debug!("xcrun returned an unusable path for '{name}': '{path_str}'");
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                debug!("xcrun failed to find '{}': {}", name, stderr.trim());
            }
            Err(e) => {
                debug!("Failed to execute xcrun: {e}. Falling back to PATH search.");
            }
        }
    }

    debug!("Falling back to searching PATH for '{name}'");
    which::which(name).map_err(|e| {
        KbError::BuildEnv(format!("Failed to find compiler '{name}' on PATH: {e}"))
    })
}

/// The text substituted for `{cc}`.
///
/// An explicit override wins, then `KB_CC` from the configuration. Both are
/// used verbatim, so `cc` stays `cc`. Otherwise the compiler is discovered
/// and its full path is used.
pub fn resolve_compiler_invocation(config: &Config, override_cc: Option<&str>) -> Result<String> {
    if let Some(cc) = override_cc.filter(|s| !s.trim().is_empty()) {
        debug!("Using compiler from command line: {cc}");
        return Ok(cc.to_string());
    }
    if let Some(cc) = config.cc.as_deref().filter(|s| !s.trim().is_empty()) {
        debug!("Using compiler from KB_CC: {cc}");
        return Ok(cc.to_string());
    }
    let path = find_compiler("cc")?;
    Ok(path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_compiler_is_used_verbatim() {
        let mut config = Config::with_root("/opt/kb");
        config.cc = Some("clang".to_string());
        assert_eq!(
            resolve_compiler_invocation(&config, Some("cc")).unwrap(),
            "cc"
        );
        assert_eq!(resolve_compiler_invocation(&config, None).unwrap(), "clang");
        assert_eq!(resolve_compiler_invocation(&config, Some("  ")).unwrap(), "clang");
    }
}
