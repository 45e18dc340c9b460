// kb-aio/src/process.rs
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Output as StdOutput;
use std::process::Stdio;

use kb_common::error::{KbError, Result};
use tokio::process::Command;
use tracing::{debug, error};

/// Asynchronously runs an external command and captures its output.
///
/// When `envs` is given it replaces the inherited environment entirely.
/// A non-zero exit is not an error here; callers inspect `status`.
pub async fn run_command_async(
    command: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Option<HashMap<String, String>>,
) -> Result<StdOutput> {
    debug!(
        "Async Running command: {} {:?} (cwd: {:?}, envs: {:?})",
        command.display(),
        args,
        cwd,
        envs.as_ref().map(|e| e.keys().collect::<Vec<_>>()) // Log only keys for envs
    );

    let mut cmd = Command::new(&command);
    cmd.args(&args);
    cmd.kill_on_drop(true);

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    if let Some(env_map) = envs {
        cmd.env_clear();
        cmd.envs(env_map);
    }

    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null()); // Prevent hanging on stdin

    match cmd.output().await {
        Ok(output) => {
            if !output.status.success() {
                debug!("Async Command failed with status: {}", output.status);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.trim().is_empty() {
                    debug!("Stdout:\n{}", stdout.trim());
                }
                if !stderr.trim().is_empty() {
                    debug!("Stderr:\n{}", stderr.trim());
                }
            } else {
                debug!("Async Command finished successfully.");
            }
            Ok(output)
        }
        Err(e) => {
            error!("Async Failed to execute command {}: {}", command.display(), e);
            Err(KbError::CommandExec(format!(
                "{}: {}",
                command.display(),
                e
            )))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_output_and_runs_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_command_async(
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), "pwd; echo \"$KB_TEST_VAR\"".to_string()],
            Some(dir.path().to_path_buf()),
            Some(HashMap::from([(
                "KB_TEST_VAR".to_string(),
                "hello".to_string(),
            )])),
        )
        .await
        .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();
        let pwd = lines.next().unwrap();
        assert_eq!(
            std::fs::canonicalize(pwd).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
        assert_eq!(lines.next(), Some("hello"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_in_status() {
        let output = run_command_async(
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), "exit 3".to_string()],
            None,
            None,
        )
        .await
        .unwrap();
        assert_eq!(output.status.code(), Some(3));
    }

    #[tokio::test]
    async fn missing_program_is_command_exec_error() {
        let err = run_command_async(PathBuf::from("/nonexistent/kb-make"), vec![], None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, KbError::CommandExec(_)));
    }
}
