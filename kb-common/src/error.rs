use std::process::ExitStatus;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum KbError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Semantic Versioning Error: {0}")]
    SemVer(#[from] Arc<semver::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    /// The source artifact could not be obtained from any location.
    #[error("FetchError: Failed to fetch '{name}' from '{url}': {reason}")]
    Fetch {
        name: String,
        url: String,
        reason: String,
    },

    #[error("Checksum Mismatch for {subject}: expected {expected}, got {actual}")]
    Integrity {
        subject: String,
        expected: String,
        actual: String,
    },

    #[error("Dependency Error: {0}")]
    Dependency(String),

    /// The install command ran and exited unsuccessfully. `code` is `None`
    /// when the process was terminated by a signal.
    #[error("Install Error: '{command}' exited with {}", display_code(.code))]
    Install { command: String, code: Option<i32> },

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Parsing Error in {0}: {1}")]
    Parse(&'static str, String),

    #[error("Build environment setup failed: {0}")]
    BuildEnv(String),

    #[error("Failed to execute command: {0}")]
    CommandExec(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl KbError {
    pub fn install_failed(command: impl Into<String>, status: ExitStatus) -> Self {
        KbError::Install {
            command: command.into(),
            code: status.code(),
        }
    }
}

impl From<std::io::Error> for KbError {
    fn from(err: std::io::Error) -> Self {
        KbError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for KbError {
    fn from(err: reqwest::Error) -> Self {
        KbError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for KbError {
    fn from(err: serde_json::Error) -> Self {
        KbError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for KbError {
    fn from(err: toml::de::Error) -> Self {
        KbError::Toml(Arc::new(err))
    }
}

impl From<semver::Error> for KbError {
    fn from(err: semver::Error) -> Self {
        KbError::SemVer(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, KbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_error_reports_exit_code() {
        let err = KbError::Install {
            command: "make install".to_string(),
            code: Some(2),
        };
        assert_eq!(
            err.to_string(),
            "Install Error: 'make install' exited with status 2"
        );
    }

    #[test]
    fn install_error_without_code_mentions_signal() {
        let err = KbError::Install {
            command: "make".to_string(),
            code: None,
        };
        assert!(err.to_string().contains("terminated by signal"));
    }
}
