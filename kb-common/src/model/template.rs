// kb-common/src/model/template.rs
//! Install command templates.
//!
//! Arguments carry `{key}` placeholders that are resolved from an explicit
//! substitution map at install time. The make variable a placeholder feeds
//! (`PREFIX=`, `prefix=`, `CC=`) is part of the argument text, so records that
//! differ only in variable naming need no code changes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KbError, Result};

pub const PREFIX_KEY: &str = "prefix";
pub const CC_KEY: &str = "cc";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    values: BTreeMap<String, String>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The two substitutions every install command may use.
    pub fn for_install(prefix: impl Into<String>, cc: impl Into<String>) -> Self {
        Self::new().with(PREFIX_KEY, prefix).with(CC_KEY, cc)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallTemplate {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_program() -> String {
    "make".to_string()
}

/// A template with every placeholder resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for RenderedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl InstallTemplate {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `make <prefix_var>={prefix} CC={cc} install`
    pub fn make_install(prefix_var: &str) -> Self {
        Self::new(
            "make",
            vec![
                format!("{prefix_var}={{{PREFIX_KEY}}}"),
                format!("CC={{{CC_KEY}}}"),
                "install".to_string(),
            ],
        )
    }

    /// Every placeholder key referenced by the arguments, in order of appearance.
    pub fn placeholders(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for arg in std::iter::once(&self.program).chain(self.args.iter()) {
            for key in scan_placeholders(arg) {
                if !keys.iter().any(|k| k == key) {
                    keys.push(key.to_string());
                }
            }
        }
        keys
    }

    /// The make variable that receives the prefix, e.g. `PREFIX` or `prefix`.
    pub fn prefix_variable(&self) -> Option<&str> {
        let token = format!("{{{PREFIX_KEY}}}");
        self.args.iter().find_map(|arg| {
            let (var, value) = arg.split_once('=')?;
            (value == token).then_some(var)
        })
    }

    /// Checks that the template is runnable with the keys in `known`.
    pub fn validate(&self, known: &[&str]) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(KbError::Validation(
                "install command has an empty program".to_string(),
            ));
        }
        for key in self.placeholders() {
            if !known.contains(&key.as_str()) {
                return Err(KbError::Validation(format!(
                    "install command uses unknown placeholder '{{{key}}}'"
                )));
            }
        }
        Ok(())
    }

    pub fn render(&self, subs: &Substitutions) -> Result<RenderedCommand> {
        Ok(RenderedCommand {
            program: render_arg(&self.program, subs)?,
            args: self
                .args
                .iter()
                .map(|arg| render_arg(arg, subs))
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

enum Piece<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// Splits `text` into literal runs and `{key}` tokens. `${...}` is left to the
/// shell and never treated as a placeholder.
fn tokenize(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut literal_start = 0;
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find('{') {
        let open = search_from + rel;
        let after = &text[open + 1..];
        let escaped = text[..open].ends_with('$');
        match after.find('}') {
            Some(close) if !escaped && close > 0 && after[..close].chars().all(is_key_char) => {
                if literal_start < open {
                    pieces.push(Piece::Text(&text[literal_start..open]));
                }
                pieces.push(Piece::Placeholder(&after[..close]));
                literal_start = open + close + 2;
                search_from = literal_start;
            }
            _ => search_from = open + 1,
        }
    }
    if literal_start < text.len() {
        pieces.push(Piece::Text(&text[literal_start..]));
    }
    pieces
}

fn scan_placeholders(text: &str) -> Vec<&str> {
    tokenize(text)
        .into_iter()
        .filter_map(|piece| match piece {
            Piece::Placeholder(key) => Some(key),
            Piece::Text(_) => None,
        })
        .collect()
}

fn render_arg(text: &str, subs: &Substitutions) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    for piece in tokenize(text) {
        match piece {
            Piece::Text(t) => out.push_str(t),
            Piece::Placeholder(key) => {
                let value = subs.get(key).ok_or_else(|| {
                    KbError::Validation(format!("no value for placeholder '{{{key}}}' in '{text}'"))
                })?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}
