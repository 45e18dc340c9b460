// kb-common/src/dsl.rs
//! Import of the Ruby formula DSL used by older Homebrew taps.
//!
//! Only the declarative subset is understood: `class X < Formula`, string
//! attributes, `depends_on` and a single `system` call inside `def install`.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::dependency::{Dependency, DependencyTag};
use crate::error::{KbError, Result};
use crate::model::formula::parse_loose_version;
use crate::model::template::{CC_KEY, PREFIX_KEY};
use crate::model::{Checksum, FormulaRecord, InstallTemplate};

const SOURCE: &str = "formula DSL";

lazy_static! {
    static ref CLASS_RE: Regex =
        Regex::new(r"^\s*class\s+([A-Z][A-Za-z0-9]*)\s*<\s*Formula\b").unwrap();
    static ref ATTR_RE: Regex = Regex::new(
        r#"^\s*(homepage|url|version|sha1|sha256|mirror|desc)\s+(?:'([^']*)'|"([^"]*)")\s*$"#
    )
    .unwrap();
    static ref DEPENDS_RE: Regex =
        Regex::new(r#"^\s*depends_on\s+(?:'([^']*)'|"([^"]*)")\s*(?:=>\s*:(\w+))?\s*$"#).unwrap();
    static ref SYSTEM_RE: Regex = Regex::new(r"^\s*system\s+(.*)$").unwrap();
    static ref STRING_RE: Regex = Regex::new(r#"'([^']*)'|"((?:[^"\\]|\\.)*)""#).unwrap();
    static ref INTERP_RE: Regex = Regex::new(r"#\{([^}]*)\}").unwrap();
}

/// Parses a `.rb` formula into a validated record.
pub fn parse_formula_rb(source: &str) -> Result<FormulaRecord> {
    let mut name: Option<String> = None;
    let mut record = FormulaRecord::new("", "", InstallTemplate::new("", Vec::new()));
    let mut system_call: Option<String> = None;
    let mut lines = source.lines().enumerate();

    while let Some((idx, line)) = lines.next() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(caps) = CLASS_RE.captures(line) {
            name = Some(class_to_formula_name(&caps[1]));
            continue;
        }

        if let Some(caps) = ATTR_RE.captures(line) {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            match &caps[1] {
                "homepage" => record.homepage = Some(value),
                "desc" => record.desc = Some(value),
                "url" => record.url = value,
                "mirror" => record.mirrors.push(value),
                "version" => {
                    record.version = Some(parse_loose_version(&value).ok_or_else(|| {
                        KbError::Parse(SOURCE, format!("line {line_no}: invalid version '{value}'"))
                    })?)
                }
                "sha1" => record.checksum = Some(Checksum::sha1(&value)?),
                "sha256" => record.checksum = Some(Checksum::sha256(&value)?),
                other => debug!("Ignoring DSL attribute '{}' on line {}", other, line_no),
            }
            continue;
        }

        if let Some(caps) = DEPENDS_RE.captures(line) {
            let dep_name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let tags = match caps.get(3) {
                Some(symbol) => DependencyTag::from_symbol(symbol.as_str()).ok_or_else(|| {
                    KbError::Parse(
                        SOURCE,
                        format!("line {line_no}: unknown dependency tag ':{}'", symbol.as_str()),
                    )
                })?,
                None => DependencyTag::RUNTIME,
            };
            record.dependencies.push(Dependency::new_with_tags(dep_name, tags));
            continue;
        }

        if let Some(caps) = SYSTEM_RE.captures(line) {
            if system_call.is_some() {
                return Err(KbError::Parse(
                    SOURCE,
                    format!("line {line_no}: only one system call is supported"),
                ));
            }
            let mut call = caps[1].trim().to_string();
            // Argument lists continue onto the next line after a trailing comma.
            while call.ends_with(',') {
                match lines.next() {
                    Some((_, next)) => {
                        call.push(' ');
                        call.push_str(next.trim());
                    }
                    None => {
                        return Err(KbError::Parse(
                            SOURCE,
                            format!("line {line_no}: unterminated system call"),
                        ))
                    }
                }
            }
            system_call = Some(call);
            continue;
        }

        debug!("Ignoring DSL line {}: {}", line_no, trimmed);
    }

    record.name = name
        .ok_or_else(|| KbError::Parse(SOURCE, "no `class X < Formula` declaration".to_string()))?;
    let call = system_call
        .ok_or_else(|| KbError::Parse(SOURCE, "no system call in install block".to_string()))?;
    record.install = parse_system_args(&call)?;
    record.validate()?;
    Ok(record)
}

/// `Kanabo` → `kanabo`, `LibYaml` → `lib-yaml`.
fn class_to_formula_name(class: &str) -> String {
    let mut out = String::with_capacity(class.len() + 4);
    for (i, c) in class.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_system_args(call: &str) -> Result<InstallTemplate> {
    let mut args = Vec::new();
    let mut consumed_to = 0;
    for caps in STRING_RE.captures_iter(call) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let between = &call[consumed_to..whole.0];
        if !between.chars().all(|c| c == ',' || c.is_whitespace()) {
            return Err(KbError::Parse(
                SOURCE,
                format!("unsupported expression '{}' in system call", between.trim()),
            ));
        }
        consumed_to = whole.1;
        match (caps.get(1), caps.get(2)) {
            (Some(single), _) => args.push(single.as_str().to_string()),
            (None, Some(double)) => args.push(translate_interpolation(double.as_str())?),
            (None, None) => {}
        }
    }
    if !call[consumed_to..].trim().is_empty() {
        return Err(KbError::Parse(
            SOURCE,
            format!("unsupported expression '{}' in system call", call[consumed_to..].trim()),
        ));
    }
    if args.is_empty() {
        return Err(KbError::Parse(SOURCE, "empty system call".to_string()));
    }
    let program = args.remove(0);
    Ok(InstallTemplate::new(program, args))
}

fn translate_interpolation(arg: &str) -> Result<String> {
    let mut out = String::with_capacity(arg.len());
    let mut last = 0;
    for caps in INTERP_RE.captures_iter(arg) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&arg[last..whole.start()]);
        let key = match caps[1].trim() {
            "prefix" => PREFIX_KEY,
            "ENV.cc" => CC_KEY,
            other => {
                return Err(KbError::Parse(
                    SOURCE,
                    format!("unsupported interpolation '#{{{other}}}' in '{arg}'"),
                ))
            }
        };
        out.push('{');
        out.push_str(key);
        out.push('}');
        last = whole.end();
    }
    out.push_str(&arg[last..]);
    Ok(out)
}
