// kb-core/src/build/env.rs
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use kb_common::config::Config;
use kb_common::error::{KbError, Result};
use tracing::debug;

// Passed through from the caller's environment. PATH is rebuilt instead.
const ENV_VARS_TO_KEEP: &[&str] = &[
    "USER",
    "LOGNAME",
    "HOME",
    "TMPDIR",
    "TERM",
    "SHELL",
    "LANG",
    "LC_ALL",
    "LC_CTYPE",
    "TZ",
];

const SYSTEM_PATH_DIRS: &[&str] = &["/usr/bin", "/bin", "/usr/sbin", "/sbin"];

/// The sanitized environment an install command runs in.
#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    vars: HashMap<String, String>,
    path_dirs: Vec<PathBuf>,
}

impl BuildEnvironment {
    /// Builds the environment from the current process environment.
    ///
    /// `dependency_kegs` are installed keg paths whose `bin`, `include` and
    /// `lib` directories are made visible to the build.
    pub fn new(config: &Config, cc: &str, dependency_kegs: &[PathBuf]) -> Result<Self> {
        Self::from_vars(env::vars(), config, cc, dependency_kegs)
    }

    pub fn from_vars<I>(
        inherited: I,
        config: &Config,
        cc: &str,
        dependency_kegs: &[PathBuf],
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut vars = HashMap::new();
        let mut inherited_path = None;
        for (key, value) in inherited {
            if key == "PATH" {
                inherited_path = Some(value);
            } else if ENV_VARS_TO_KEEP.contains(&key.as_str()) {
                vars.insert(key, value);
            } else {
                debug!("Dropping env var from build environment: {}", key);
            }
        }

        let mut path_dirs: Vec<PathBuf> = Vec::new();
        for keg in dependency_kegs {
            let bin = keg.join("bin");
            if bin.is_dir() {
                path_dirs.push(bin);
            }
        }
        let kb_bin = config.bin_dir();
        if kb_bin.is_dir() {
            path_dirs.push(kb_bin);
        }
        if let Some(path) = inherited_path {
            path_dirs.extend(env::split_paths(&path).filter(|p| !p.as_os_str().is_empty()));
        }
        path_dirs.extend(SYSTEM_PATH_DIRS.iter().map(PathBuf::from));

        let mut unique_path_dirs = Vec::new();
        for dir in path_dirs {
            if !unique_path_dirs.contains(&dir) {
                unique_path_dirs.push(dir);
            }
        }
        let path_dirs = unique_path_dirs;

        let final_path_str = env::join_paths(path_dirs.iter())
            .map_err(|e| KbError::BuildEnv(format!("Failed to join PATH: {e}")))?
            .into_string()
            .map_err(|os_str| {
                KbError::BuildEnv(format!(
                    "Final PATH contains non-UTF8 characters: {os_str:?}"
                ))
            })?;
        debug!("Build PATH: {}", final_path_str);
        vars.insert("PATH".to_string(), final_path_str);

        vars.insert("CC".to_string(), cc.to_string());

        let jobs = config.make_jobs.unwrap_or_else(num_cpus::get).max(1);
        vars.insert("MAKEFLAGS".to_string(), format!("-j{jobs}"));

        let mut cppflags = Vec::new();
        let mut ldflags = Vec::new();
        for keg in dependency_kegs {
            let include = keg.join("include");
            if include.is_dir() {
                cppflags.push(format!("-I{}", include.display()));
            }
            let lib = keg.join("lib");
            if lib.is_dir() {
                ldflags.push(format!("-L{}", lib.display()));
            }
        }
        if !cppflags.is_empty() {
            vars.insert("CPPFLAGS".to_string(), cppflags.join(" "));
        }
        if !ldflags.is_empty() {
            vars.insert("LDFLAGS".to_string(), ldflags.join(" "));
        }

        debug!(
            "Build environment: CC={} MAKEFLAGS={}",
            cc,
            vars.get("MAKEFLAGS").map(String::as_str).unwrap_or_default()
        );
        Ok(Self { vars, path_dirs })
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn get_path_string(&self) -> Option<&str> {
        self.vars.get("PATH").map(String::as_str)
    }

    pub fn path_dirs(&self) -> &[PathBuf] {
        &self.path_dirs
    }

    /// Finds `program` on the build PATH. Paths with a separator are used as given.
    pub fn resolve_program(&self, program: &str, cwd: &Path) -> Result<PathBuf> {
        if program.contains(std::path::MAIN_SEPARATOR) {
            let candidate = cwd.join(program);
            return if candidate.is_file() {
                Ok(candidate)
            } else {
                Err(KbError::BuildEnv(format!(
                    "{program} not found relative to {}",
                    cwd.display()
                )))
            };
        }
        which::which_in(program, self.get_path_string(), cwd).map_err(|_| {
            KbError::BuildEnv(format!(
                "{program} command not found in build environment PATH."
            ))
        })
    }
}
