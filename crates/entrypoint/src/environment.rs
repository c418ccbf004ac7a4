//! Environment handed to spawned children.
//!
//! The entrypoint never mutates its own environment. It builds a [`ProcessEnv`]
//! once and applies it to each `Command` it spawns.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::process::Command;

use tracing::{info, warn};

use crate::config::Layout;
use crate::error::{EntrypointError, Result};

/// Values are kept as `OsString`, so variables that are not valid UTF-8 still
/// reach children. They are only invisible to the `&str` accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessEnv {
    vars: BTreeMap<OsString, OsString>,
}

impl ProcessEnv {
    /// Snapshot of this process's environment.
    pub fn inherit() -> Self {
        Self::from_vars(std::env::vars_os())
    }

    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<OsString>,
        V: Into<OsString>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Inherited environment, overlaid with `etc/config.env` and the
    /// application variables derived from `PROJECT_NAME`.
    pub fn load(layout: &Layout) -> Result<Self> {
        let mut env = Self::inherit();
        let path = layout.env_file();
        match std::fs::read_to_string(&path) {
            Ok(content) => env.overlay_env_file(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "environment file not found");
            }
            Err(e) => {
                return Err(EntrypointError::Config(format!(
                    "read {}: {e}",
                    path.display()
                )));
            }
        }
        env.apply_application_vars(layout)?;
        Ok(env)
    }

    /// Value of `key`, if set and valid UTF-8.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_os(key).and_then(OsStr::to_str)
    }

    pub fn get_os(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| EntrypointError::Config(format!("{key} is not set")))
    }

    pub fn set(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Replace the child's environment with this one.
    pub fn apply(&self, command: &mut Command) {
        command.env_clear().envs(&self.vars);
    }

    fn overlay_env_file(&mut self, content: &str) {
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_assignment(line) {
                Some((key, value)) => self.set(key, value),
                None => info!("> line '{line}' is not an environment variable"),
            }
        }
    }

    fn apply_application_vars(&mut self, layout: &Layout) -> Result<()> {
        let project = self.require("PROJECT_NAME")?.to_string();
        let mut path = layout.venv().join("bin").into_os_string();
        if let Some(inherited) = self.get_os("PATH").filter(|p| !p.is_empty()) {
            path.push(":");
            path.push(inherited);
        }
        self.set("PATH", path);
        self.set("DJANGO_SETTINGS_MODULE", format!("{project}.settings"));
        self.set(
            format!("{}_CONFIG", project.to_uppercase()),
            layout.app_config().join("*.ini").display().to_string(),
        );
        Ok(())
    }
}

/// Parse one `KEY=value` line. Keys are ASCII alphanumerics and `_`; the value
/// is everything after the first `=`, untouched.
fn parse_assignment(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some((key, value))
}
