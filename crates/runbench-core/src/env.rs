//! Environment snapshots handed to child processes.
//!
//! The runner never reads the process environment implicitly while it works.
//! A [`BaseEnv`] is captured once (usually via [`BaseEnv::from_process`]) and
//! passed into the pipeline, which derives the augmented mapping for steps
//! that need the pool directory.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};

use crate::errors::ConfigError;

/// Variable read by the benchmark to locate its persistent memory pool.
pub const POOL_DIR_ENV: &str = "VMMALLOC_POOL_DIR";

/// Pool directory used when nothing else is configured.
pub const DEFAULT_POOL_DIR: &str = "/mnt/pmem0/myrontsa";

/// A snapshot of environment variables.
///
/// Keys and values are kept as OS strings, so variables that are not valid
/// unicode still reach the child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseEnv {
    vars: HashMap<OsString, OsString>,
}

impl BaseEnv {
    /// Capture the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os().collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<OsString>,
        V: Into<OsString>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars.get(key.as_ref()).map(OsString::as_os_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn vars(&self) -> &HashMap<OsString, OsString> {
        &self.vars
    }

    /// Copy this snapshot and apply `overrides` on top of it.
    ///
    /// Existing keys are replaced, so a key already present in the base does
    /// not grow the mapping.
    pub fn augmented(&self, overrides: &EnvOverrides) -> BaseEnv {
        let mut vars = self.vars.clone();
        for (key, value) in overrides.iter() {
            vars.insert(OsString::from(key), OsString::from(value));
        }
        BaseEnv { vars }
    }
}

/// Ordered set of variables added on top of a [`BaseEnv`].
///
/// Insertion order is kept for display; a repeated key keeps its first
/// position and takes the latest value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    entries: Vec<(String, String)>,
}

impl EnvOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single `VMMALLOC_POOL_DIR` override used by the benchmark.
    pub fn pool_dir(key: &str, dir: &str) -> Result<Self, ConfigError> {
        let mut overrides = Self::new();
        overrides.set(key, dir)?;
        Ok(overrides)
    }

    /// Insert or replace a variable, rejecting keys the OS cannot represent.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        validate_key(key)?;
        if value.contains('\0') {
            return Err(ConfigError::invalid(format!(
                "value of environment variable {key} contains a NUL byte"
            )));
        }
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a `KEY=VALUE` pair as given on the command line.
pub fn parse_assignment(raw: &str) -> Result<(String, String), ConfigError> {
    let (key, value) = raw.split_once('=').ok_or_else(|| {
        ConfigError::invalid(format!("expected KEY=VALUE, got {raw:?}"))
    })?;
    validate_key(key)?;
    Ok((key.to_string(), value.to_string()))
}

fn validate_key(key: &str) -> Result<(), ConfigError> {
    if key.is_empty() {
        return Err(ConfigError::invalid("environment variable name is empty"));
    }
    if key.contains('=') || key.contains('\0') {
        return Err(ConfigError::invalid(format!(
            "invalid environment variable name {key:?}"
        )));
    }
    Ok(())
}
