//! Benchmark configuration loaded from `runbench.yaml`.
//!
//! Every field is optional; an empty file (or no file) reproduces the plain
//! `make clean`, `make`, `ls > out.txt` sequence with the pool directory set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::env::{EnvOverrides, DEFAULT_POOL_DIR, POOL_DIR_ENV};
use crate::errors::ConfigError;
use crate::pipeline::{FailurePolicy, Pipeline};
use crate::step::{EnvSource, OutputTarget, Step};

pub const DEFAULT_CONFIG_FILE: &str = "runbench.yaml";
pub const DEFAULT_OUTPUT_FILE: &str = "out.txt";

/// Where the clean and build steps send their stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutput {
    #[default]
    Inherit,
    Discard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    #[serde(default = "default_pool_env")]
    pub pool_env: String,
    #[serde(default = "default_pool_dir")]
    pub pool_dir: String,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub policy: FailurePolicy,
    #[serde(default)]
    pub build_output: BuildOutput,
    #[serde(default = "default_clean")]
    pub clean: Vec<String>,
    #[serde(default = "default_build")]
    pub build: Vec<String>,
    #[serde(default = "default_list")]
    pub list: Vec<String>,
    /// Extra variables for the listing step, on top of the pool directory.
    #[serde(default)]
    pub extra_env: BTreeMap<String, String>,
}

fn default_pool_env() -> String {
    POOL_DIR_ENV.to_string()
}

fn default_pool_dir() -> String {
    DEFAULT_POOL_DIR.to_string()
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILE)
}

fn default_clean() -> Vec<String> {
    vec!["make".to_string(), "clean".to_string()]
}

fn default_build() -> Vec<String> {
    vec!["make".to_string()]
}

fn default_list() -> Vec<String> {
    vec!["ls".to_string()]
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            pool_env: default_pool_env(),
            pool_dir: default_pool_dir(),
            output: default_output(),
            policy: FailurePolicy::default(),
            build_output: BuildOutput::default(),
            clean: default_clean(),
            build: default_build(),
            list: default_list(),
            extra_env: BTreeMap::new(),
        }
    }
}

impl BenchConfig {
    /// Load config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content, path)
    }

    fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document, which here means "all defaults".
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `runbench.yaml` from `workdir` if present, else the defaults.
    pub fn discover(workdir: &Path) -> Result<Self, ConfigError> {
        let path = workdir.join(DEFAULT_CONFIG_FILE);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "loading config");
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// The augmented variables for the listing step: the pool directory
    /// first, then `extra_env` in key order.
    pub fn overrides(&self) -> Result<EnvOverrides, ConfigError> {
        let mut overrides = EnvOverrides::pool_dir(&self.pool_env, &self.pool_dir)?;
        for (key, value) in &self.extra_env {
            overrides.set(key, value)?;
        }
        Ok(overrides)
    }

    /// Build the clean, build and list pipeline rooted at `workdir`.
    pub fn pipeline(&self, workdir: &Path) -> Result<Pipeline, ConfigError> {
        let build_output = match self.build_output {
            BuildOutput::Inherit => OutputTarget::Inherit,
            BuildOutput::Discard => OutputTarget::Discard,
        };
        if self.output.as_os_str().is_empty() {
            return Err(ConfigError::invalid("output path must not be empty"));
        }

        let clean = Step::new("clean", self.clean.clone())?.with_output(build_output.clone());
        let build = Step::new("build", self.build.clone())?.with_output(build_output);
        let list = Step::new("list", self.list.clone())?
            .with_env(EnvSource::Augmented)
            .with_output(OutputTarget::Capture(self.output.clone()));

        Ok(Pipeline::new(workdir)
            .with_step(clean)
            .with_step(build)
            .with_step(list)
            .with_overrides(self.overrides()?)
            .with_policy(self.policy))
    }
}
