use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::ConfigError;

/// Which environment a step's child process receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvSource {
    /// The runner's own environment, unmodified.
    #[default]
    Ambient,
    /// The base environment plus the configured overrides.
    Augmented,
}

/// Where a step's standard output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Inherit,
    Discard,
    /// Truncate (or create) the file and write stdout into it.
    /// Relative paths resolve against the pipeline's working directory.
    Capture(PathBuf),
}

/// One external command in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    name: String,
    argv: Vec<String>,
    env: EnvSource,
    output: OutputTarget,
}

impl Step {
    pub fn new(name: impl Into<String>, argv: Vec<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        match argv.first() {
            None => {
                return Err(ConfigError::invalid(format!(
                    "step {name}: command must not be empty"
                )))
            }
            Some(program) if program.is_empty() => {
                return Err(ConfigError::invalid(format!(
                    "step {name}: program name must not be empty"
                )))
            }
            Some(_) => {}
        }
        Ok(Self {
            name,
            argv,
            env: EnvSource::Ambient,
            output: OutputTarget::Inherit,
        })
    }

    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn env(&self) -> EnvSource {
        self.env
    }

    pub fn output(&self) -> &OutputTarget {
        &self.output
    }

    /// Space-joined command line, for logs and the dry-run listing.
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}
