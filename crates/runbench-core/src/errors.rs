use std::path::PathBuf;

/// Why a single pipeline step did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code}")]
    NonZeroExit { program: String, code: i32 },

    #[error("{program} was terminated by a signal")]
    Signal { program: String },

    #[error("cannot open output file {}: {source}", .path.display())]
    OutputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StepError {
    /// Stable short name used in reports and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Launch { .. } => "launch",
            Self::NonZeroExit { .. } => "non_zero_exit",
            Self::Signal { .. } => "signal",
            Self::OutputFile { .. } => "output_file",
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Problems found before any step runs: unreadable or malformed config,
/// or an environment that cannot be handed to a child process.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}
