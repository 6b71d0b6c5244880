//! Core of runbench: prepares and runs an allocator benchmark build.
//!
//! A run is an ordered [`Pipeline`] of external commands (by default
//! `make clean`, `make`, then `ls` captured into `out.txt` with
//! `VMMALLOC_POOL_DIR` set). Each step yields a status; a [`FailurePolicy`]
//! decides whether a failure stops the run.

pub mod config;
pub mod env;
pub mod errors;
pub mod executor;
pub mod pipeline;
pub mod report;
pub mod step;

pub use config::BenchConfig;
pub use env::{BaseEnv, EnvOverrides};
pub use errors::{ConfigError, StepError};
pub use executor::{Executor, ProcessExecutor};
pub use pipeline::{FailurePolicy, Pipeline};
pub use report::{RunReport, StepReport, StepStatus};
pub use step::{EnvSource, OutputTarget, Step};
