use clap::{Parser, ValueEnum};
use runbench_core::FailurePolicy;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "runbench",
    version,
    about = "Rebuild the allocator benchmark and capture a directory listing with VMMALLOC_POOL_DIR set"
)]
pub struct Cli {
    /// Config file (default: runbench.yaml in the working directory, if present)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Directory to run the build and listing in (default: current directory)
    #[arg(long, short = 'C')]
    pub workdir: Option<PathBuf>,

    /// File that receives the listing output, relative to the working directory
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Pool directory exported to the listing step
    #[arg(long, env = "RUNBENCH_POOL_DIR")]
    pub pool_dir: Option<String>,

    /// What to do when a step fails
    /// - continue: log it and run the remaining steps
    /// - abort: stop and exit with status 1
    #[arg(long, value_enum, env = "RUNBENCH_POLICY")]
    pub policy: Option<PolicyArg>,

    /// Extra variable for the listing step (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Send stdout of the clean and build steps to /dev/null
    #[arg(long)]
    pub quiet_build: bool,

    /// Print the planned steps without running anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyArg {
    Continue,
    Abort,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Continue => FailurePolicy::Continue,
            PolicyArg::Abort => FailurePolicy::Abort,
        }
    }
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    runbench_core::env::parse_assignment(raw).map_err(|e| e.to_string())
}
