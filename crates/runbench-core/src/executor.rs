//! Process spawning behind a trait, so the pipeline can be driven by a
//! recording executor in tests.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Environment handed to a child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildEnv {
    /// Leave the child with the runner's environment.
    Inherit,
    /// Clear the environment and set exactly these variables.
    Exact(HashMap<OsString, OsString>),
}

#[derive(Debug)]
pub enum ChildStdout {
    Inherit,
    Null,
    File(File),
}

/// A fully resolved command, ready to spawn.
#[derive(Debug)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: ChildEnv,
    pub stdout: ChildStdout,
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitOutcome {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

pub trait Executor {
    /// Run the invocation to completion.
    ///
    /// An `Err` means the process could not be started at all.
    fn execute(&mut self, invocation: Invocation) -> std::io::Result<ExitOutcome>;
}

/// Runs invocations as real child processes and blocks until each exits.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn execute(&mut self, invocation: Invocation) -> std::io::Result<ExitOutcome> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit());

        if let ChildEnv::Exact(vars) = &invocation.env {
            cmd.env_clear();
            cmd.envs(vars);
        }

        match invocation.stdout {
            ChildStdout::Inherit => cmd.stdout(Stdio::inherit()),
            ChildStdout::Null => cmd.stdout(Stdio::null()),
            ChildStdout::File(file) => cmd.stdout(Stdio::from(file)),
        };

        let status = cmd.status()?;
        Ok(status.into())
    }
}
