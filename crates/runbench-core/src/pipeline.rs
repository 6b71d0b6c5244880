//! Ordered execution of steps with an explicit failure policy.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::env::{BaseEnv, EnvOverrides};
use crate::errors::StepError;
use crate::executor::{ChildEnv, ChildStdout, Executor, Invocation};
use crate::report::{elapsed_ms, RunReport, StepReport};
use crate::step::{EnvSource, OutputTarget, Step};

/// What to do after a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep going.
    #[default]
    Continue,
    /// Stop at the first failure; remaining steps are skipped.
    Abort,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Abort => "abort",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Step>,
    workdir: PathBuf,
    overrides: EnvOverrides,
    policy: FailurePolicy,
}

impl Pipeline {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            steps: Vec::new(),
            workdir: workdir.into(),
            overrides: EnvOverrides::new(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_overrides(mut self, overrides: EnvOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn overrides(&self) -> &EnvOverrides {
        &self.overrides
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Resolve a capture path against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }

    /// Run every step in order, blocking on each child.
    ///
    /// Step failures never surface as `Err`; they are recorded in the report
    /// and handled according to the pipeline's [`FailurePolicy`].
    pub fn run(&self, base: &BaseEnv, executor: &mut dyn Executor) -> RunReport {
        let started = Instant::now();
        let augmented = base.augmented(&self.overrides);
        let mut reports = Vec::with_capacity(self.steps.len());
        let mut halted = false;

        for step in &self.steps {
            if halted {
                tracing::info!(step = step.name(), "skipping step after earlier failure");
                reports.push(StepReport::skipped(step));
                continue;
            }

            tracing::info!(
                step = step.name(),
                program = step.program(),
                args = ?step.args(),
                env = ?step.env(),
                "running step"
            );
            let step_start = Instant::now();
            let result = self.run_step(step, &augmented, executor);
            let mut report = StepReport::finished(step, &result, step_start);
            if let OutputTarget::Capture(path) = step.output() {
                report.output = Some(self.resolve(path).display().to_string());
            }

            match &result {
                Ok(()) => tracing::info!(
                    step = step.name(),
                    status = "ok",
                    exit_code = ?report.exit_code,
                    duration_ms = report.duration_ms,
                    "step finished"
                ),
                Err(e) => {
                    tracing::warn!(
                        step = step.name(),
                        status = "failed",
                        kind = e.kind(),
                        exit_code = ?report.exit_code,
                        duration_ms = report.duration_ms,
                        "step failed: {}",
                        e
                    );
                    if self.policy == FailurePolicy::Abort {
                        halted = true;
                    }
                }
            }
            reports.push(report);
        }

        RunReport {
            policy: self.policy,
            workdir: self.workdir.display().to_string(),
            steps: reports,
            duration_ms: elapsed_ms(started),
        }
    }

    fn run_step(
        &self,
        step: &Step,
        augmented: &BaseEnv,
        executor: &mut dyn Executor,
    ) -> Result<(), StepError> {
        let env = match step.env() {
            EnvSource::Ambient => ChildEnv::Inherit,
            EnvSource::Augmented => ChildEnv::Exact(augmented.vars().clone()),
        };

        let stdout = match step.output() {
            OutputTarget::Inherit => ChildStdout::Inherit,
            OutputTarget::Discard => ChildStdout::Null,
            OutputTarget::Capture(path) => {
                let path = self.resolve(path);
                // File::create truncates an existing file.
                let file = File::create(&path)
                    .map_err(|source| StepError::OutputFile { path, source })?;
                ChildStdout::File(file)
            }
        };

        let invocation = Invocation {
            program: step.program().to_string(),
            args: step.args().to_vec(),
            cwd: self.workdir.clone(),
            env,
            stdout,
        };

        let outcome = executor
            .execute(invocation)
            .map_err(|source| StepError::Launch {
                program: step.program().to_string(),
                source,
            })?;

        match outcome.code {
            Some(0) => Ok(()),
            Some(code) => Err(StepError::NonZeroExit {
                program: step.program().to_string(),
                code,
            }),
            None => Err(StepError::Signal {
                program: step.program().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{DEFAULT_POOL_DIR, POOL_DIR_ENV};
    use crate::executor::ExitOutcome;
    use crate::report::StepStatus;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// What the recording executor saw for one invocation.
    #[derive(Debug)]
    struct Seen {
        program: String,
        args: Vec<String>,
        env: ChildEnv,
        captured: bool,
    }

    /// Records invocations and plays back scripted results. Writes
    /// `stdout_text` into captured files, standing in for the listing tool.
    #[derive(Default)]
    struct RecordingExecutor {
        seen: Vec<Seen>,
        fail: HashMap<String, std::io::Result<ExitOutcome>>,
        stdout_text: String,
    }

    impl RecordingExecutor {
        fn failing(mut self, program: &str, result: std::io::Result<ExitOutcome>) -> Self {
            self.fail.insert(program.to_string(), result);
            self
        }
    }

    impl Executor for RecordingExecutor {
        fn execute(&mut self, invocation: Invocation) -> std::io::Result<ExitOutcome> {
            let key = format!("{} {}", invocation.program, invocation.args.join(" "));
            let key = key.trim_end().to_string();
            let captured = matches!(invocation.stdout, ChildStdout::File(_));
            if let ChildStdout::File(mut f) = invocation.stdout {
                f.write_all(self.stdout_text.as_bytes())?;
            }
            self.seen.push(Seen {
                program: invocation.program,
                args: invocation.args,
                env: invocation.env,
                captured,
            });
            match self.fail.remove(&key) {
                Some(result) => result,
                None => Ok(ExitOutcome { code: Some(0) }),
            }
        }
    }

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn bench_pipeline(workdir: &Path) -> Pipeline {
        Pipeline::new(workdir)
            .with_step(Step::new("clean", argv(&["make", "clean"])).unwrap())
            .with_step(Step::new("build", argv(&["make"])).unwrap())
            .with_step(
                Step::new("list", argv(&["ls"]))
                    .unwrap()
                    .with_env(EnvSource::Augmented)
                    .with_output(OutputTarget::Capture(PathBuf::from("out.txt"))),
            )
            .with_overrides(EnvOverrides::pool_dir(POOL_DIR_ENV, DEFAULT_POOL_DIR).unwrap())
    }

    fn base() -> BaseEnv {
        BaseEnv::from_pairs([("PATH", "/usr/bin"), ("HOME", "/home/bench")])
    }

    #[test]
    fn test_clean_runs_before_build_before_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = RecordingExecutor::default();

        let report = bench_pipeline(dir.path()).run(&base(), &mut exec);

        assert!(report.succeeded());
        let order: Vec<_> = exec
            .seen
            .iter()
            .map(|s| format!("{} {}", s.program, s.args.join(" ")))
            .collect();
        assert_eq!(order, vec!["make clean", "make ", "ls "]);
    }

    #[test]
    fn test_only_list_step_gets_augmented_env() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = RecordingExecutor::default();
        let base = base();

        bench_pipeline(dir.path()).run(&base, &mut exec);

        assert_eq!(exec.seen[0].env, ChildEnv::Inherit);
        assert_eq!(exec.seen[1].env, ChildEnv::Inherit);
        let ChildEnv::Exact(vars) = &exec.seen[2].env else {
            panic!("list step must get an explicit environment");
        };
        assert_eq!(vars.len(), base.len() + 1);
        assert_eq!(
            vars.get(std::ffi::OsStr::new(POOL_DIR_ENV)),
            Some(&std::ffi::OsString::from(DEFAULT_POOL_DIR))
        );
        for (k, v) in base.vars() {
            assert_eq!(vars.get(k), Some(v));
        }
        assert!(exec.seen[2].captured);
        assert!(!exec.seen[0].captured);
    }

    #[test]
    fn test_output_file_holds_listing_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = RecordingExecutor {
            stdout_text: "Makefile\nb.o\n".to_string(),
            ..Default::default()
        };

        let report = bench_pipeline(dir.path()).run(&base(), &mut exec);

        let content = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(content, "Makefile\nb.o\n");
        let expected = dir.path().join("out.txt").display().to_string();
        assert_eq!(report.step("list").unwrap().output.as_deref(), Some(expected.as_str()));
        assert_eq!(report.step("build").unwrap().output, None);
    }

    #[test]
    fn test_rerun_truncates_output() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = bench_pipeline(dir.path());

        let mut first = RecordingExecutor {
            stdout_text: "first-run-with-a-much-longer-listing\n".to_string(),
            ..Default::default()
        };
        pipeline.run(&base(), &mut first);

        let mut second = RecordingExecutor {
            stdout_text: "second\n".to_string(),
            ..Default::default()
        };
        pipeline.run(&base(), &mut second);

        let content = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(content, "second\n");
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_step_logs_carry_command_and_outcome_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec =
            RecordingExecutor::default().failing("make", Ok(ExitOutcome { code: Some(2) }));
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            bench_pipeline(dir.path()).run(&base(), &mut exec);
        });

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = |needle: &str, step: &str| {
            text.lines()
                .find(|l| l.contains(needle) && l.contains(&format!("step=\"{step}\"")))
                .unwrap_or_else(|| panic!("no {needle:?} line for {step} in:\n{text}"))
                .to_string()
        };

        let start = line("running step", "clean");
        assert!(start.contains("program=\"make\""), "{start}");
        assert!(start.contains("args=[\"clean\"]"), "{start}");

        let ok = line("step finished", "clean");
        assert!(ok.contains("status=\"ok\""), "{ok}");
        assert!(ok.contains("exit_code=Some(0)"), "{ok}");
        assert!(ok.contains("duration_ms="), "{ok}");

        let failed = line("step failed", "build");
        assert!(failed.contains("WARN"), "{failed}");
        assert!(failed.contains("status=\"failed\""), "{failed}");
        assert!(failed.contains("exit_code=Some(2)"), "{failed}");
    }

    #[test]
    fn test_continue_policy_runs_all_steps_after_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = RecordingExecutor {
            stdout_text: "listing\n".to_string(),
            ..Default::default()
        }
        .failing(
            "make clean",
            Err(std::io::Error::from(std::io::ErrorKind::NotFound)),
        )
        .failing("make", Err(std::io::Error::from(std::io::ErrorKind::NotFound)));

        let report = bench_pipeline(dir.path()).run(&base(), &mut exec);

        assert_eq!(exec.seen.len(), 3);
        assert!(!report.succeeded());
        assert!(!report.aborted());
        assert_eq!(report.step("clean").unwrap().error_kind, Some("launch"));
        assert_eq!(report.step("build").unwrap().error_kind, Some("launch"));
        assert_eq!(report.step("list").unwrap().status, StepStatus::Ok);
        assert!(dir.path().join("out.txt").exists());
    }

    #[test]
    fn test_abort_policy_skips_remaining_steps() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec =
            RecordingExecutor::default().failing("make clean", Ok(ExitOutcome { code: Some(2) }));

        let report = bench_pipeline(dir.path())
            .with_policy(FailurePolicy::Abort)
            .run(&base(), &mut exec);

        assert_eq!(exec.seen.len(), 1);
        assert!(report.aborted());
        let clean = report.step("clean").unwrap();
        assert_eq!(clean.status, StepStatus::Failed);
        assert_eq!(clean.exit_code, Some(2));
        assert_eq!(clean.error_kind, Some("non_zero_exit"));
        assert_eq!(report.step("build").unwrap().status, StepStatus::Skipped);
        assert_eq!(report.step("list").unwrap().status, StepStatus::Skipped);
        assert!(!dir.path().join("out.txt").exists());
    }

    #[test]
    fn test_signal_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = RecordingExecutor::default().failing("make", Ok(ExitOutcome { code: None }));

        let report = bench_pipeline(dir.path()).run(&base(), &mut exec);

        let build = report.step("build").unwrap();
        assert_eq!(build.error_kind, Some("signal"));
        assert_eq!(build.exit_code, None);
    }

    #[test]
    fn test_unwritable_output_is_output_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(dir.path()).with_step(
            Step::new("list", argv(&["ls"]))
                .unwrap()
                .with_output(OutputTarget::Capture(PathBuf::from("missing-dir/out.txt"))),
        );
        let mut exec = RecordingExecutor::default();

        let report = pipeline.run(&base(), &mut exec);

        assert!(exec.seen.is_empty(), "listing must not run without its output file");
        assert_eq!(report.step("list").unwrap().error_kind, Some("output_file"));
    }
}
