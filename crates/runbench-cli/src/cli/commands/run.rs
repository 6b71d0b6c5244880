use anyhow::Context as _;
use runbench_core::config::BuildOutput;
use runbench_core::{BaseEnv, BenchConfig, FailurePolicy, ProcessExecutor, RunReport, StepStatus};
use std::path::{Path, PathBuf};

use crate::cli::args::Cli;
use crate::exit_codes;

pub fn run(args: Cli) -> anyhow::Result<i32> {
    let workdir = resolve_workdir(args.workdir.as_deref())?;
    let config = load_config(&args, &workdir)?;
    let pipeline = config.pipeline(&workdir)?;

    if args.dry_run {
        super::plan::print_plan(&pipeline);
        return Ok(exit_codes::SUCCESS);
    }

    tracing::info!(
        workdir = %workdir.display(),
        policy = pipeline.policy().as_str(),
        "starting benchmark run"
    );

    let base = BaseEnv::from_process();
    let report = pipeline.run(&base, &mut ProcessExecutor);

    print_summary(&report);

    if let Some(path) = &args.report {
        report
            .write_json(path)
            .with_context(|| format!("failed to write run report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote run report");
    }

    Ok(exit_code_for(&report))
}

fn resolve_workdir(given: Option<&Path>) -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir().context("can't get current directory")?;
    let workdir = match given {
        Some(dir) => cwd.join(dir),
        None => cwd,
    };
    if !workdir.is_dir() {
        anyhow::bail!("working directory does not exist: {}", workdir.display());
    }
    Ok(workdir)
}

/// Explicit `--config` must exist; otherwise look for `runbench.yaml` in the
/// working directory. CLI flags win over file values.
fn load_config(args: &Cli, workdir: &Path) -> anyhow::Result<BenchConfig> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::load(path)?,
        None => BenchConfig::discover(workdir)?,
    };

    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    if let Some(pool_dir) = &args.pool_dir {
        config.pool_dir = pool_dir.clone();
    }
    if let Some(policy) = args.policy {
        config.policy = policy.into();
    }
    if args.quiet_build {
        config.build_output = BuildOutput::Discard;
    }
    for (key, value) in &args.env {
        config.extra_env.insert(key.clone(), value.clone());
    }
    Ok(config)
}

fn exit_code_for(report: &RunReport) -> i32 {
    if report.policy == FailurePolicy::Abort && !report.succeeded() {
        exit_codes::STEP_FAILED
    } else {
        exit_codes::SUCCESS
    }
}

fn print_summary(report: &RunReport) {
    eprintln!("──────────────────");
    for step in &report.steps {
        let status = match step.status {
            StepStatus::Ok => "ok",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "skipped",
        };
        match &step.error {
            Some(err) => eprintln!("{:<8} {:<8} {}", step.name, status, err),
            None => eprintln!(
                "{:<8} {:<8} {} ({} ms)",
                step.name,
                status,
                step.command.join(" "),
                step.duration_ms
            ),
        }
    }
    eprintln!("──────────────────");
    if let Some(line) = failure_line(report) {
        eprintln!("{line}");
    }
}

/// One-line tally of failed steps, or `None` when nothing failed.
fn failure_line(report: &RunReport) -> Option<String> {
    let failed: Vec<&str> = report.failed_steps().map(|s| s.name.as_str()).collect();
    if failed.is_empty() {
        return None;
    }
    let mut line = format!("{} step(s) failed: {}", failed.len(), failed.join(", "));
    if report.policy == FailurePolicy::Continue {
        line.push_str(" (policy continue, exit status unaffected)");
    }
    Some(line)
}
