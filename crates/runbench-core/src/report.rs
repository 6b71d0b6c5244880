use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use crate::errors::StepError;
use crate::pipeline::FailurePolicy;
use crate::step::{EnvSource, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Failed,
    /// Not attempted because an earlier step failed under `abort`.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub command: Vec<String>,
    pub env: EnvSource,
    /// Resolved capture file, for steps whose stdout goes to a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub error_kind: Option<&'static str>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl StepReport {
    pub(crate) fn finished(step: &Step, result: &Result<(), StepError>, start: Instant) -> Self {
        let (status, exit_code, error_kind, error) = match result {
            Ok(()) => (StepStatus::Ok, Some(0), None, None),
            Err(e) => (
                StepStatus::Failed,
                e.exit_code(),
                Some(e.kind()),
                Some(e.to_string()),
            ),
        };
        Self {
            name: step.name().to_string(),
            command: step.argv().to_vec(),
            env: step.env(),
            output: None,
            status,
            exit_code,
            error_kind,
            error,
            duration_ms: elapsed_ms(start),
        }
    }

    pub(crate) fn skipped(step: &Step) -> Self {
        Self {
            name: step.name().to_string(),
            command: step.argv().to_vec(),
            env: step.env(),
            output: None,
            status: StepStatus::Skipped,
            exit_code: None,
            error_kind: None,
            error: None,
            duration_ms: 0,
        }
    }
}

/// Outcome of one pipeline run, in step order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub policy: FailurePolicy,
    pub workdir: String,
    pub steps: Vec<StepReport>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Ok)
    }

    /// True when a failure stopped the run before every step was attempted.
    pub fn aborted(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Skipped)
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.status == StepStatus::Failed)
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    let ms = start.elapsed().as_millis();
    if ms > u128::from(u64::MAX) {
        u64::MAX
    } else {
        ms as u64
    }
}
