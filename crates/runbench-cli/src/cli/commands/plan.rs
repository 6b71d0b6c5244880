use runbench_core::{EnvSource, OutputTarget, Pipeline};

/// Render the steps a run would execute, one per line.
pub fn render_plan(pipeline: &Pipeline) -> String {
    let mut out = String::new();
    out.push_str(&format!("workdir: {}\n", pipeline.workdir().display()));
    out.push_str(&format!("policy:  {}\n", pipeline.policy().as_str()));
    for (idx, step) in pipeline.steps().iter().enumerate() {
        let env = match step.env() {
            EnvSource::Ambient => "ambient env",
            EnvSource::Augmented => "augmented env",
        };
        let output = match step.output() {
            OutputTarget::Inherit => String::new(),
            OutputTarget::Discard => " > /dev/null".to_string(),
            OutputTarget::Capture(path) => format!(" > {}", pipeline.resolve(path).display()),
        };
        out.push_str(&format!(
            "{}. {:<6} {}{}  [{}]\n",
            idx + 1,
            step.name(),
            step.command_line(),
            output,
            env
        ));
    }
    for (key, value) in pipeline.overrides().iter() {
        out.push_str(&format!("   + {key}={value}\n"));
    }
    out
}

pub fn print_plan(pipeline: &Pipeline) {
    print!("{}", render_plan(pipeline));
}
