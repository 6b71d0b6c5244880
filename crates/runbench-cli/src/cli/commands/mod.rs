use super::args::Cli;

pub mod plan;
pub(crate) mod run;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    run::run(cli)
}
