use std::process::Command;

use tracing::info;

use super::RunConfig;
use crate::error::{ParcelError, Result};

/// Full command line: program, leading args, then `--key value` options.
pub fn command_line(run: &RunConfig) -> Vec<String> {
    let mut line = Vec::with_capacity(1 + run.launcher.args.len());
    line.push(run.launcher.program.clone());
    line.extend(run.launcher.args.iter().cloned());
    line.extend(run.to_args());
    line
}

pub fn command(run: &RunConfig) -> Command {
    let mut cmd = Command::new(&run.launcher.program);
    cmd.args(&run.launcher.args).args(run.to_args());
    cmd.envs(&run.launcher.env);
    cmd
}

/// Validate `run`, start the launcher and wait for it.
pub fn launch(run: &RunConfig) -> Result<()> {
    run.validate()?;
    let program = &run.launcher.program;
    info!(
        program = %program,
        stage = run.stage.as_str(),
        output_dir = %run.output_dir,
        "launching"
    );
    let status = command(run)
        .status()
        .map_err(|e| ParcelError::Launch(format!("cannot start {program}: {e}")))?;
    if !status.success() {
        return Err(ParcelError::Launch(format!("{program} exited with {status}")));
    }
    info!(program = %program, "run finished");
    Ok(())
}

/// Validate `run` and return the command line that `launch` would execute.
pub fn dry_run(run: &RunConfig) -> Result<Vec<String>> {
    run.validate()?;
    Ok(command_line(run))
}
