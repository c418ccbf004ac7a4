use std::path::{Path, PathBuf};
use std::process::Command;

use supervise::{command_line, exit_code};
use tracing::info;

use crate::environment::ProcessEnv;
use crate::error::{EntrypointError, Result};

/// Locate `program`: a file of that name in `scripts_dir` wins, otherwise it is
/// looked up on the child's `PATH`. If neither finds it the bare name is kept
/// and the spawn reports the failure.
pub fn resolve(scripts_dir: &Path, program: &str, env: &ProcessEnv) -> PathBuf {
    let candidate = scripts_dir.join(program);
    if candidate.exists() {
        return candidate;
    }
    which::which_in(program, env.get_os("PATH"), scripts_dir)
        .unwrap_or_else(|_| PathBuf::from(program))
}

/// Run a script from `scripts_dir` (or the `PATH`) and wait for it.
///
/// Scripts are assumed short-lived and non-forking: no subreaper scope and no
/// signal forwarding. The script's exit status becomes ours.
pub fn run(scripts_dir: &Path, program: &str, args: &[String], env: &ProcessEnv) -> Result<u8> {
    let mut command = Command::new(resolve(scripts_dir, program, env));
    command.args(args).current_dir(scripts_dir);
    env.apply(&mut command);

    let line = command_line(&command);
    info!("running {line}");
    let status = command.status().map_err(|source| EntrypointError::Spawn {
        command: line.clone(),
        source,
    })?;
    if !status.success() {
        info!(%status, "{line} failed");
    }
    Ok(exit_code(status))
}
