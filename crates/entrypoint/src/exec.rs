use std::process::{Command, ExitStatus};

use supervise::command_line;
use tracing::info;

use crate::environment::ProcessEnv;
use crate::error::{EntrypointError, Result};

/// Run a command to completion with `env` as its whole environment.
///
/// A non-zero exit is returned to the caller, not treated as an error; only a
/// failure to start the program is.
pub fn execute(program: &str, args: &[&str], env: &ProcessEnv) -> Result<ExitStatus> {
    let mut command = Command::new(program);
    command.args(args);
    env.apply(&mut command);

    let line = command_line(&command);
    info!("-> running {line}");
    command.status().map_err(|source| EntrypointError::Spawn {
        command: line,
        source,
    })
}
