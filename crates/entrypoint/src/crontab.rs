//! Installing the application's packaged crontab.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use supervise::command_line;
use tracing::{error, warn};

use crate::config::CronMailConfig;
use crate::environment::ProcessEnv;

/// Prints the `crontab` resource of the installed package, or nothing.
const CRONTAB_LOOKUP: &str = "\
import os, re, sys
from pkg_resources import resource_exists, resource_string
package = re.search(r'^([\\w_]+)', os.environ['PACKAGE_NAME']).group(0)
if resource_exists(package, 'crontab'):
    data = resource_string(package, 'crontab')
    sys.stdout.write(data.decode() if sys.version_info[0] == 3 else data)
";

const LEGACY_CRONWRAPPER: &str = "/usr/share/bluesys-cronwrapper/bin/cronwrapper.sh";

/// Ask the application's interpreter for its packaged crontab.
///
/// Any failure yields an empty crontab.
pub fn package_crontab(python: &Path, env: &ProcessEnv) -> String {
    let mut command = Command::new(python);
    command.args(["-c", CRONTAB_LOOKUP]);
    env.apply(&mut command);
    match command.output() {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).into_owned()
        }
        Ok(output) => {
            warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "crontab lookup failed"
            );
            String::new()
        }
        Err(e) => {
            warn!(python = %python.display(), error = %e, "crontab lookup failed to start");
            String::new()
        }
    }
}

/// Adapt a packaged crontab to run as the image user with the local wrapper.
pub fn prepare(crontab: &str, cronwrapper: &Path) -> String {
    crontab.replace(" www-data ", " ").replace(
        &format!(" {LEGACY_CRONWRAPPER} "),
        &format!(" {} ", cronwrapper.display()),
    )
}

/// Build the table handed to `crontab`. The result always ends with a newline;
/// `crontab` rejects a final entry without one.
pub fn assemble(mail: &CronMailConfig, path: &str, cron_env: &str, entries: &str) -> String {
    let mut table = format!(
        "\nMAILFROM={}\nMAILTO={}\nPATH={path}\n{cron_env}{entries}",
        mail.mailfrom, mail.mailto
    );
    if !table.ends_with('\n') {
        table.push('\n');
    }
    table
}

/// The stock installer: `crontab -` reading the table from stdin.
pub fn default_command() -> Vec<String> {
    vec!["crontab".into(), "-".into()]
}

/// Feed `crontab` to `command` on stdin. Failures are logged, never fatal.
pub fn submit(command: &[String], crontab: &str, env: &ProcessEnv) {
    let Some((program, args)) = command.split_first() else {
        error!("-> no crontab command configured");
        return;
    };
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::piped());
    env.apply(&mut cmd);
    let line = command_line(&cmd);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            error!("-> {line} failed to start: {e}");
            return;
        }
    };
    if let Some(mut stdin) = child.stdin.take()
        && let Err(e) = stdin.write_all(crontab.as_bytes())
    {
        warn!(error = %e, "writing crontab");
    }
    match child.wait() {
        Ok(status) if status.success() => {}
        Ok(status) => error!(
            "-> {program} returned {}\n{crontab}",
            status.code().unwrap_or(-1)
        ),
        Err(e) => error!("-> {line} wait failed: {e}"),
    }
}
