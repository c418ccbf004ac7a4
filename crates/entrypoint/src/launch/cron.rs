use std::process::Command;

use supervise::{DrainEnd, ForwardedChild, SubreaperGuard, command_line, exit_code};
use tracing::{info, warn};

use crate::environment::ProcessEnv;
use crate::error::{EntrypointError, Result};

const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSettings {
    /// Daemon command, run in the foreground.
    pub command: Vec<String>,
    pub timezone: String,
}

impl CronSettings {
    pub fn from_env(env: &ProcessEnv) -> Self {
        Self {
            command: ["sudo", "cron", "-f"].map(String::from).to_vec(),
            timezone: env
                .get("GROCKER_CRON_TZ")
                .unwrap_or(DEFAULT_TIMEZONE)
                .to_string(),
        }
    }
}

/// Run the cron daemon until it exits.
///
/// Jobs forked by the daemon can outlive it briefly, so the daemon runs inside
/// a subreaper scope and the scope only closes once every descendant has been
/// reaped. SIGTERM received meanwhile is forwarded to the daemon.
pub fn run(settings: &CronSettings) -> Result<u8> {
    let (program, args) = settings
        .command
        .split_first()
        .ok_or_else(|| EntrypointError::Usage("empty cron command".into()))?;
    let mut command = Command::new(program);
    command
        .args(args)
        .env_clear()
        .env("TZ", &settings.timezone);

    let subreaper = SubreaperGuard::enter()?;
    info!("-> running cron daemon: {}", command_line(&command));
    let status = {
        let mut daemon = ForwardedChild::spawn(&mut command)?;
        let status = daemon.wait()?;
        if daemon.forwarded() {
            info!(%status, "cron daemon stopped after SIGTERM");
        }
        status
    };
    let report = subreaper.exit();
    if let DrainEnd::Anomaly(errno) = report.end {
        warn!(%errno, "cron descendants may not all have been reaped");
    }

    let code = exit_code(status);
    if code != 0 {
        warn!(code, "cron daemon exited with failure");
    }
    Ok(code)
}
