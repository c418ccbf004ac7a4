//! Container entrypoint.
//!
//! Provisions the image (environment, ssh, app settings, mail relay, crontab),
//! then dispatches the startup arguments to one service profile:
//!
//! - `start <service>`: render uWSGI/nginx/supervisord configs and start supervisord
//! - `cron`: run the cron daemon as a supervised child (subreaper + SIGTERM forwarding)
//! - anything else: run a script from the scripts directory or the `PATH`
//! - nothing: an interactive shell

pub mod config;
pub mod context;
pub mod crontab;
pub mod environment;
pub mod error;
pub mod exec;
pub mod launch;
pub mod profile;
pub mod provision;
pub mod render;

pub use error::{EntrypointError, Result};
