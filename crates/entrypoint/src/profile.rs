//! Startup argument dispatch.
//!
//! `[]` opens a shell, `["cron", ..]` runs the cron daemon, `["start", name, ..]`
//! starts the web stack for `name`, anything else is a script.

use tracing::info;

use crate::error::{EntrypointError, Result};

pub const DEFAULT_SHELL: &str = "/bin/bash";

/// How much process supervision a profile gets from the entrypoint itself.
///
/// Descriptive: each launcher implements its own policy and `dispatch` only
/// logs it. Changing a profile's policy means changing its launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionPolicy {
    /// Subreaper scope around a SIGTERM-forwarding child; blocks until exit.
    Full,
    /// The started daemon owns its children and its shutdown.
    Delegated,
    /// Short-lived, non-forking programs; plain spawn and wait.
    Unsupervised,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceProfile {
    Shell { program: String },
    Cron { args: Vec<String> },
    WebService { service: String, args: Vec<String> },
    Script { program: String, args: Vec<String> },
}

impl ServiceProfile {
    pub fn from_args(args: Vec<String>) -> Result<Self> {
        let mut args = args.into_iter();
        let Some(first) = args.next() else {
            return Ok(Self::Shell {
                program: DEFAULT_SHELL.to_string(),
            });
        };
        let rest: Vec<String> = args.collect();
        match first.as_str() {
            "cron" => Ok(Self::Cron { args: rest }),
            "start" => {
                let mut rest = rest.into_iter();
                let service = rest.next().ok_or_else(|| {
                    EntrypointError::Usage("start requires a service name".into())
                })?;
                Ok(Self::WebService {
                    service,
                    args: rest.collect(),
                })
            }
            _ => Ok(Self::Script {
                program: first,
                args: rest,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Shell { .. } => "shell",
            Self::Cron { .. } => "cron",
            Self::WebService { .. } => "web-service",
            Self::Script { .. } => "script",
        }
    }

    pub fn policy(&self) -> SupervisionPolicy {
        match self {
            Self::Cron { .. } => SupervisionPolicy::Full,
            Self::WebService { .. } => SupervisionPolicy::Delegated,
            Self::Shell { .. } | Self::Script { .. } => SupervisionPolicy::Unsupervised,
        }
    }
}

/// One launcher per profile. Each returns the exit code for this process.
pub trait Launchers {
    fn cron(&mut self, args: &[String]) -> Result<u8>;
    fn web_service(&mut self, service: &str, args: &[String]) -> Result<u8>;
    fn script(&mut self, program: &str, args: &[String]) -> Result<u8>;
}

pub fn dispatch(args: Vec<String>, launchers: &mut impl Launchers) -> Result<u8> {
    let profile = ServiceProfile::from_args(args)?;
    info!(profile = profile.name(), policy = ?profile.policy(), "dispatching");
    match &profile {
        ServiceProfile::Shell { program } => launchers.script(program, &[]),
        ServiceProfile::Cron { args } => launchers.cron(args),
        ServiceProfile::WebService { service, args } => launchers.web_service(service, args),
        ServiceProfile::Script { program, args } => launchers.script(program, args),
    }
}
