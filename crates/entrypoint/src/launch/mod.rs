//! Service profile launchers.

pub mod cron;
pub mod script;
pub mod web;

use crate::config::Layout;
use crate::context::ServiceContext;
use crate::environment::ProcessEnv;
use crate::error::Result;
use crate::profile::Launchers;
use crate::render::Renderer;

pub use cron::CronSettings;

/// Launchers wired to the real image layout.
pub struct Entrypoint<R> {
    layout: Layout,
    env: ProcessEnv,
    renderer: R,
    cron: CronSettings,
    supervisor: String,
}

impl<R: Renderer> Entrypoint<R> {
    pub fn new(layout: Layout, env: ProcessEnv, renderer: R) -> Self {
        let cron = CronSettings::from_env(&env);
        Self {
            layout,
            env,
            renderer,
            cron,
            supervisor: web::DEFAULT_SUPERVISOR.to_string(),
        }
    }

    pub fn with_cron(mut self, cron: CronSettings) -> Self {
        self.cron = cron;
        self
    }

    pub fn with_supervisor(mut self, supervisor: impl Into<String>) -> Self {
        self.supervisor = supervisor.into();
        self
    }
}

impl<R: Renderer> Launchers for Entrypoint<R> {
    fn cron(&mut self, _args: &[String]) -> Result<u8> {
        cron::run(&self.cron)
    }

    fn web_service(&mut self, service: &str, _args: &[String]) -> Result<u8> {
        let context = ServiceContext::from_env(&self.env, &self.layout)?;
        web::start(
            &self.layout,
            &self.renderer,
            &context,
            service,
            &self.supervisor,
            &self.env,
        )
    }

    fn script(&mut self, program: &str, args: &[String]) -> Result<u8> {
        script::run(self.layout.scripts_dir(), program, args, &self.env)
    }
}
