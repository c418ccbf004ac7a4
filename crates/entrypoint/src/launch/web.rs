use std::fs;

use supervise::exit_code;
use tracing::warn;

use crate::config::Layout;
use crate::context::ServiceContext;
use crate::environment::ProcessEnv;
use crate::error::Result;
use crate::exec;
use crate::render::Renderer;

pub const DEFAULT_SUPERVISOR: &str = "supervisord";

/// Render the uWSGI, nginx and supervisord configs for `service`, then start
/// supervisord.
///
/// supervisord daemonizes and keeps uWSGI and nginx running; it owns their
/// shutdown. This returns once the launch command has returned.
pub fn start(
    layout: &Layout,
    renderer: &dyn Renderer,
    context: &ServiceContext,
    service: &str,
    supervisor: &str,
    env: &ProcessEnv,
) -> Result<u8> {
    let mut ctx = context.to_context();
    ctx.insert("service".into(), service.to_string());

    let etc = layout.etc();
    fs::create_dir_all(&etc)?;
    renderer.render("uwsgi.ini", &etc.join("uwsgi.ini"), &ctx)?;
    renderer.render("nginx.conf", &etc.join("nginx.conf"), &ctx)?;
    let supervisor_conf = etc.join("supervisord.conf");
    renderer.render("supervisord.conf", &supervisor_conf, &ctx)?;

    let conf = supervisor_conf.display().to_string();
    let status = exec::execute(supervisor, &["-c", &conf], env)?;
    if !status.success() {
        warn!(%status, "{supervisor} did not start cleanly");
    }
    Ok(exit_code(status))
}
