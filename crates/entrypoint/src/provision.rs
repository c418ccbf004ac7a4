//! Image provisioning run before any service profile starts.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::{info, warn};

use crate::config::{ImageConfig, Layout};
use crate::context::ServiceContext;
use crate::crontab;
use crate::environment::ProcessEnv;
use crate::error::{EntrypointError, Result};
use crate::render::{Context, Renderer};

pub struct Provisioner<'a> {
    layout: &'a Layout,
    config: &'a ImageConfig,
    renderer: &'a dyn Renderer,
    crontab_command: Vec<String>,
}

impl<'a> Provisioner<'a> {
    pub fn new(layout: &'a Layout, config: &'a ImageConfig, renderer: &'a dyn Renderer) -> Self {
        Self {
            layout,
            config,
            renderer,
            crontab_command: crontab::default_command(),
        }
    }

    /// Install the crontab with `command` (table on stdin) instead of `crontab -`.
    pub fn with_crontab_command(mut self, command: Vec<String>) -> Self {
        self.crontab_command = command;
        self
    }

    pub fn run(&self, env: &ProcessEnv) -> Result<()> {
        let context = ServiceContext::from_env(env, self.layout)?.to_context();
        self.setup_ssh()?;
        self.setup_app(&context)?;
        self.setup_mail_relay()?;
        self.setup_cron(&context, env)?;
        Ok(())
    }

    /// Copy mounted ssh files (known_hosts, keys) into the user's `~/.ssh`.
    pub fn setup_ssh(&self) -> Result<()> {
        let ssh_dir = self.layout.ssh_dir();
        create_directory(&ssh_dir)?;
        set_mode(&ssh_dir, 0o700)?;

        let source = self.layout.mounted_ssh();
        if !source.exists() {
            return Ok(());
        }
        for entry in read_dir(&source)? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let dest = ssh_dir.join(entry.file_name());
            copy(&path, &dest)?;
            set_mode(&dest, 0o600)?;
        }
        Ok(())
    }

    /// Create the app directories, render base settings, copy mounted settings.
    pub fn setup_app(&self, context: &Context) -> Result<()> {
        for dir in [
            self.layout.app_config(),
            self.layout.logs(),
            self.layout.run_dir(),
        ] {
            create_directory(&dir)?;
        }
        self.renderer.render(
            "settings.ini",
            &self.layout.app_config().join("50_base_settings.ini"),
            context,
        )?;

        let mounted = self.layout.mounted_app();
        if !mounted.exists() {
            warn!("No 'app' directory found");
            return Ok(());
        }
        for entry in read_dir(&mounted)? {
            let path = entry.path();
            if path.is_file() {
                copy(&path, &self.layout.app_config().join(entry.file_name()))?;
            }
        }
        Ok(())
    }

    pub fn setup_mail_relay(&self) -> Result<()> {
        let context = Context::from([("smtp_server".to_string(), self.config.smtp_server()?)]);
        fs::create_dir_all(self.layout.etc())?;
        self.renderer
            .render("ssmtp.conf", &self.layout.etc().join("ssmtp.conf"), &context)?;
        self.renderer.render(
            "django_smtp_settings.ini",
            &self.layout.app_config().join("40_smtp_settings.ini"),
            &context,
        )
    }

    /// Install the packaged crontab. Only rendering `cron.env` can fail the step;
    /// submission problems are logged.
    pub fn setup_cron(&self, context: &Context, env: &ProcessEnv) -> Result<()> {
        let packaged = crontab::package_crontab(&self.layout.venv().join("bin/python"), env);
        let entries = crontab::prepare(&packaged, &self.layout.cronwrapper());

        let cron_env_path = self.layout.etc().join("cron.env");
        self.renderer.render("cron.env", &cron_env_path, context)?;
        let cron_env = fs::read_to_string(&cron_env_path)?;

        let table = crontab::assemble(
            &self.config.cron,
            env.get("PATH").unwrap_or_default(),
            &cron_env,
            &entries,
        );
        crontab::submit(&self.crontab_command, &table, env);
        Ok(())
    }
}

fn create_directory(path: &Path) -> Result<()> {
    if path.exists() {
        info!("{} already exists !", path.display());
        return Ok(());
    }
    fs::create_dir_all(path)
        .map_err(|e| EntrypointError::Provision(format!("create {}: {e}", path.display())))
}

fn read_dir(path: &Path) -> Result<Vec<fs::DirEntry>> {
    fs::read_dir(path)
        .and_then(|entries| entries.collect::<std::io::Result<Vec<_>>>())
        .map_err(|e| EntrypointError::Provision(format!("list {}: {e}", path.display())))
}

fn copy(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map(|_| ()).map_err(|e| {
        EntrypointError::Provision(format!(
            "copy {} -> {}: {e}",
            from.display(),
            to.display()
        ))
    })
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| EntrypointError::Provision(format!("chmod {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;

    #[derive(Default)]
    struct RecordingRenderer {
        calls: RefCell<Vec<(String, PathBuf)>>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&self, template: &str, destination: &Path, _context: &Context) -> Result<()> {
            self.calls
                .borrow_mut()
                .push((template.to_string(), destination.to_path_buf()));
            fs::write(destination, format!("rendered {template}\n"))?;
            Ok(())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: Layout,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(
            dir.path().join("home"),
            dir.path().join("config"),
            dir.path().join("scripts"),
        );
        fs::create_dir_all(layout.home()).unwrap();
        Fixture { _dir: dir, layout }
    }

    fn mode(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    fn provision_env() -> ProcessEnv {
        ProcessEnv::from_vars([
            ("PATH", "/usr/bin:/bin"),
            ("PYTHON_VERSION", "3.9"),
            ("PROJECT_NAME", "shop"),
            ("RSYSLOG_HOST", "10.0.0.2"),
        ])
    }

    fn relay_config() -> ImageConfig {
        ImageConfig {
            smtp: crate::config::SmtpConfig {
                server: Some("relay.local".into()),
            },
            ..ImageConfig::default()
        }
    }

    fn capture_stdin(out: &Path) -> Vec<String> {
        vec![
            "sh".into(),
            "-c".into(),
            "cat > \"$1\"".into(),
            "sh".into(),
            out.display().to_string(),
        ]
    }

    #[test]
    fn cron_setup_submits_rendered_env_and_mail_block() {
        let fx = fixture();
        fs::create_dir_all(fx.layout.etc()).unwrap();
        let installed = fx.layout.home().join("installed");
        let config = ImageConfig::default();
        let renderer = RecordingRenderer::default();

        Provisioner::new(&fx.layout, &config, &renderer)
            .with_crontab_command(capture_stdin(&installed))
            .setup_cron(&Context::new(), &provision_env())
            .unwrap();

        assert_eq!(
            renderer.calls.borrow().as_slice(),
            [("cron.env".to_string(), fx.layout.etc().join("cron.env"))]
        );
        assert_eq!(
            fs::read_to_string(installed).unwrap(),
            "\nMAILFROM=cron@example.com\nMAILTO=nobody@example.com\nPATH=/usr/bin:/bin\nrendered cron.env\n"
        );
    }

    #[test]
    fn cron_setup_survives_failing_crontab() {
        let fx = fixture();
        fs::create_dir_all(fx.layout.etc()).unwrap();
        let config = ImageConfig::default();
        let renderer = RecordingRenderer::default();
        let failing = vec!["sh".into(), "-c".into(), "cat > /dev/null; exit 1".into()];

        Provisioner::new(&fx.layout, &config, &renderer)
            .with_crontab_command(failing)
            .setup_cron(&Context::new(), &provision_env())
            .unwrap();
    }

    #[test]
    fn run_provisions_every_step_in_order() {
        let fx = fixture();
        let installed = fx.layout.home().join("installed");
        let config = relay_config();
        let renderer = RecordingRenderer::default();

        Provisioner::new(&fx.layout, &config, &renderer)
            .with_crontab_command(capture_stdin(&installed))
            .run(&provision_env())
            .unwrap();

        let names: Vec<String> = renderer.calls.borrow().iter().map(|c| c.0.clone()).collect();
        assert_eq!(
            names,
            ["settings.ini", "ssmtp.conf", "django_smtp_settings.ini", "cron.env"]
        );
        assert!(fx.layout.ssh_dir().is_dir());
        assert!(fx.layout.etc().join("ssmtp.conf").exists());
        let table = fs::read_to_string(installed).unwrap();
        assert!(table.contains("rendered cron.env\n"), "table: {table:?}");
    }

    #[test]
    fn run_requires_project_settings() {
        let fx = fixture();
        let config = relay_config();
        let renderer = RecordingRenderer::default();
        let env = ProcessEnv::from_vars([("PATH", "/usr/bin:/bin")]);

        let err = Provisioner::new(&fx.layout, &config, &renderer)
            .run(&env)
            .unwrap_err();
        assert!(matches!(err, EntrypointError::Config(_)), "err: {err}");
        assert!(renderer.calls.borrow().is_empty());
    }

    #[test]
    fn ssh_files_are_copied_private() {
        let fx = fixture();
        fs::create_dir_all(fx.layout.mounted_ssh().join("nested")).unwrap();
        fs::write(fx.layout.mounted_ssh().join("known_hosts"), "github.com ssh-ed25519 AAAA\n")
            .unwrap();
        let config = ImageConfig::default();
        let renderer = RecordingRenderer::default();

        Provisioner::new(&fx.layout, &config, &renderer)
            .setup_ssh()
            .unwrap();

        let ssh = fx.layout.ssh_dir();
        assert_eq!(mode(&ssh), 0o700);
        assert_eq!(mode(&ssh.join("known_hosts")), 0o600);
        assert!(!ssh.join("nested").exists());
    }

    #[test]
    fn ssh_without_mount_only_creates_dir() {
        let fx = fixture();
        let config = ImageConfig::default();
        let renderer = RecordingRenderer::default();
        Provisioner::new(&fx.layout, &config, &renderer)
            .setup_ssh()
            .unwrap();
        assert!(fx.layout.ssh_dir().is_dir());
    }

    #[test]
    fn app_setup_renders_then_copies_mounted_settings() {
        let fx = fixture();
        fs::create_dir_all(fx.layout.mounted_app()).unwrap();
        fs::write(fx.layout.mounted_app().join("90_site.ini"), "[db]\n").unwrap();
        let config = ImageConfig::default();
        let renderer = RecordingRenderer::default();

        Provisioner::new(&fx.layout, &config, &renderer)
            .setup_app(&Context::new())
            .unwrap();

        assert!(fx.layout.logs().is_dir());
        assert!(fx.layout.run_dir().is_dir());
        let app_config = fx.layout.app_config();
        assert!(app_config.join("50_base_settings.ini").exists());
        assert_eq!(
            fs::read_to_string(app_config.join("90_site.ini")).unwrap(),
            "[db]\n"
        );
    }

    #[test]
    fn mail_relay_renders_both_files() {
        let fx = fixture();
        fs::create_dir_all(fx.layout.app_config()).unwrap();
        let config = relay_config();
        let renderer = RecordingRenderer::default();

        Provisioner::new(&fx.layout, &config, &renderer)
            .setup_mail_relay()
            .unwrap();

        let names: Vec<String> = renderer.calls.borrow().iter().map(|c| c.0.clone()).collect();
        assert_eq!(names, ["ssmtp.conf", "django_smtp_settings.ini"]);
    }
}
