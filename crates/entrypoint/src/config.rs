use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::context;
use crate::error::{EntrypointError, Result};

pub const DEFAULT_HOME: &str = "/home/blue";
pub const DEFAULT_CONFIG_DIR: &str = "/config";
pub const DEFAULT_SCRIPTS_DIR: &str = "/scripts";

/// Filesystem layout of the image, derived from three roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    home: PathBuf,
    config_dir: PathBuf,
    scripts_dir: PathBuf,
}

impl Layout {
    pub fn new(home: PathBuf, config_dir: PathBuf, scripts_dir: PathBuf) -> Self {
        Self {
            home,
            config_dir,
            scripts_dir,
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Directory holding the application's `*.ini` settings.
    pub fn app_config(&self) -> PathBuf {
        self.home.join("app_config")
    }

    pub fn etc(&self) -> PathBuf {
        self.home.join("etc")
    }

    pub fn logs(&self) -> PathBuf {
        self.home.join("logs")
    }

    pub fn run_dir(&self) -> PathBuf {
        self.home.join("run")
    }

    pub fn templates(&self) -> PathBuf {
        self.home.join("templates")
    }

    /// Application virtualenv.
    pub fn venv(&self) -> PathBuf {
        self.home.join("app")
    }

    pub fn env_file(&self) -> PathBuf {
        self.etc().join("config.env")
    }

    pub fn ssh_dir(&self) -> PathBuf {
        self.home.join(".ssh")
    }

    pub fn cronwrapper(&self) -> PathBuf {
        self.home.join("bin").join("cronwrapper.sh")
    }

    pub fn version_file(&self) -> PathBuf {
        self.home.join(".grocker_version")
    }

    pub fn mounted_ssh(&self) -> PathBuf {
        self.config_dir.join("ssh-dir")
    }

    pub fn mounted_app(&self) -> PathBuf {
        self.config_dir.join("app")
    }

    /// Operator overrides in INI form (`[smtp] server`, `[cron] mailfrom/mailto`).
    pub fn image_config_ini(&self) -> PathBuf {
        self.config_dir.join("grocker.ini")
    }

    pub fn image_config_yaml(&self) -> PathBuf {
        self.config_dir.join("grocker.yaml")
    }

    pub fn read_version(&self) -> Result<String> {
        let path = self.version_file();
        std::fs::read_to_string(&path)
            .map(|v| v.trim().to_string())
            .map_err(|e| EntrypointError::Config(format!("read {}: {e}", path.display())))
    }
}

/// Operator overrides mounted in the config directory.
///
/// `grocker.yaml` is read first, then `grocker.ini`; a key set in the INI file
/// wins. Either file may be absent.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub smtp: SmtpConfig,
    pub cron: CronMailConfig,
}

#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Relay host; the default gateway when unset.
    pub server: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CronMailConfig {
    pub mailfrom: String,
    pub mailto: String,
}

impl Default for CronMailConfig {
    fn default() -> Self {
        Self {
            mailfrom: "cron@example.com".into(),
            mailto: "nobody@example.com".into(),
        }
    }
}

impl ImageConfig {
    pub fn load(layout: &Layout) -> Result<Self> {
        let yaml_path = layout.image_config_yaml();
        let mut config = match read_optional(&yaml_path)? {
            Some(content) if !content.trim().is_empty() => serde_yaml_ng::from_str(&content)
                .map_err(|e| {
                    EntrypointError::Config(format!("parse {}: {e}", yaml_path.display()))
                })?,
            _ => Self::default(),
        };

        let ini_path = layout.image_config_ini();
        if let Some(content) = read_optional(&ini_path)? {
            config.apply_ini(&content).map_err(|e| {
                EntrypointError::Config(format!("parse {}: {e}", ini_path.display()))
            })?;
        }
        Ok(config)
    }

    fn apply_ini(&mut self, content: &str) -> std::result::Result<(), ini::ParseError> {
        let ini = ini::Ini::load_from_str(content)?;
        if let Some(server) = ini.get_from(Some("smtp"), "server") {
            self.smtp.server = Some(server.to_string());
        }
        if let Some(mailfrom) = ini.get_from(Some("cron"), "mailfrom") {
            self.cron.mailfrom = mailfrom.to_string();
        }
        if let Some(mailto) = ini.get_from(Some("cron"), "mailto") {
            self.cron.mailto = mailto.to_string();
        }
        Ok(())
    }

    pub fn smtp_server(&self) -> Result<String> {
        match &self.smtp.server {
            Some(server) => Ok(server.clone()),
            None => context::gateway_ip(),
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "not present, skipping");
            Ok(None)
        }
        Err(e) => Err(EntrypointError::Config(format!(
            "read {}: {e}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout::new("/home/blue".into(), "/config".into(), "/scripts".into())
    }

    #[test]
    fn layout_derives_paths_from_roots() {
        let layout = layout();
        assert_eq!(layout.app_config(), PathBuf::from("/home/blue/app_config"));
        assert_eq!(layout.env_file(), PathBuf::from("/home/blue/etc/config.env"));
        assert_eq!(layout.venv(), PathBuf::from("/home/blue/app"));
        assert_eq!(layout.mounted_ssh(), PathBuf::from("/config/ssh-dir"));
        assert_eq!(layout.image_config_ini(), PathBuf::from("/config/grocker.ini"));
        assert_eq!(layout.image_config_yaml(), PathBuf::from("/config/grocker.yaml"));
        assert_eq!(
            layout.cronwrapper(),
            PathBuf::from("/home/blue/bin/cronwrapper.sh")
        );
    }

    fn config_layout(dir: &Path) -> Layout {
        Layout::new("/home/blue".into(), dir.to_path_buf(), "/scripts".into())
    }

    #[test]
    fn missing_image_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ImageConfig::load(&config_layout(dir.path())).unwrap();
        assert_eq!(config, ImageConfig::default());
        assert_eq!(config.cron.mailto, "nobody@example.com");
    }

    #[test]
    fn ini_sections_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let layout = config_layout(dir.path());
        std::fs::write(
            layout.image_config_ini(),
            "[smtp]\nserver = smtp.corp\n\n[cron]\nmailto = ops@corp\n",
        )
        .unwrap();

        let config = ImageConfig::load(&layout).unwrap();
        assert_eq!(config.smtp_server().unwrap(), "smtp.corp");
        assert_eq!(config.cron.mailto, "ops@corp");
        assert_eq!(config.cron.mailfrom, "cron@example.com");
    }

    #[test]
    fn ini_wins_over_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let layout = config_layout(dir.path());
        std::fs::write(
            layout.image_config_yaml(),
            "smtp:\n  server: from-yaml\ncron:\n  mailfrom: yaml@corp\n",
        )
        .unwrap();
        std::fs::write(layout.image_config_ini(), "[smtp]\nserver = from-ini\n").unwrap();

        let config = ImageConfig::load(&layout).unwrap();
        assert_eq!(config.smtp.server.as_deref(), Some("from-ini"));
        assert_eq!(config.cron.mailfrom, "yaml@corp");
    }

    #[test]
    fn partial_yaml_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let layout = config_layout(dir.path());
        std::fs::write(layout.image_config_yaml(), "smtp:\n  server: mail.internal\n").unwrap();

        let config = ImageConfig::load(&layout).unwrap();
        assert_eq!(config.smtp_server().unwrap(), "mail.internal");
        assert_eq!(config.cron.mailfrom, "cron@example.com");
    }

    #[test]
    fn invalid_yaml_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let layout = config_layout(dir.path());
        std::fs::write(layout.image_config_yaml(), "cron: [not, a, map]\n").unwrap();
        assert!(matches!(
            ImageConfig::load(&layout),
            Err(EntrypointError::Config(_))
        ));
    }

    #[test]
    fn read_version_trims() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path().into(), "/config".into(), "/scripts".into());
        std::fs::write(layout.version_file(), "5.1.0\n").unwrap();
        assert_eq!(layout.read_version().unwrap(), "5.1.0");
    }
}
